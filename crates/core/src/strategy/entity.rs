use crate::strategy::error::StrategyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// # Summary
/// 条件对象作用的交易阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// 仅入场
    Entry,
    /// 仅出场
    Exit,
    /// 两者皆可
    Both,
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Stage::Entry),
            "exit" => Ok(Stage::Exit),
            "both" => Ok(Stage::Both),
            _ => Err(format!("Unknown Stage: {}", s)),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Entry => write!(f, "entry"),
            Stage::Exit => write!(f, "exit"),
            Stage::Both => write!(f, "both"),
        }
    }
}

/// # Summary
/// 条件对象或持仓的方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// 做多
    Long,
    /// 做空
    Short,
    /// 双向
    Both,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            "both" => Ok(Direction::Both),
            _ => Err(format!("Unknown Direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
            Direction::Both => write!(f, "both"),
        }
    }
}

/// # Summary
/// `set-option` 指令接受的通用选项值。
///
/// # Invariants
/// - 仅允许字符串、整数、浮点三种形态；字符串必须非空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl OptionValue {
    /// # Summary
    /// 从开放 JSON 值校验并构造选项值。
    ///
    /// # Logic
    /// 1. 字符串：拒绝空串。
    /// 2. 整数与浮点：直接接受。
    /// 3. 其余 JSON 形态（布尔、数组、对象、null）一律拒绝。
    ///
    /// # Arguments
    /// * `value`: 指令载荷中的原始 JSON 值。
    ///
    /// # Returns
    /// 校验通过返回选项值，否则返回 `StrategyError::InvalidParameter`。
    pub fn from_json(value: &Value) -> Result<Self, StrategyError> {
        match value {
            Value::String(s) if !s.is_empty() => Ok(OptionValue::Text(s.clone())),
            Value::String(_) => Err(StrategyError::InvalidParameter(
                "option value must be a non-empty string".into(),
            )),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(OptionValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(OptionValue::Float(f))
                } else {
                    Err(StrategyError::InvalidParameter(
                        "option value is not a representable number".into(),
                    ))
                }
            }
            _ => Err(StrategyError::InvalidParameter(
                "option value must be string, int or float".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_value_validation() {
        assert_eq!(
            OptionValue::from_json(&json!("fast")).unwrap(),
            OptionValue::Text("fast".into())
        );
        assert_eq!(
            OptionValue::from_json(&json!(3)).unwrap(),
            OptionValue::Integer(3)
        );
        assert_eq!(
            OptionValue::from_json(&json!(0.5)).unwrap(),
            OptionValue::Float(0.5)
        );
        assert!(OptionValue::from_json(&json!("")).is_err());
        assert!(OptionValue::from_json(&json!(true)).is_err());
        assert!(OptionValue::from_json(&json!([1, 2])).is_err());
    }
}
