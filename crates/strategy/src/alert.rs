use chrono::{DateTime, Utc};
use kawase_core::common::TimeFrame;
use kawase_core::strategy::error::StrategyError;
use kawase_core::strategy::port::{Alert, AlertRegistry};
use serde_json::Value;
use std::str::FromStr;

/// 价格穿越的判定方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrossDirection {
    /// 从下方向上穿越
    Up,
    /// 从上方向下穿越
    Down,
}

impl FromStr for CrossDirection {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(StrategyError::InvalidParameter(format!(
                "unknown cross direction '{}'",
                other
            ))),
        }
    }
}

/// # Summary
/// 价格穿越警报：报价序列从阈值一侧移动到另一侧时触发。
/// 向上穿越用卖价判定（买入视角），向下穿越用买价判定。
///
/// # Invariants
/// - 首笔报价只建立基线，永不触发。
/// - 触发判定是严格穿越：报价恰好停在阈值上不算。
pub struct PriceCrossAlert {
    id: u32,
    created: DateTime<Utc>,
    timeframe: TimeFrame,
    expiry: Option<DateTime<Utc>>,
    countdown: i32,
    price: f64,
    direction: Option<CrossDirection>,
    // 上一笔判定用报价
    last_price: Option<f64>,
}

impl PriceCrossAlert {
    pub fn boxed(created: DateTime<Utc>, timeframe: TimeFrame, countdown: i32) -> Box<dyn Alert> {
        Box::new(Self {
            id: 0,
            created,
            timeframe,
            expiry: None,
            countdown,
            price: 0.0,
            direction: None,
            last_price: None,
        })
    }
}

impl Alert for PriceCrossAlert {
    fn name(&self) -> &'static str {
        "price-cross"
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn assign_id(&mut self, id: u32) {
        self.id = id;
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    fn set_expiry(&mut self, expiry: Option<DateTime<Utc>>) {
        self.expiry = expiry;
    }

    fn countdown(&self) -> i32 {
        self.countdown
    }

    fn consume(&mut self) -> bool {
        if self.countdown < 0 {
            return true;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
        }
        self.countdown > 0
    }

    fn init(&mut self, params: &Value) -> Result<(), StrategyError> {
        self.price = params
            .get("price")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                StrategyError::InvalidParameter("missing numeric field 'price'".to_string())
            })?;
        let direction = params
            .get("direction")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StrategyError::InvalidParameter("missing text field 'direction'".to_string())
            })?;
        self.direction = Some(direction.parse()?);
        Ok(())
    }

    fn check(&self) -> bool {
        self.price > 0.0 && self.price.is_finite() && self.direction.is_some() && self.countdown != 0
    }

    fn test(&mut self, at: DateTime<Utc>, bid: f64, ask: f64) -> bool {
        if self.is_expired(at) {
            return false;
        }
        let Some(direction) = self.direction else {
            return false;
        };
        let quote = match direction {
            CrossDirection::Up => ask,
            CrossDirection::Down => bid,
        };
        let crossed = match (self.last_price, direction) {
            (Some(prev), CrossDirection::Up) => prev <= self.price && quote > self.price,
            (Some(prev), CrossDirection::Down) => prev >= self.price && quote < self.price,
            (None, _) => false,
        };
        self.last_price = Some(quote);
        crossed
    }
}

/// 内置警报变体注册表。
pub fn registry() -> AlertRegistry {
    let mut registry = AlertRegistry::new();
    registry.register("price-cross", PriceCrossAlert::boxed);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn build(countdown: i32, params: Value) -> Box<dyn Alert> {
        let mut alert = registry()
            .build("price-cross", at(0), TimeFrame::Minute1, countdown)
            .unwrap();
        alert.init(&params).unwrap();
        alert
    }

    #[test]
    fn test_upward_cross_uses_ask() {
        let mut alert = build(1, json!({"price": 10.0, "direction": "up"}));
        assert!(alert.check());
        // 基线建立，不触发
        assert!(!alert.test(at(1), 9.8, 9.9));
        // 卖价越过阈值
        assert!(alert.test(at(2), 10.0, 10.1));
        // 停在上方不再触发
        assert!(!alert.test(at(3), 10.1, 10.2));
    }

    #[test]
    fn test_downward_cross_uses_bid() {
        let mut alert = build(1, json!({"price": 10.0, "direction": "down"}));
        assert!(!alert.test(at(1), 10.2, 10.3));
        assert!(alert.test(at(2), 9.9, 10.0));
    }

    #[test]
    fn test_exact_touch_is_not_a_cross() {
        let mut alert = build(1, json!({"price": 10.0, "direction": "up"}));
        assert!(!alert.test(at(1), 9.8, 9.9));
        assert!(!alert.test(at(2), 9.9, 10.0));
    }

    #[test]
    fn test_countdown_consumption() {
        let mut alert = build(2, json!({"price": 10.0, "direction": "up"}));
        assert!(alert.consume());
        assert_eq!(alert.countdown(), 1);
        assert!(!alert.consume());
        assert_eq!(alert.countdown(), 0);

        // -1 表示不限次数
        let mut unlimited = build(-1, json!({"price": 10.0, "direction": "up"}));
        assert!(unlimited.consume());
        assert_eq!(unlimited.countdown(), -1);
    }

    #[test]
    fn test_expired_alert_never_fires() {
        let mut alert = build(1, json!({"price": 10.0, "direction": "up"}));
        alert.set_expiry(Some(at(5)));
        assert!(!alert.test(at(1), 9.8, 9.9));
        assert!(!alert.test(at(6), 10.0, 10.1));
    }

    #[test]
    fn test_invalid_direction_rejected() {
        let mut alert = registry()
            .build("price-cross", at(0), TimeFrame::Minute1, 1)
            .unwrap();
        let result = alert.init(&json!({"price": 10.0, "direction": "sideways"}));
        assert!(matches!(result, Err(StrategyError::InvalidParameter(_))));
    }

    #[test]
    fn test_unknown_alert_name_is_an_error() {
        let result = registry().build("volume-spike", at(0), TimeFrame::Minute1, 1);
        assert!(matches!(result, Err(StrategyError::UnsupportedAlert(_))));
    }
}
