use kawase_core::market::entity::Candle;
use kawase_core::strategy::error::StrategyError;
use serde_json::Value;

/// # Summary
/// 价格序列的取样方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceMethod {
    /// 收盘价
    Close,
    /// (high + low + close) / 3
    Hlc3,
}

/// # Summary
/// 价格指标句柄：每个计算遍历从 K 线窗口重建逐桶的 open/close/price 数组。
/// 数组的最后一槽对应尚未收盘的当前桶。
///
/// # Invariants
/// - 三个数组长度始终一致，且与最近一次 `compute` 的输入等长。
#[derive(Debug, Clone)]
pub struct PriceIndicator {
    method: PriceMethod,
    opens: Vec<f64>,
    closes: Vec<f64>,
    prices: Vec<f64>,
}

impl PriceIndicator {
    pub fn new(method: PriceMethod) -> Self {
        Self {
            method,
            opens: Vec::new(),
            closes: Vec::new(),
            prices: Vec::new(),
        }
    }

    /// # Summary
    /// 从 K 线窗口重建输出数组。
    ///
    /// # Arguments
    /// * `candles`: 按时间升序的计算窗口，末槽允许未收盘。
    pub fn compute(&mut self, candles: &[Candle]) {
        self.opens.clear();
        self.closes.clear();
        self.prices.clear();
        for c in candles {
            self.opens.push(c.open);
            self.closes.push(c.close);
            let price = match self.method {
                PriceMethod::Close => c.close,
                PriceMethod::Hlc3 => (c.high + c.low + c.close) / 3.0,
            };
            self.prices.push(price);
        }
    }

    /// 输出槽数量
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn opens(&self) -> &[f64] {
        &self.opens
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }
}

/// # Summary
/// 成交量指标句柄：逐桶成交量数组。
#[derive(Debug, Clone, Default)]
pub struct VolumeIndicator {
    volumes: Vec<f64>,
}

impl VolumeIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 K 线窗口重建成交量数组
    pub fn compute(&mut self, candles: &[Candle]) {
        self.volumes.clear();
        self.volumes.extend(candles.iter().map(|c| c.volume));
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }
}

/// # Summary
/// 配置声明的指标槽：类型名加构造参数。
#[derive(Debug, Clone)]
pub struct IndicatorSpec {
    pub kind: String,
    pub params: Value,
}

/// # Summary
/// 装箱的指标变体集合。槽名到句柄的映射是固定的
/// （`price` / `volume`），由配置映射填充。
#[derive(Debug, Clone)]
pub enum IndicatorHandle {
    Price(PriceIndicator),
    Volume(VolumeIndicator),
}

/// # Summary
/// 按类型名构造指标句柄。
///
/// # Logic
/// 1. `price`：读取可选的 `method` 参数（`close` 缺省 / `hlc3`）。
/// 2. `volume`：无参数。
/// 3. 未知类型名是被报告的配置错误，而非静默置空。
///
/// # Arguments
/// * `spec`: 配置声明的指标槽。
///
/// # Returns
/// 成功返回句柄，未知类型返回 `StrategyError::UnknownIndicator`。
pub fn build_indicator(spec: &IndicatorSpec) -> Result<IndicatorHandle, StrategyError> {
    match spec.kind.as_str() {
        "price" => {
            let method = match spec.params.get("method").and_then(Value::as_str) {
                None | Some("close") => PriceMethod::Close,
                Some("hlc3") => PriceMethod::Hlc3,
                Some(other) => {
                    return Err(StrategyError::InvalidParameter(format!(
                        "unknown price method '{}'",
                        other
                    )));
                }
            };
            Ok(IndicatorHandle::Price(PriceIndicator::new(method)))
        }
        "volume" => Ok(IndicatorHandle::Volume(VolumeIndicator::new())),
        other => Err(StrategyError::UnknownIndicator(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use kawase_core::common::TimeFrame;
    use serde_json::json;

    fn candle(secs: i64, open: f64, close: f64, volume: f64) -> Candle {
        Candle {
            time: DateTime::from_timestamp(secs, 0).unwrap(),
            timeframe: TimeFrame::Minute1,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            spread: 0.1,
            volume,
            consolidated: true,
        }
    }

    #[test]
    fn test_price_arrays_follow_window() {
        let mut p = PriceIndicator::new(PriceMethod::Close);
        p.compute(&[candle(0, 1.0, 2.0, 5.0), candle(60, 2.0, 3.0, 6.0)]);
        assert_eq!(p.opens(), &[1.0, 2.0]);
        assert_eq!(p.closes(), &[2.0, 3.0]);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_volume_array() {
        let mut v = VolumeIndicator::new();
        v.compute(&[candle(0, 1.0, 2.0, 5.0), candle(60, 2.0, 3.0, 6.0)]);
        assert_eq!(v.volumes(), &[5.0, 6.0]);
    }

    #[test]
    fn test_unknown_kind_is_reported() {
        let spec = IndicatorSpec {
            kind: "macd".into(),
            params: json!({}),
        };
        assert!(matches!(
            build_indicator(&spec),
            Err(StrategyError::UnknownIndicator(_))
        ));
    }

    #[test]
    fn test_bad_price_method_is_reported() {
        let spec = IndicatorSpec {
            kind: "price".into(),
            params: json!({"method": "vwap"}),
        };
        assert!(matches!(
            build_indicator(&spec),
            Err(StrategyError::InvalidParameter(_))
        ));
    }
}
