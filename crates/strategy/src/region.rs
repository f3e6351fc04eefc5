use chrono::{DateTime, Utc};
use kawase_core::common::TimeFrame;
use kawase_core::strategy::entity::{Direction, Stage};
use kawase_core::strategy::error::StrategyError;
use kawase_core::strategy::port::{Region, RegionRegistry};
use serde_json::Value;

/// 从开放载荷中读取一个必需的有限数值参数。
fn require_f64(params: &Value, key: &str) -> Result<f64, StrategyError> {
    let value = params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| StrategyError::InvalidParameter(format!("missing numeric field '{}'", key)))?;
    if !value.is_finite() {
        return Err(StrategyError::InvalidParameter(format!(
            "field '{}' is not a finite number",
            key
        )));
    }
    Ok(value)
}

/// # Summary
/// 水平价格区间区域：价格落在 `[low, high]` 即命中，与时间无关
/// （到期判定除外）。
///
/// # Invariants
/// - `check` 通过后恒有 `0 < low <= high`。
pub struct RangeRegion {
    id: u32,
    created: DateTime<Utc>,
    stage: Stage,
    direction: Direction,
    timeframe: TimeFrame,
    expiry: Option<DateTime<Utc>>,
    low: f64,
    high: f64,
}

impl RangeRegion {
    pub fn boxed(
        created: DateTime<Utc>,
        stage: Stage,
        direction: Direction,
        timeframe: TimeFrame,
    ) -> Box<dyn Region> {
        Box::new(Self {
            id: 0,
            created,
            stage,
            direction,
            timeframe,
            expiry: None,
            low: 0.0,
            high: 0.0,
        })
    }
}

impl Region for RangeRegion {
    fn name(&self) -> &'static str {
        "range"
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

    fn stage(&self) -> Stage {
        self.stage
    }

    fn direction(&self) -> Direction {
        self.direction
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

    fn init(&mut self, params: &Value) -> Result<(), StrategyError> {
        self.low = require_f64(params, "low")?;
        self.high = require_f64(params, "high")?;
        Ok(())
    }

    fn check(&self) -> bool {
        self.low > 0.0 && self.high >= self.low
    }

    fn test(&self, at: DateTime<Utc>, price: f64) -> bool {
        if self.is_expired(at) {
            return false;
        }
        price >= self.low && price <= self.high
    }
}

/// # Summary
/// 趋势通道区域：上下边界在 `[created, expiry]` 区间内随时间线性插值。
/// `a` 端对应创建时刻，`b` 端对应到期时刻。
///
/// # Invariants
/// - 插值需要有界的时间轴，因此到期时间是必填配置。
/// - `check` 通过后两端均满足 `0 < low <= high` 且 `expiry > created`。
pub struct TrendRegion {
    id: u32,
    created: DateTime<Utc>,
    stage: Stage,
    direction: Direction,
    timeframe: TimeFrame,
    expiry: Option<DateTime<Utc>>,
    low_a: f64,
    high_a: f64,
    low_b: f64,
    high_b: f64,
}

impl TrendRegion {
    pub fn boxed(
        created: DateTime<Utc>,
        stage: Stage,
        direction: Direction,
        timeframe: TimeFrame,
    ) -> Box<dyn Region> {
        Box::new(Self {
            id: 0,
            created,
            stage,
            direction,
            timeframe,
            expiry: None,
            low_a: 0.0,
            high_a: 0.0,
            low_b: 0.0,
            high_b: 0.0,
        })
    }

    /// 时刻 `at` 在 `[created, expiry]` 上的归一化位置，截断到 `[0, 1]`。
    fn progress(&self, at: DateTime<Utc>) -> Option<f64> {
        let expiry = self.expiry?;
        let total = (expiry - self.created).num_milliseconds();
        if total <= 0 {
            return None;
        }
        let elapsed = (at - self.created).num_milliseconds();
        #[allow(clippy::cast_precision_loss)]
        let ratio = elapsed as f64 / total as f64;
        Some(ratio.clamp(0.0, 1.0))
    }
}

impl Region for TrendRegion {
    fn name(&self) -> &'static str {
        "trend"
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

    fn stage(&self) -> Stage {
        self.stage
    }

    fn direction(&self) -> Direction {
        self.direction
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

    fn init(&mut self, params: &Value) -> Result<(), StrategyError> {
        self.low_a = require_f64(params, "low_a")?;
        self.high_a = require_f64(params, "high_a")?;
        self.low_b = require_f64(params, "low_b")?;
        self.high_b = require_f64(params, "high_b")?;
        Ok(())
    }

    fn check(&self) -> bool {
        let ends_valid = self.low_a > 0.0
            && self.high_a >= self.low_a
            && self.low_b > 0.0
            && self.high_b >= self.low_b;
        let timespan_valid = self
            .expiry
            .is_some_and(|expiry| expiry > self.created);
        ends_valid && timespan_valid
    }

    fn test(&self, at: DateTime<Utc>, price: f64) -> bool {
        if self.is_expired(at) {
            return false;
        }
        let Some(t) = self.progress(at) else {
            return false;
        };
        let low = self.low_a + (self.low_b - self.low_a) * t;
        let high = self.high_a + (self.high_b - self.high_a) * t;
        price >= low && price <= high
    }
}

/// 内置区域变体注册表。
pub fn registry() -> RegionRegistry {
    let mut registry = RegionRegistry::new();
    registry.register("range", RangeRegion::boxed);
    registry.register("trend", TrendRegion::boxed);
    registry
}
