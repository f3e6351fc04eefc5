use crate::common::TimeFrame;
use crate::strategy::entity::{Direction, Stage};
use crate::strategy::error::StrategyError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// # Summary
/// 区域（Region）能力契约：挂载在某市场交易上下文上的持久化命名条件对象，
/// 例如价格区间或趋势通道。
///
/// # Invariants
/// - `id` 在其归属的 StrategyTrader 内唯一，由集合持有方在追加时分配。
/// - 接受进集合之前必须通过 `check()` 校验；失败时不得产生任何变更。
pub trait Region: Send + Sync {
    /// 注册表中的变体名称
    fn name(&self) -> &'static str;

    /// 集合内唯一标识
    fn id(&self) -> u32;

    /// 由集合持有方在追加时分配唯一标识
    fn assign_id(&mut self, id: u32);

    /// 创建时间
    fn created(&self) -> DateTime<Utc>;

    /// 作用阶段
    fn stage(&self) -> Stage;

    /// 作用方向
    fn direction(&self) -> Direction;

    /// 关联周期
    fn timeframe(&self) -> TimeFrame;

    /// 可选的绝对到期时间
    fn expiry(&self) -> Option<DateTime<Utc>>;

    /// 设置到期时间
    fn set_expiry(&mut self, expiry: Option<DateTime<Utc>>);

    /// # Summary
    /// 从开放键值载荷完成变体相关配置。
    ///
    /// # Arguments
    /// * `params`: 指令载荷，键语义由具体变体定义。
    ///
    /// # Returns
    /// 载荷不合法时返回 `StrategyError::InvalidParameter`。
    fn init(&mut self, params: &Value) -> Result<(), StrategyError>;

    /// 配置完成后的自检；false 表示拒绝挂载
    fn check(&self) -> bool;

    /// # Summary
    /// 判定给定时刻与价格是否命中该区域。
    ///
    /// # Arguments
    /// * `at`: 判定时刻。
    /// * `price`: 判定价格。
    fn test(&self, at: DateTime<Utc>, price: f64) -> bool;

    /// 是否已越过到期时间
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|e| now >= e)
    }
}

/// # Summary
/// 警报（Alert）能力契约：可带剩余触发次数的命名触发条件，
/// 与区域不同，警报命中后消耗计数并可能自动失效。
///
/// # Invariants
/// - `countdown = -1` 表示不限次数。
/// - 接受进集合之前必须通过 `check()` 校验。
pub trait Alert: Send + Sync {
    /// 注册表中的变体名称
    fn name(&self) -> &'static str;

    /// 集合内唯一标识
    fn id(&self) -> u32;

    /// 由集合持有方在追加时分配唯一标识
    fn assign_id(&mut self, id: u32);

    /// 创建时间
    fn created(&self) -> DateTime<Utc>;

    /// 关联周期
    fn timeframe(&self) -> TimeFrame;

    /// 可选的绝对到期时间
    fn expiry(&self) -> Option<DateTime<Utc>>;

    /// 设置到期时间
    fn set_expiry(&mut self, expiry: Option<DateTime<Utc>>);

    /// 剩余触发次数，-1 表示不限
    fn countdown(&self) -> i32;

    /// # Summary
    /// 消耗一次触发计数。
    ///
    /// # Logic
    /// 不限次数时不变；计数为正时递减。
    ///
    /// # Returns
    /// 消耗后警报是否仍然保持挂载。
    fn consume(&mut self) -> bool;

    /// 从开放键值载荷完成变体相关配置
    fn init(&mut self, params: &Value) -> Result<(), StrategyError>;

    /// 配置完成后的自检；false 表示拒绝挂载
    fn check(&self) -> bool;

    /// # Summary
    /// 判定给定时刻与买卖报价是否触发该警报。
    ///
    /// # Arguments
    /// * `at`: 判定时刻。
    /// * `bid`: 买价。
    /// * `ask`: 卖价。
    fn test(&mut self, at: DateTime<Utc>, bid: f64, ask: f64) -> bool;

    /// 是否已越过到期时间
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_some_and(|e| now >= e)
    }
}

/// 区域工厂签名：按 (创建时间, 阶段, 方向, 周期) 构造未配置的区域实例。
pub type RegionFactory =
    fn(created: DateTime<Utc>, stage: Stage, direction: Direction, timeframe: TimeFrame) -> Box<dyn Region>;

/// 警报工厂签名：按 (创建时间, 周期, 剩余次数) 构造未配置的警报实例。
pub type AlertFactory =
    fn(created: DateTime<Utc>, timeframe: TimeFrame, countdown: i32) -> Box<dyn Alert>;

/// # Summary
/// 区域变体注册表：启动期一次性解析的名称到工厂映射。
///
/// # Invariants
/// - 查找失败作为普通错误返回，不得逃逸为 panic。
#[derive(Default)]
pub struct RegionRegistry {
    factories: HashMap<&'static str, RegionFactory>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个具名变体工厂
    pub fn register(&mut self, name: &'static str, factory: RegionFactory) {
        self.factories.insert(name, factory);
    }

    /// # Summary
    /// 按名称构造一个未配置的区域实例。
    ///
    /// # Returns
    /// 未知名称返回 `StrategyError::UnsupportedRegion`。
    pub fn build(
        &self,
        name: &str,
        created: DateTime<Utc>,
        stage: Stage,
        direction: Direction,
        timeframe: TimeFrame,
    ) -> Result<Box<dyn Region>, StrategyError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StrategyError::UnsupportedRegion(name.to_string()))?;
        Ok(factory(created, stage, direction, timeframe))
    }
}

/// # Summary
/// 警报变体注册表：启动期一次性解析的名称到工厂映射。
#[derive(Default)]
pub struct AlertRegistry {
    factories: HashMap<&'static str, AlertFactory>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个具名变体工厂
    pub fn register(&mut self, name: &'static str, factory: AlertFactory) {
        self.factories.insert(name, factory);
    }

    /// # Summary
    /// 按名称构造一个未配置的警报实例。
    ///
    /// # Returns
    /// 未知名称返回 `StrategyError::UnsupportedAlert`。
    pub fn build(
        &self,
        name: &str,
        created: DateTime<Utc>,
        timeframe: TimeFrame,
        countdown: i32,
    ) -> Result<Box<dyn Alert>, StrategyError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StrategyError::UnsupportedAlert(name.to_string()))?;
        Ok(factory(created, timeframe, countdown))
    }
}
