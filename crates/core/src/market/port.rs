use crate::common::{MarketIdentity, TimeFrame};
use crate::market::entity::{Candle, Tick};
use crate::market::error::MarketError;
use async_trait::async_trait;
use futures::Stream;
use rust_decimal::Decimal;
use std::pin::Pin;

/// # Summary
/// 原始行情流别名，使用动态分发的异步流。
pub type TickStream = Pin<Box<dyn Stream<Item = Tick> + Send>>;

/// # Summary
/// Instrument 聚合根行为契约。按市场维度持有各周期的 K 线序列、
/// 最新买卖报价与下单数量设置。
///
/// # Invariants
/// - 身份标识在聚合根生命周期内保持不变。
/// - 核心逻辑对其只读，唯一的写入口是指令面的 `set_trade_quantity`。
/// - 聚合路径是各周期序列的唯一写者；读者通过本接口获得时点快照。
pub trait Instrument: Send + Sync {
    /// # Summary
    /// 获取该聚合根的唯一身份标识。
    ///
    /// # Returns
    /// 市场身份实体引用。
    fn identity(&self) -> &MarketIdentity;

    /// # Summary
    /// 获取指定周期按时间升序排列的已存储 K 线序列快照。
    ///
    /// # Arguments
    /// * `timeframe`: K 线周期。
    ///
    /// # Returns
    /// 按时间升序的 K 线向量，末尾可能是尚未收盘的当前桶。
    fn candles(&self, timeframe: TimeFrame) -> Vec<Candle>;

    /// # Summary
    /// 获取指定周期最近存储的一根 K 线。
    ///
    /// # Arguments
    /// * `timeframe`: K 线周期。
    ///
    /// # Returns
    /// 最近一根 K 线（可能未收盘），没有数据时返回 None。
    fn candle(&self, timeframe: TimeFrame) -> Option<Candle>;

    /// 最新买价
    fn bid(&self) -> Option<f64>;

    /// 最新卖价
    fn ask(&self) -> Option<f64>;

    /// # Summary
    /// 买卖中间价。
    ///
    /// # Logic
    /// 买卖价任一缺失时返回 None。
    fn mid(&self) -> Option<f64> {
        match (self.bid(), self.ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// 当前下单数量设置
    fn trade_quantity(&self) -> Decimal;

    /// 修改下单数量设置（指令面唯一写入口）
    fn set_trade_quantity(&self, quantity: Decimal);
}

/// # Summary
/// 行情来源接口（原始数据源）。
///
/// # Invariants
/// - 产出的 tick 时间戳必须非递减。
#[async_trait]
pub trait TickSource: Send + Sync {
    /// # Summary
    /// 订阅指定市场的实时 tick 流。
    ///
    /// # Arguments
    /// * `market`: 市场身份。
    ///
    /// # Returns
    /// 成功返回异步 tick 流。
    async fn subscribe(&self, market: &MarketIdentity) -> Result<TickStream, MarketError>;

    /// # Summary
    /// 获取指定市场的历史 K 线（用于启动期种子数据）。
    ///
    /// # Arguments
    /// * `market`: 市场身份。
    /// * `timeframe`: K 线周期。
    /// * `limit`: 回溯数量上限。
    ///
    /// # Returns
    /// 按时间升序的历史 K 线，末尾允许携带一根未收盘的当前桶。
    async fn history(
        &self,
        market: &MarketIdentity,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError>;
}
