use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// # Summary
/// 交易协作环节中可能发生的错误。
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("订单未找到或不存在: {0}")]
    OrderNotFound(String),
    #[error("底层券商通道错误: {0}")]
    Broker(String),
    #[error("内部系统错误: {0}")]
    Internal(String),
}

/// # Summary
/// 订单执行协作者接口。持仓的 check/repair/remove 生命周期通过此端口
/// 查询、补挂和撤销其关联的保护性订单。
///
/// # Invariants
/// - 实现必须是异步且线程安全的 (`Send + Sync`)。
/// - 核心逻辑将其视为可能失败的外部调用，不做重试。
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// # Summary
    /// 查询指定订单是否仍然挂载在执行端。
    ///
    /// # Arguments
    /// * `order_id` - 订单系统 ID。
    ///
    /// # Returns
    /// * `bool` - 订单是否存在。
    async fn has_order(&self, order_id: &str) -> bool;

    /// # Summary
    /// 撤销一笔挂载中的订单。
    ///
    /// # Arguments
    /// * `order_id` - 订单系统 ID。
    ///
    /// # Returns
    /// * 订单不存在或通道失败时返回 `TradeError`。
    async fn cancel_order(&self, order_id: &str) -> Result<(), TradeError>;

    /// # Summary
    /// 在执行端创建一笔新订单（用于修复缺失的保护性订单）。
    ///
    /// # Arguments
    /// * `symbol` - 市场代码。
    /// * `quantity` - 委托数量。
    ///
    /// # Returns
    /// * `Ok(String)` - 新订单的系统 ID。
    async fn create_order(&self, symbol: &str, quantity: Decimal) -> Result<String, TradeError>;
}
