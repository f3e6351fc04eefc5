use crate::notify::error::NotifyError;
use async_trait::async_trait;

/// # Summary
/// 策略状态变更通知接口。任何外部观察者必须可见的状态变更
/// （指令面成功修改后）都通过此端口以 fire-and-forget 方式广播。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持并发调用。
/// - 失败不得影响指令面已完成的状态变更。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Summary
    /// 广播指定市场的 StrategyTrader 状态已变更。
    ///
    /// # Arguments
    /// * `market` - 市场代码。
    ///
    /// # Returns
    /// * 成功返回 `Ok(())`，失败返回 `Err(NotifyError)`。
    async fn strategy_trader_updated(&self, market: &str) -> Result<(), NotifyError>;
}
