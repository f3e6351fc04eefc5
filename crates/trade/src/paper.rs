use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kawase_core::trade::port::{OrderExecutor, TradeError};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

/// 执行端挂载中的模拟订单。
#[derive(Debug, Clone)]
pub struct PaperOrder {
    // 市场代码
    pub symbol: String,
    // 委托数量
    pub quantity: Decimal,
    // 创建时间
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 纸面订单执行端：把订单簿完整保存在进程内，不触达任何真实券商通道。
/// 用于回放驱动的运行与持仓生命周期 (check/repair/remove) 的联调。
///
/// # Invariants
/// - 订单 ID 全局唯一，由执行端生成。
/// - 撤销不存在的订单返回 `TradeError::OrderNotFound`，与真实通道语义一致。
#[derive(Default)]
pub struct PaperExecutor {
    orders: DashMap<String, PaperOrder>,
}

impl PaperExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前挂载的订单数量
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// 查询一笔订单的快照
    pub fn order(&self, order_id: &str) -> Option<PaperOrder> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    /// # Summary
    /// 直接挂载一笔订单（绕过正常创建路径，用于状态装配）。
    pub fn place(&self, symbol: &str, quantity: Decimal) -> String {
        let id = Uuid::new_v4().to_string();
        self.orders.insert(
            id.clone(),
            PaperOrder {
                symbol: symbol.to_string(),
                quantity,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// # Summary
    /// 静默丢弃一笔订单（模拟执行端侧的订单消失，用于演练修复路径）。
    pub fn drop_order(&self, order_id: &str) -> bool {
        self.orders.remove(order_id).is_some()
    }
}

#[async_trait]
impl OrderExecutor for PaperExecutor {
    async fn has_order(&self, order_id: &str) -> bool {
        self.orders.contains_key(order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TradeError> {
        match self.orders.remove(order_id) {
            Some(_) => {
                info!("paper order {} cancelled", order_id);
                Ok(())
            }
            None => Err(TradeError::OrderNotFound(order_id.to_string())),
        }
    }

    async fn create_order(&self, symbol: &str, quantity: Decimal) -> Result<String, TradeError> {
        if quantity <= Decimal::ZERO {
            return Err(TradeError::Internal(format!(
                "非法的委托数量: {}",
                quantity
            )));
        }
        let id = self.place(symbol, quantity);
        debug!("paper order {} created on {} x {}", id, symbol, quantity);
        Ok(id)
    }
}
