use crate::strategy::entity::Direction;
use crate::trade::port::{OrderExecutor, TradeError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// # Summary
/// 持仓记录的资金模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    /// 现货资产
    Asset,
    /// 保证金
    Margin,
    /// 独立保证金
    IndMargin,
    /// 净持仓
    Position,
}

/// # Summary
/// `check()` 的三态结果。
///
/// # Invariants
/// - `score()` 恒等映射到 -1/0/+1 契约：负数不可恢复，零可修复，正数健康。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeHealth {
    /// 不可恢复的账目错误
    Broken,
    /// 可恢复，需执行 repair
    NeedsRepair,
    /// 健康
    Healthy,
}

impl TradeHealth {
    /// 契约数值形态：-1 / 0 / +1
    pub fn score(self) -> i32 {
        match self {
            TradeHealth::Broken => -1,
            TradeHealth::NeedsRepair => 0,
            TradeHealth::Healthy => 1,
        }
    }
}

/// # Summary
/// 开平仓持仓记录实体。内部盈亏计算属外部协作者范畴，
/// 本核心只承载其 check/repair/remove 生命周期契约与数量字段。
///
/// # Invariants
/// - `id` 在归属的 StrategyTrader 交易集合内唯一。
/// - `exit_quantity` 超过 `entry_quantity` 属于不可恢复状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    // 集合内唯一标识
    pub id: u32,
    // 资金模式
    pub trade_type: TradeType,
    // 持仓方向
    pub direction: Direction,
    // 初始投入数量
    pub invested_quantity: Decimal,
    // 累计入场数量
    pub entry_quantity: Decimal,
    // 累计出场数量
    pub exit_quantity: Decimal,
    // 入场均价
    pub entry_price: Decimal,
    // 入场订单 ID
    pub entry_order_id: Option<String>,
    // 止损订单 ID
    pub stop_order_id: Option<String>,
    // 止盈订单 ID
    pub limit_order_id: Option<String>,
    // 开仓时间
    pub opened_at: DateTime<Utc>,
}

impl Trade {
    /// # Logic
    /// 创建一笔全新的持仓记录，入场出场数量清零。
    pub fn new(
        id: u32,
        trade_type: TradeType,
        direction: Direction,
        invested_quantity: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            trade_type,
            direction,
            invested_quantity,
            entry_quantity: Decimal::ZERO,
            exit_quantity: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            entry_order_id: None,
            stop_order_id: None,
            limit_order_id: None,
            opened_at,
        }
    }

    /// 当前挂载的全部订单 ID
    pub fn order_ids(&self) -> Vec<&str> {
        [
            self.entry_order_id.as_deref(),
            self.stop_order_id.as_deref(),
            self.limit_order_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// # Summary
    /// 校验持仓与执行端订单状态的一致性。
    ///
    /// # Logic
    /// 1. 数量字段自相矛盾（出场超过入场，或投入非正）判为 Broken。
    /// 2. 已入场但声明的保护性订单在执行端缺失，判为 NeedsRepair。
    /// 3. 其余情况判为 Healthy。
    ///
    /// # Arguments
    /// * `executor`: 订单执行协作者。
    ///
    /// # Returns
    /// 三态健康结果。
    pub async fn check(&self, executor: &dyn OrderExecutor) -> TradeHealth {
        if self.invested_quantity <= Decimal::ZERO || self.exit_quantity > self.entry_quantity {
            return TradeHealth::Broken;
        }

        if self.entry_quantity > Decimal::ZERO {
            for oid in [&self.stop_order_id, &self.limit_order_id].into_iter().flatten() {
                if !executor.has_order(oid).await {
                    return TradeHealth::NeedsRepair;
                }
            }
        }

        TradeHealth::Healthy
    }

    /// # Summary
    /// 重建执行端缺失的保护性订单。
    ///
    /// # Logic
    /// 1. 逐个检查止损/止盈订单是否仍然挂载。
    /// 2. 缺失的订单按剩余数量重新创建并回写新 ID。
    /// 3. 任一创建失败即视为修复失败，已成功的部分保留。
    ///
    /// # Arguments
    /// * `executor`: 订单执行协作者。
    /// * `symbol`: 市场代码。
    ///
    /// # Returns
    /// 修复是否完整成功。
    pub async fn repair(&mut self, executor: &dyn OrderExecutor, symbol: &str) -> bool {
        let remaining = self.entry_quantity - self.exit_quantity;
        let mut repaired = true;

        for slot in [&mut self.stop_order_id, &mut self.limit_order_id] {
            let missing = match slot {
                Some(oid) => !executor.has_order(oid).await,
                None => false,
            };
            if missing {
                match executor.create_order(symbol, remaining).await {
                    Ok(new_id) => *slot = Some(new_id),
                    Err(e) => {
                        warn!("Trade {} repair failed on {}: {}", self.id, symbol, e);
                        repaired = false;
                    }
                }
            }
        }

        repaired
    }

    /// # Summary
    /// 撤销该持仓在执行端的全部订单。
    ///
    /// # Logic
    /// 逐个撤单；首个通道失败立即返回错误，持仓本身由调用方决定去留。
    ///
    /// # Arguments
    /// * `executor`: 订单执行协作者。
    ///
    /// # Returns
    /// 全部撤销成功返回 Ok。
    pub async fn remove(&self, executor: &dyn OrderExecutor) -> Result<(), TradeError> {
        for oid in self.order_ids() {
            match executor.cancel_order(oid).await {
                Ok(()) => {}
                // 已不存在视作撤销完成
                Err(TradeError::OrderNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
