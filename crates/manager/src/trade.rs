use crate::strategy::StrategyService;
use kawase_core::command::entity::CommandResult;
use kawase_core::trade::entity::TradeHealth;
use serde_json::Value;
use tracing::info;

/// # Summary
/// 从载荷解析持仓定位符。
///
/// # Logic
/// 数值按持仓标识解释；文本 "last" 或字段缺失表示集合内最近的一笔；
/// 其余形态是校验错误。
fn parse_trade_id(payload: &Value) -> Result<Option<u32>, CommandResult> {
    match payload.get("id") {
        None => Ok(None),
        Some(Value::String(s)) if s == "last" => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| CommandResult::failure("trade id out of range")),
        Some(_) => Err(CommandResult::failure("trade id must be a number or \"last\"")),
    }
}

impl StrategyService {
    /// # Summary
    /// 校验一笔持仓与执行端的一致性，按需触发修复。
    ///
    /// # Logic
    /// 1. 按标识（或 "last" 哨兵）定位持仓；不存在即失败。
    /// 2. 三态健康结果：负数是不可恢复错误；零可修复，载荷带 `repair`
    ///    时执行修复并按成败产出不同消息；正数健康。
    /// 3. 非负结果广播一次状态更新。
    ///
    /// # Arguments
    /// * `market`: 市场代码。
    /// * `payload`: 指令载荷，键 `id` 与 `repair`。
    ///
    /// # Returns
    /// 统一结果信封。
    pub async fn cmd_trade_check(&self, market: &str, payload: &Value) -> CommandResult {
        let Some(trader) = self.trader(market) else {
            return CommandResult::failure(format!("unknown market {}", market));
        };
        let locator = match parse_trade_id(payload) {
            Ok(l) => l,
            Err(r) => return r,
        };
        let Some(trade) = trader.trade(locator) else {
            return CommandResult::failure("trade not found");
        };

        let mut result = CommandResult::success();
        let health = trade.check(self.executor.as_ref()).await;
        match health {
            TradeHealth::Broken => {
                result.fail(format!("trade {} check failed: unrecoverable", trade.id));
            }
            TradeHealth::NeedsRepair => {
                result.push(format!("trade {} needs repair", trade.id));
                if payload.get("repair").and_then(Value::as_bool).unwrap_or(false) {
                    // 修复在锁外进行，结果回写集合
                    let mut repaired = trade.clone();
                    let symbol = trader.instrument().identity().symbol.clone();
                    if repaired.repair(self.executor.as_ref(), &symbol).await {
                        trader.update_trade(Some(trade.id), |t| *t = repaired.clone());
                        result.push(format!("trade {} repaired", trade.id));
                    } else {
                        // 部分重建的订单仍然保留
                        trader.update_trade(Some(trade.id), |t| *t = repaired.clone());
                        result.fail(format!("trade {} repair failed", trade.id));
                    }
                }
            }
            TradeHealth::Healthy => {
                result.push(format!("trade {} healthy", trade.id));
            }
        }

        if health.score() >= 0 {
            self.notify(market).await;
        }
        result
    }

    /// # Summary
    /// 清除一笔持仓：撤销其执行端订单并从集合中移除，不保留历史。
    ///
    /// # Logic
    /// 1. 按标识（或 "last" 哨兵）摘除持仓；不存在即失败。
    /// 2. 锁外撤单；通道失败时把持仓放回集合并报错，核心状态不受损。
    /// 3. 移除完成后广播状态更新。
    pub async fn cmd_trade_clean(&self, market: &str, payload: &Value) -> CommandResult {
        let Some(trader) = self.trader(market) else {
            return CommandResult::failure(format!("unknown market {}", market));
        };
        let locator = match parse_trade_id(payload) {
            Ok(l) => l,
            Err(r) => return r,
        };
        let Some(trade) = trader.take_trade(locator) else {
            return CommandResult::failure("trade not found");
        };

        if let Err(e) = trade.remove(self.executor.as_ref()).await {
            let id = trade.id;
            trader.restore_trade(trade);
            return CommandResult::failure(format!("trade {} clean failed: {}", id, e));
        }

        info!("{} trade {} removed", market, trade.id);
        self.notify(market).await;
        let mut result = CommandResult::success();
        result.push(format!("trade {} removed", trade.id));
        result
    }

    /// # Summary
    /// 复检单个市场的全部持仓，逐笔产出健康消息。
    ///
    /// # Returns
    /// 任何一笔不可恢复即置位错误标记。
    pub async fn cmd_strategy_trader_recheck(&self, market: &str) -> CommandResult {
        let Some(trader) = self.trader(market) else {
            return CommandResult::failure(format!("unknown market {}", market));
        };

        let mut result = CommandResult::success();
        for trade in trader.trades() {
            match trade.check(self.executor.as_ref()).await {
                TradeHealth::Broken => {
                    result.fail(format!("trade {} check failed: unrecoverable", trade.id));
                }
                TradeHealth::NeedsRepair => {
                    result.push(format!("trade {} needs repair", trade.id));
                }
                TradeHealth::Healthy => {
                    result.push(format!("trade {} healthy", trade.id));
                }
            }
        }
        result
    }

    /// 全市场扇出复检，每个市场一个结果信封。
    pub async fn cmd_strategy_trader_recheck_all(&self) -> Vec<(String, CommandResult)> {
        let mut results = Vec::new();
        for market in self.markets() {
            let result = self.cmd_strategy_trader_recheck(&market).await;
            results.push((market, result));
        }
        results
    }
}
