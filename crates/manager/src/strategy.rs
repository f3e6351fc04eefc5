use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kawase_core::command::entity::CommandResult;
use kawase_core::common::TimeFrame;
use kawase_core::notify::port::Notifier;
use kawase_core::strategy::entity::{Direction, OptionValue, Stage};
use kawase_core::strategy::error::StrategyError;
use kawase_core::strategy::port::{AlertRegistry, RegionRegistry};
use kawase_core::trade::port::OrderExecutor;
use kawase_strategy::trader::StrategyTrader;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// # Summary
/// 策略服务，指令面的应用服务层门面 (Facade)。
/// 持有全体市场的 StrategyTrader 注册表与区域/警报变体注册表，
/// 编译期仅依赖 `kawase-core` 中的 Trait 定义，具体实现通过构造函数注入。
///
/// # Invariants
/// - 每个指令无论成败都返回 `CommandResult` 信封，不向调用方抛错。
/// - 任何变更前先完成全部校验；校验失败时不得发生部分变更。
/// - 成功的变更之后通过 Notifier 广播，广播失败只记日志。
pub struct StrategyService {
    // 市场代码到交易上下文的注册表
    traders: DashMap<String, Arc<StrategyTrader>>,
    // 区域变体注册表，启动期装配后只读
    regions: RegionRegistry,
    // 警报变体注册表，启动期装配后只读
    alerts: AlertRegistry,
    // 订单执行协作者
    pub(crate) executor: Arc<dyn OrderExecutor>,
    // 状态变更广播协作者
    notifier: Arc<dyn Notifier>,
}

impl StrategyService {
    pub fn new(
        regions: RegionRegistry,
        alerts: AlertRegistry,
        executor: Arc<dyn OrderExecutor>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            traders: DashMap::new(),
            regions,
            alerts,
            executor,
            notifier,
        })
    }

    /// 注册一个市场的交易上下文
    pub fn register(&self, market: impl Into<String>, trader: Arc<StrategyTrader>) {
        self.traders.insert(market.into(), trader);
    }

    pub fn trader(&self, market: &str) -> Option<Arc<StrategyTrader>> {
        self.traders.get(market).map(|t| t.clone())
    }

    /// 已注册的市场代码列表
    pub fn markets(&self) -> Vec<String> {
        self.traders.iter().map(|e| e.key().clone()).collect()
    }

    /// 状态变更后的 fire-and-forget 广播
    pub(crate) async fn notify(&self, market: &str) {
        if let Err(e) = self.notifier.strategy_trader_updated(market).await {
            warn!("{} update notification failed: {}", market, e);
        }
    }

    /// # Summary
    /// 单市场设置/区域/警报变更指令的统一入口。
    ///
    /// # Logic
    /// 1. 解析目标市场与 `action`，两者缺一即失败。
    /// 2. 按 action 分派；每个分支先完成全部校验再变更。
    /// 3. 仅在真正发生变更时广播状态更新；幂等移除不存在的
    ///    标识不触发广播。
    ///
    /// # Arguments
    /// * `market`: 市场代码。
    /// * `payload`: 指令载荷，键语义按 action 定义。
    ///
    /// # Returns
    /// 统一结果信封。
    pub async fn cmd_strategy_trader_modify(&self, market: &str, payload: &Value) -> CommandResult {
        let Some(trader) = self.trader(market) else {
            return CommandResult::failure(format!("unknown market {}", market));
        };
        let Some(action) = payload.get("action").and_then(Value::as_str) else {
            return CommandResult::failure("missing action");
        };

        let result = match action {
            "enable" => Self::modify_activity(&trader, Some(true)),
            "disable" => Self::modify_activity(&trader, Some(false)),
            "toggle" => Self::modify_activity(&trader, None),
            "set-quantity" => Self::modify_quantity(&trader, payload),
            "set-affinity" => Self::modify_affinity(&trader, payload),
            "set-option" => Self::modify_option(&trader, payload),
            "del-option" => Self::remove_option(&trader, payload),
            "add-region" => self.add_region(&trader, payload),
            "del-region" => Self::remove_region(&trader, payload),
            "add-alert" => self.add_alert(&trader, payload),
            "del-alert" => Self::remove_alert(&trader, payload),
            other => CommandResult::failure(format!("unknown action {}", other)),
        };

        if !result.error && result.mutated {
            self.notify(market).await;
        }
        result
    }

    /// # Summary
    /// 全市场扇出变体：在注册表上逐市场委托单市场指令。
    ///
    /// # Returns
    /// 每个市场一个 (市场代码, 结果信封)。
    pub async fn cmd_strategy_trader_modify_all(
        &self,
        payload: &Value,
    ) -> Vec<(String, CommandResult)> {
        let mut results = Vec::new();
        for market in self.markets() {
            let result = self.cmd_strategy_trader_modify(&market, payload).await;
            results.push((market, result));
        }
        results
    }

    fn modify_activity(trader: &StrategyTrader, target: Option<bool>) -> CommandResult {
        let next = target.unwrap_or(!trader.activity());
        let activity = trader.set_activity(next);
        info!(
            "{} activity set to {}",
            trader.instrument().identity().symbol,
            activity
        );
        let mut result = CommandResult::success();
        result.push(format!("activity set to {}", activity));
        result.activity = Some(activity);
        result.mutated = true;
        result
    }

    fn modify_quantity(trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let Some(quantity) = parse_decimal(payload.get("quantity")) else {
            return CommandResult::failure("quantity must be a positive number");
        };
        if quantity <= Decimal::ZERO {
            return CommandResult::failure("quantity must be a positive number");
        }
        trader.instrument().set_trade_quantity(quantity);
        let mut result = CommandResult::success();
        result.push(format!("trade quantity set to {}", quantity));
        result.quantity = Some(quantity);
        result.mutated = true;
        result
    }

    // 亲和度上下界在单市场与全市场路径统一为 0..=100
    fn modify_affinity(trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let affinity = payload
            .get("affinity")
            .and_then(Value::as_u64)
            .filter(|v| *v <= 100)
            .and_then(|v| u8::try_from(v).ok());
        let Some(affinity) = affinity else {
            return CommandResult::failure("affinity must be within 0..=100");
        };
        trader.set_affinity(affinity);
        let mut result = CommandResult::success();
        result.push(format!("affinity set to {}", affinity));
        result.affinity = Some(affinity);
        result.mutated = true;
        result
    }

    fn modify_option(trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let Some(key) = payload.get("key").and_then(Value::as_str).filter(|k| !k.is_empty())
        else {
            return CommandResult::failure("option key must be a non-empty string");
        };
        let Some(raw) = payload.get("value") else {
            return CommandResult::failure("missing option value");
        };
        let value = match OptionValue::from_json(raw) {
            Ok(v) => v,
            Err(e) => return CommandResult::failure(e.to_string()),
        };
        trader.set_option(key.to_string(), value);
        let mut result = CommandResult::success();
        result.push(format!("option {} set", key));
        result.mutated = true;
        result
    }

    fn remove_option(trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let Some(key) = payload.get("key").and_then(Value::as_str) else {
            return CommandResult::failure("missing option key");
        };
        let mut result = CommandResult::success();
        if trader.remove_option(key) {
            result.push(format!("option {} removed", key));
            result.mutated = true;
        } else {
            // 幂等移除：不存在不是错误
            result.push(format!("invalid identifier {}", key));
        }
        result
    }

    /// # Summary
    /// 区域挂载：构造、配置、自检全部通过后才进集合。
    fn add_region(&self, trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let name = payload.get("name").and_then(Value::as_str).unwrap_or("");
        let stage = match parse_enum::<Stage>(payload, "stage", Stage::Both) {
            Ok(v) => v,
            Err(r) => return r,
        };
        let direction = match parse_enum::<Direction>(payload, "direction", Direction::Both) {
            Ok(v) => v,
            Err(r) => return r,
        };
        let timeframe = match parse_timeframe(payload) {
            Ok(v) => v,
            Err(r) => return r,
        };

        let mut region = match self.regions.build(name, Utc::now(), stage, direction, timeframe) {
            Ok(r) => r,
            Err(e) => return CommandResult::failure(e.to_string()),
        };
        region.set_expiry(parse_expiry(payload));

        let params = payload.get("params").cloned().unwrap_or(Value::Null);
        if let Err(e) = region.init(&params) {
            return CommandResult::failure(e.to_string());
        }
        if !region.check() {
            return CommandResult::failure(format!("region {}: {}", name, StrategyError::CheckFailed));
        }

        let id = trader.add_region(region);
        info!(
            "{} region {} ({}) added",
            trader.instrument().identity().symbol,
            id,
            name
        );
        let mut result = CommandResult::success();
        result.push(format!("region {} added", id));
        result.mutated = true;
        result
    }

    fn remove_region(trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let Some(id) = payload.get("id").and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok())
        else {
            return CommandResult::failure("missing region id");
        };
        let mut result = CommandResult::success();
        if trader.remove_region(id) {
            result.push(format!("region {} removed", id));
            result.mutated = true;
        } else {
            result.push(format!("invalid identifier {}", id));
        }
        result
    }

    /// # Summary
    /// 警报挂载。载荷携带 `price` 时先把它归一化为绝对触发价：
    /// 价格来源选择器 (`bid`/`ask`/`mid`，默认 mid) 解析市场参考价，
    /// 方法选择器 (`price` 绝对值 / `market-delta-percent` / `market-delta-price`)
    /// 在参考价上解析绝对触发价。非法方法、未知来源或解析出的
    /// 非正价格都是校验失败，不发生挂载。
    fn add_alert(&self, trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let name = payload.get("name").and_then(Value::as_str).unwrap_or("");
        let timeframe = match parse_timeframe(payload) {
            Ok(v) => v,
            Err(r) => return r,
        };
        let countdown = payload
            .get("countdown")
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(-1);

        let mut alert = match self.alerts.build(name, Utc::now(), timeframe, countdown) {
            Ok(a) => a,
            Err(e) => return CommandResult::failure(e.to_string()),
        };
        alert.set_expiry(parse_expiry(payload));

        let mut params = payload.get("params").cloned().unwrap_or(Value::Null);
        if params.get("price").is_some() {
            let resolved =
                match Self::resolve_trigger_price(trader, &params) {
                    Ok(p) => p,
                    Err(r) => return r,
                };
            if let Value::Object(map) = &mut params {
                map.insert("price".to_string(), resolved.into());
            }
        }

        if let Err(e) = alert.init(&params) {
            return CommandResult::failure(e.to_string());
        }
        if !alert.check() {
            return CommandResult::failure(format!("alert {}: {}", name, StrategyError::CheckFailed));
        }

        let id = trader.add_alert(alert);
        info!(
            "{} alert {} ({}) added",
            trader.instrument().identity().symbol,
            id,
            name
        );
        let mut result = CommandResult::success();
        result.push(format!("alert {} added", id));
        result.mutated = true;
        result
    }

    /// 把载荷中的 `price` 按来源与方法解析为绝对触发价。
    fn resolve_trigger_price(
        trader: &StrategyTrader,
        params: &Value,
    ) -> Result<f64, CommandResult> {
        let Some(price) = params.get("price").and_then(Value::as_f64) else {
            return Err(CommandResult::failure("price must be a number"));
        };

        let instrument = trader.instrument();
        let source = params.get("source").and_then(Value::as_str).unwrap_or("mid");
        let reference = match source {
            "bid" => instrument.bid(),
            "ask" => instrument.ask(),
            "mid" => instrument.mid(),
            other => {
                return Err(CommandResult::failure(format!(
                    "unknown price source {}",
                    other
                )));
            }
        };

        let method = params.get("method").and_then(Value::as_str).unwrap_or("price");
        let resolved = match method {
            "price" => Some(price),
            "market-delta-percent" => reference.map(|r| r * (1.0 + price / 100.0)),
            "market-delta-price" => reference.map(|r| r + price),
            other => {
                return Err(CommandResult::failure(format!(
                    "unknown price method {}",
                    other
                )));
            }
        };

        match resolved {
            Some(p) if p > 0.0 => Ok(p),
            Some(_) => Err(CommandResult::failure("resolved trigger price is not positive")),
            None => Err(CommandResult::failure("no market reference price available")),
        }
    }

    fn remove_alert(trader: &StrategyTrader, payload: &Value) -> CommandResult {
        let Some(id) = payload.get("id").and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok())
        else {
            return CommandResult::failure("missing alert id");
        };
        let mut result = CommandResult::success();
        if trader.remove_alert(id) {
            result.push(format!("alert {} removed", id));
            result.mutated = true;
        } else {
            result.push(format!("invalid identifier {}", id));
        }
        result
    }
}

/// 解析可选的枚举字段；缺失时回退默认值，非法值作为失败信封返回。
fn parse_enum<T>(payload: &Value, key: &str, default: T) -> Result<T, CommandResult>
where
    T: FromStr<Err = String>,
{
    match payload.get(key).and_then(Value::as_str) {
        Some(text) => text.parse::<T>().map_err(CommandResult::failure),
        None => Ok(default),
    }
}

fn parse_timeframe(payload: &Value) -> Result<TimeFrame, CommandResult> {
    let Some(text) = payload.get("timeframe").and_then(Value::as_str) else {
        return Err(CommandResult::failure("missing timeframe"));
    };
    text.parse::<TimeFrame>().map_err(CommandResult::failure)
}

/// 可选的绝对到期时间，epoch 秒。
fn parse_expiry(payload: &Value) -> Option<DateTime<Utc>> {
    payload
        .get("expiry")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// 接受数值或字符串形态的数量字段。
fn parse_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .or_else(|| n.as_i64().map(Decimal::from)),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}
