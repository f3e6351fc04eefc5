use chrono::{DateTime, Utc};
use kawase_core::market::port::Instrument;
use kawase_core::strategy::entity::{Direction, OptionValue};
use kawase_core::strategy::port::{Alert, Region};
use kawase_core::trade::entity::{Trade, TradeType};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 策略域可变状态：区域、警报、开关与选项。
struct TraderState {
    // 自动交易开关
    activity: bool,
    // 策略倾向评分，统一 0..=100
    affinity: u8,
    // 开放键值选项
    options: HashMap<String, OptionValue>,
    regions: Vec<Box<dyn Region>>,
    alerts: Vec<Box<dyn Alert>>,
    next_region_id: u32,
    next_alert_id: u32,
}

/// 交易域可变状态：持仓记录集合。
struct TradeState {
    trades: Vec<Trade>,
    next_id: u32,
}

/// # Summary
/// 单市场交易上下文聚合根。策略域状态与交易域状态分属两把独立的锁，
/// 行情遍历与外部指令可以并发触碰不同域而互不阻塞。
///
/// # Invariants
/// - 任何方法至多持有一把锁；跨域操作必须先释放前一把。
/// - 锁内不做异步调用；需要触达执行端的操作先取出快照再在锁外执行。
/// - 区域与持仓的标识在各自集合内单调分配，移除不回收。
pub struct StrategyTrader {
    instrument: Arc<dyn Instrument>,
    state: Mutex<TraderState>,
    trades: Mutex<TradeState>,
}

impl StrategyTrader {
    pub fn new(instrument: Arc<dyn Instrument>) -> Self {
        Self {
            instrument,
            state: Mutex::new(TraderState {
                activity: false,
                affinity: 50,
                options: HashMap::new(),
                regions: Vec::new(),
                alerts: Vec::new(),
                next_region_id: 1,
                next_alert_id: 1,
            }),
            trades: Mutex::new(TradeState {
                trades: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn instrument(&self) -> &Arc<dyn Instrument> {
        &self.instrument
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TraderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_trades(&self) -> std::sync::MutexGuard<'_, TradeState> {
        self.trades.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---- 策略域 ----

    pub fn activity(&self) -> bool {
        self.lock_state().activity
    }

    /// # Returns
    /// 切换后的新值。
    pub fn set_activity(&self, activity: bool) -> bool {
        let mut state = self.lock_state();
        state.activity = activity;
        state.activity
    }

    pub fn affinity(&self) -> u8 {
        self.lock_state().affinity
    }

    pub fn set_affinity(&self, affinity: u8) {
        self.lock_state().affinity = affinity;
    }

    pub fn option(&self, key: &str) -> Option<OptionValue> {
        self.lock_state().options.get(key).cloned()
    }

    pub fn set_option(&self, key: String, value: OptionValue) {
        self.lock_state().options.insert(key, value);
    }

    /// # Returns
    /// 键是否真实存在并被移除。
    pub fn remove_option(&self, key: &str) -> bool {
        self.lock_state().options.remove(key).is_some()
    }

    pub fn options(&self) -> HashMap<String, OptionValue> {
        self.lock_state().options.clone()
    }

    /// # Summary
    /// 挂载一个已通过 `check()` 的区域并分配集合内唯一标识。
    ///
    /// # Returns
    /// 分配到的标识。
    pub fn add_region(&self, mut region: Box<dyn Region>) -> u32 {
        let mut state = self.lock_state();
        let id = state.next_region_id;
        state.next_region_id += 1;
        region.assign_id(id);
        state.regions.push(region);
        id
    }

    /// # Summary
    /// 按标识移除区域。
    ///
    /// # Returns
    /// 标识是否真实存在；不存在不是错误，由调用方决定如何陈述。
    pub fn remove_region(&self, id: u32) -> bool {
        let mut state = self.lock_state();
        let before = state.regions.len();
        state.regions.retain(|r| r.id() != id);
        state.regions.len() != before
    }

    pub fn region_ids(&self) -> Vec<u32> {
        self.lock_state().regions.iter().map(|r| r.id()).collect()
    }

    /// # Summary
    /// 用给定时刻与价格逐个判定区域，返回命中的标识。
    ///
    /// # Arguments
    /// * `direction`: 只判定方向兼容的区域（`Both` 与任何方向兼容）。
    pub fn test_regions(&self, at: DateTime<Utc>, price: f64, direction: Direction) -> Vec<u32> {
        self.lock_state()
            .regions
            .iter()
            .filter(|r| {
                let d = r.direction();
                d == Direction::Both || direction == Direction::Both || d == direction
            })
            .filter(|r| r.test(at, price))
            .map(|r| r.id())
            .collect()
    }

    /// 挂载一个已通过 `check()` 的警报并分配集合内唯一标识。
    pub fn add_alert(&self, mut alert: Box<dyn Alert>) -> u32 {
        let mut state = self.lock_state();
        let id = state.next_alert_id;
        state.next_alert_id += 1;
        alert.assign_id(id);
        state.alerts.push(alert);
        id
    }

    /// # Returns
    /// 标识是否真实存在并被移除。
    pub fn remove_alert(&self, id: u32) -> bool {
        let mut state = self.lock_state();
        let before = state.alerts.len();
        state.alerts.retain(|a| a.id() != id);
        state.alerts.len() != before
    }

    pub fn alert_ids(&self) -> Vec<u32> {
        self.lock_state().alerts.iter().map(|a| a.id()).collect()
    }

    /// # Summary
    /// 用最新报价逐个判定警报。
    ///
    /// # Logic
    /// 1. 命中的警报记录标识并消耗一次触发计数。
    /// 2. 计数耗尽的警报随即从集合中卸载。
    ///
    /// # Returns
    /// 本次触发的警报标识。
    pub fn fire_alerts(&self, at: DateTime<Utc>, bid: f64, ask: f64) -> Vec<u32> {
        let mut state = self.lock_state();
        let mut fired = Vec::new();
        state.alerts.retain_mut(|alert| {
            if alert.test(at, bid, ask) {
                fired.push(alert.id());
                alert.consume()
            } else {
                true
            }
        });
        fired
    }

    /// # Summary
    /// 卸载已越过到期时间的区域与警报。
    ///
    /// # Returns
    /// (卸载的区域数, 卸载的警报数)。
    pub fn prune_expired(&self, now: DateTime<Utc>) -> (usize, usize) {
        let mut state = self.lock_state();
        let regions_before = state.regions.len();
        state.regions.retain(|r| !r.is_expired(now));
        let regions_pruned = regions_before - state.regions.len();
        let alerts_before = state.alerts.len();
        state.alerts.retain(|a| !a.is_expired(now));
        let alerts_pruned = alerts_before - state.alerts.len();
        (regions_pruned, alerts_pruned)
    }

    // ---- 交易域 ----

    /// # Summary
    /// 追加一笔新持仓记录并分配集合内唯一标识。
    pub fn open_trade(
        &self,
        trade_type: TradeType,
        direction: Direction,
        invested_quantity: Decimal,
        opened_at: DateTime<Utc>,
    ) -> u32 {
        let mut trades = self.lock_trades();
        let id = trades.next_id;
        trades.next_id += 1;
        let trade = Trade::new(id, trade_type, direction, invested_quantity, opened_at);
        trades.trades.push(trade);
        id
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.lock_trades().trades.clone()
    }

    /// # Summary
    /// 按标识定位持仓快照。
    ///
    /// # Arguments
    /// * `id`: 持仓标识；None 表示集合内最近追加的一笔。
    pub fn trade(&self, id: Option<u32>) -> Option<Trade> {
        let trades = self.lock_trades();
        match id {
            Some(id) => trades.trades.iter().find(|t| t.id == id).cloned(),
            None => trades.trades.last().cloned(),
        }
    }

    /// # Summary
    /// 原地更新一笔持仓。
    ///
    /// # Arguments
    /// * `id`: 持仓标识；None 表示最近追加的一笔。
    /// * `apply`: 锁内执行的变更闭包。
    ///
    /// # Returns
    /// 更新后的持仓快照；标识不存在返回 None。
    pub fn update_trade(
        &self,
        id: Option<u32>,
        apply: impl FnOnce(&mut Trade),
    ) -> Option<Trade> {
        let mut trades = self.lock_trades();
        let trade = match id {
            Some(id) => trades.trades.iter_mut().find(|t| t.id == id),
            None => trades.trades.last_mut(),
        }?;
        apply(trade);
        Some(trade.clone())
    }

    /// # Summary
    /// 摘除一笔持仓并移交所有权，供调用方在锁外完成执行端撤单。
    ///
    /// # Returns
    /// 摘除的持仓；标识不存在返回 None。
    pub fn take_trade(&self, id: Option<u32>) -> Option<Trade> {
        let mut trades = self.lock_trades();
        let index = match id {
            Some(id) => trades.trades.iter().position(|t| t.id == id)?,
            None => trades.trades.len().checked_sub(1)?,
        };
        Some(trades.trades.remove(index))
    }

    /// 执行端撤单失败时将摘除的持仓放回集合。
    pub fn restore_trade(&self, trade: Trade) {
        self.lock_trades().trades.push(trade);
    }
}
