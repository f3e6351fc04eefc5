use crate::buffer::RollingWindow;
use kawase_core::common::{MarketIdentity, TimeFrame};
use kawase_core::market::entity::{Candle, Tick};
use kawase_core::market::port::Instrument;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// 单个周期的存储状态：已收盘历史窗口加上进行中的当前桶快照。
#[derive(Debug)]
struct Series {
    closed: RollingWindow<Candle>,
    current: Option<Candle>,
}

/// 最新买卖报价。
#[derive(Debug, Default, Clone, Copy)]
struct Quote {
    bid: Option<f64>,
    ask: Option<f64>,
}

/// # Summary
/// Instrument 聚合根的具体实现：按市场持有各周期 K 线序列、
/// 最新报价与下单数量设置。
///
/// # Invariants
/// - K 线序列仅由该市场的聚合任务写入（单一写者），读者取得时点快照。
/// - 互斥锁的临界区只做内存读写，绝不跨越 I/O。
pub struct InstrumentInner {
    // 市场身份
    identity: MarketIdentity,
    // 各周期的存储状态
    series: Mutex<HashMap<TimeFrame, Series>>,
    // 最新报价
    quote: Mutex<Quote>,
    // 下单数量设置（指令面唯一写入口）
    trade_quantity: Mutex<Decimal>,
    // 每周期保留的历史样本数
    capacity: usize,
}

impl InstrumentInner {
    /// # Summary
    /// 创建聚合根实例。
    ///
    /// # Arguments
    /// * `identity`: 市场身份。
    /// * `capacity`: 每个周期保留的已收盘 K 线数量。
    /// * `trade_quantity`: 初始下单数量。
    pub fn new(identity: MarketIdentity, capacity: usize, trade_quantity: Decimal) -> Self {
        Self {
            identity,
            series: Mutex::new(HashMap::new()),
            quote: Mutex::new(Quote::default()),
            trade_quantity: Mutex::new(trade_quantity),
            capacity,
        }
    }

    /// # Summary
    /// 用 tick 刷新最新报价。
    ///
    /// # Arguments
    /// * `tick`: 新到的行情事件。
    pub fn apply_tick(&self, tick: &Tick) {
        let mut quote = self.quote.lock().unwrap_or_else(|e| e.into_inner());
        quote.bid = Some(tick.bid);
        quote.ask = Some(tick.ask);
    }

    /// # Summary
    /// 存入一根 K 线。
    ///
    /// # Logic
    /// 1. 已收盘：追加进该周期的历史窗口；若与当前桶同起点，当前桶清空。
    /// 2. 未收盘：整根替换该周期的当前桶快照。
    ///
    /// # Arguments
    /// * `candle`: 待存入的 K 线（含其所属周期）。
    pub fn store_candle(&self, candle: Candle) {
        let mut series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        let slot = series.entry(candle.timeframe).or_insert_with(|| Series {
            closed: RollingWindow::new(self.capacity),
            current: None,
        });

        if candle.consolidated {
            if slot.current.as_ref().is_some_and(|c| c.time == candle.time) {
                slot.current = None;
            }
            debug!(
                "{} stores closed {} candle at {}",
                self.identity.symbol, candle.timeframe, candle.time
            );
            slot.closed.push(candle);
        } else {
            slot.current = Some(candle);
        }
    }

    /// 历史种子批量导入（启动期）。
    pub fn seed_history(&self, candles: Vec<Candle>) {
        for candle in candles {
            self.store_candle(candle);
        }
    }
}

impl Instrument for InstrumentInner {
    fn identity(&self) -> &MarketIdentity {
        &self.identity
    }

    /// # Summary
    /// 按时间升序返回指定周期的 K 线快照，末尾附带进行中的当前桶。
    fn candles(&self, timeframe: TimeFrame) -> Vec<Candle> {
        let series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        match series.get(&timeframe) {
            Some(slot) => {
                let mut out = slot.closed.to_vec();
                if let Some(current) = &slot.current {
                    out.push(current.clone());
                }
                out
            }
            None => Vec::new(),
        }
    }

    /// # Summary
    /// 指定周期最近存储的一根 K 线：优先返回进行中的当前桶。
    fn candle(&self, timeframe: TimeFrame) -> Option<Candle> {
        let series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        let slot = series.get(&timeframe)?;
        slot.current.clone().or_else(|| slot.closed.last().cloned())
    }

    fn bid(&self) -> Option<f64> {
        self.quote.lock().unwrap_or_else(|e| e.into_inner()).bid
    }

    fn ask(&self) -> Option<f64> {
        self.quote.lock().unwrap_or_else(|e| e.into_inner()).ask
    }

    fn trade_quantity(&self) -> Decimal {
        *self
            .trade_quantity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn set_trade_quantity(&self, quantity: Decimal) {
        let mut q = self
            .trade_quantity
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *q = quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    fn candle(secs: i64, close: f64, consolidated: bool) -> Candle {
        Candle {
            time: DateTime::from_timestamp(secs, 0).unwrap(),
            timeframe: TimeFrame::Minute1,
            open: close,
            high: close,
            low: close,
            close,
            spread: 0.1,
            volume: 1.0,
            consolidated,
        }
    }

    #[test]
    fn test_store_and_snapshot() {
        let inst = InstrumentInner::new(MarketIdentity::from_symbol("EURUSD"), 10, dec!(1));
        inst.store_candle(candle(0, 10.0, true));
        inst.store_candle(candle(60, 10.1, false));

        let all = inst.candles(TimeFrame::Minute1);
        assert_eq!(all.len(), 2);
        assert!(!all[1].consolidated);

        // candle() 优先返回进行中的当前桶
        let latest = inst.candle(TimeFrame::Minute1).unwrap();
        assert_eq!(latest.close, 10.1);
        assert!(!latest.consolidated);
    }

    #[test]
    fn test_closing_replaces_current() {
        let inst = InstrumentInner::new(MarketIdentity::from_symbol("EURUSD"), 10, dec!(1));
        inst.store_candle(candle(60, 10.1, false));
        inst.store_candle(candle(60, 10.2, true));

        let all = inst.candles(TimeFrame::Minute1);
        assert_eq!(all.len(), 1);
        assert!(all[0].consolidated);
        assert_eq!(all[0].close, 10.2);
    }

    #[test]
    fn test_quote_and_mid() {
        let inst = InstrumentInner::new(MarketIdentity::from_symbol("EURUSD"), 10, dec!(1));
        assert!(inst.mid().is_none());
        inst.apply_tick(&Tick {
            time: DateTime::from_timestamp(0, 0).unwrap(),
            bid: 1.0,
            ask: 1.2,
            last: 1.1,
            volume: 1.0,
        });
        assert_eq!(inst.bid(), Some(1.0));
        assert_eq!(inst.ask(), Some(1.2));
        assert!((inst.mid().unwrap() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_trade_quantity_mutation() {
        let inst = InstrumentInner::new(MarketIdentity::from_symbol("EURUSD"), 10, dec!(1));
        inst.set_trade_quantity(dec!(2.5));
        assert_eq!(inst.trade_quantity(), dec!(2.5));
    }
}
