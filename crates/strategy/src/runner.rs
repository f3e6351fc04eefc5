use crate::timeframe::TimeframeBasedSub;
use crate::trader::StrategyTrader;
use futures::StreamExt;
use kawase_core::market::entity::Tick;
use kawase_core::market::error::MarketError;
use kawase_core::market::port::{Instrument, TickSource, TickStream};
use kawase_core::strategy::entity::Direction;
use kawase_market::instrument::InstrumentInner;
use std::sync::Arc;
use tracing::{debug, info};

/// # Summary
/// 单市场行情处理循环。持有该市场全部 (周期, 计算单元) 并按固定遍历
/// 顺序驱动：报价更新、聚合、指标重算、信号判定、簿记收尾。
///
/// # Invariants
/// - 聚合路径是 Instrument 各周期序列的唯一写者。
/// - 每笔 tick 对每个计算单元恰好执行一次完整遍历。
pub struct MarketRunner {
    instrument: Arc<InstrumentInner>,
    trader: Arc<StrategyTrader>,
    subs: Vec<TimeframeBasedSub>,
}

impl MarketRunner {
    pub fn new(
        instrument: Arc<InstrumentInner>,
        trader: Arc<StrategyTrader>,
        subs: Vec<TimeframeBasedSub>,
    ) -> Self {
        Self {
            instrument,
            trader,
            subs,
        }
    }

    /// # Summary
    /// 启动期引导：拉取各周期历史 K 线作为种子，并把存储序列末尾
    /// 可能存在的未收盘桶交还给各计算单元的聚合器续写。
    ///
    /// # Arguments
    /// * `source`: 行情来源协作者。
    pub async fn bootstrap(&mut self, source: &dyn TickSource) -> Result<(), MarketError> {
        let identity = self.instrument.identity().clone();
        for sub in &mut self.subs {
            let candles = source
                .history(&identity, sub.timeframe(), sub.history())
                .await?;
            info!(
                "{} {} seeded with {} historical candles",
                identity.symbol,
                sub.timeframe(),
                candles.len()
            );
            self.instrument.seed_history(candles);
            sub.init_candle_generator();
        }
        Ok(())
    }

    /// # Summary
    /// 消费 tick 流直至其结束。
    pub async fn run(mut self, mut stream: TickStream) {
        let symbol = self.instrument.identity().symbol.clone();
        info!("{} market loop started", symbol);
        while let Some(tick) = stream.next().await {
            self.process(&tick);
        }
        info!("{} market loop ended", symbol);
    }

    /// # Summary
    /// 单笔 tick 的完整处理遍历。
    ///
    /// # Logic
    /// 1. 刷新聚合根的最新报价。
    /// 2. 逐计算单元：喂入聚合器，收盘桶与进行中桶写回存储序列，
    ///    而后 compute / 信号判定 / complete / cleanup。
    /// 3. 用最新买卖报价判定警报，触发的记录到日志。
    pub fn process(&mut self, tick: &Tick) {
        self.instrument.apply_tick(tick);

        for sub in &mut self.subs {
            if let Some(closed) = sub.ingest(tick) {
                debug!(
                    "{} {} candle closed at {}",
                    self.instrument.identity().symbol,
                    sub.timeframe(),
                    closed.time
                );
                self.instrument.store_candle(closed);
            }
            if let Some(current) = sub.current_candle() {
                self.instrument.store_candle(current.clone());
            }

            sub.compute(tick.time);
            if sub.need_signal(tick.time) {
                let hits = self
                    .trader
                    .test_regions(tick.time, tick.last, Direction::Both);
                if !hits.is_empty() {
                    info!(
                        "{} {} price {} inside regions {:?}",
                        self.instrument.identity().symbol,
                        sub.timeframe(),
                        tick.last,
                        hits
                    );
                }
            }
            sub.complete(tick.time);
            sub.cleanup(tick.time);
        }

        let fired = self.trader.fire_alerts(tick.time, tick.bid, tick.ask);
        if !fired.is_empty() {
            info!(
                "{} alerts fired: {:?}",
                self.instrument.identity().symbol,
                fired
            );
        }
        self.trader.prune_expired(tick.time);
    }
}
