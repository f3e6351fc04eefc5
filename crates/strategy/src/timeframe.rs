use crate::indicator::{
    IndicatorHandle, IndicatorSpec, PriceIndicator, VolumeIndicator, build_indicator,
};
use chrono::{DateTime, Utc};
use kawase_core::common::TimeFrame;
use kawase_core::market::entity::{Candle, Tick};
use kawase_core::market::port::Instrument;
use kawase_core::strategy::error::StrategyError;
use kawase_market::generator::CandleGenerator;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// 每个 (市场, 周期) 计算单元的静态配置。
#[derive(Debug, Clone)]
pub struct SubConfig {
    pub timeframe: TimeFrame,
    /// 每次计算要求的最小样本窗口
    pub depth: usize,
    /// 保留的历史样本数
    pub history: usize,
    /// 仅在 K 线收盘时重算指标
    pub update_at_close: bool,
    /// 仅在 K 线收盘时允许发出信号
    pub signal_at_close: bool,
}

/// # Summary
/// 单个 (市场, 周期) 计算单元。独占一个 tick 驱动的 CandleGenerator，
/// 基于 K 线收盘生命周期对下游计算与信号发射做门控，
/// 并维护信号逻辑所需的当前/前一根收开盘价簿记。
///
/// # Invariants
/// - `last_closed` 反映最近一个处理遍历是否观测到新收盘的 K 线。
/// - 价格簿记读取指标输出的倒数第二槽：最后一槽对应尚未收盘的桶。
/// - 对父 Instrument 仅持弱引用（非拥有），读取该市场的 K 线历史。
pub struct TimeframeBasedSub {
    timeframe: TimeFrame,
    depth: usize,
    history: usize,
    update_at_close: bool,
    signal_at_close: bool,
    // 最近遍历是否观测到新收盘的 K 线
    last_closed: bool,
    // 最近一次 complete 的时间
    last_time: Option<DateTime<Utc>>,
    // 固定指标槽
    price: Option<PriceIndicator>,
    volume: Option<VolumeIndicator>,
    // 当前与前一根已收盘桶的收/开盘价簿记
    open_price: Option<f64>,
    close_price: Option<f64>,
    prev_open_price: Option<f64>,
    prev_close_price: Option<f64>,
    // 独占的聚合器
    generator: CandleGenerator,
    // 父聚合根弱引用
    instrument: Weak<dyn Instrument>,
}

impl TimeframeBasedSub {
    /// # Summary
    /// 构造计算单元并填充指标槽。
    ///
    /// # Logic
    /// 槽名到句柄的映射是固定的：`price` 槽只接受价格指标，
    /// `volume` 槽只接受成交量指标；未知槽名或类型名是配置错误。
    ///
    /// # Arguments
    /// * `instrument`: 父聚合根。
    /// * `config`: 静态配置。
    /// * `indicators`: 配置声明的槽名到 (类型, 参数) 映射。
    ///
    /// # Returns
    /// 配置不合法时返回 `StrategyError`。
    pub fn new(
        instrument: &Arc<dyn Instrument>,
        config: SubConfig,
        indicators: &HashMap<String, IndicatorSpec>,
    ) -> Result<Self, StrategyError> {
        let mut price = None;
        let mut volume = None;
        for (slot, spec) in indicators {
            match (slot.as_str(), build_indicator(spec)?) {
                ("price", IndicatorHandle::Price(p)) => price = Some(p),
                ("volume", IndicatorHandle::Volume(v)) => volume = Some(v),
                (slot, _) => {
                    return Err(StrategyError::InvalidParameter(format!(
                        "indicator kind not allowed in slot '{}'",
                        slot
                    )));
                }
            }
        }

        Ok(Self {
            timeframe: config.timeframe,
            depth: config.depth,
            history: config.history,
            update_at_close: config.update_at_close,
            signal_at_close: config.signal_at_close,
            last_closed: false,
            last_time: None,
            price,
            volume,
            open_price: None,
            close_price: None,
            prev_open_price: None,
            prev_close_price: None,
            generator: CandleGenerator::from_ticks(config.timeframe),
            instrument: Arc::downgrade(instrument),
        })
    }

    pub fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn history(&self) -> usize {
        self.history
    }

    pub fn last_closed(&self) -> bool {
        self.last_closed
    }

    /// 聚合器进行中的当前桶
    pub fn current_candle(&self) -> Option<&Candle> {
        self.generator.current()
    }

    /// 当前已收盘桶的收盘价簿记
    pub fn close_price(&self) -> Option<f64> {
        self.close_price
    }

    /// 当前已收盘桶的开盘价簿记
    pub fn open_price(&self) -> Option<f64> {
        self.open_price
    }

    /// 前一根已收盘桶的收盘价簿记
    pub fn prev_close_price(&self) -> Option<f64> {
        self.prev_close_price
    }

    /// 前一根已收盘桶的开盘价簿记
    pub fn prev_open_price(&self) -> Option<f64> {
        self.prev_open_price
    }

    /// # Summary
    /// 历史数据拉取完成后的一次性接缝接线。
    ///
    /// # Logic
    /// 聚合器尚无进行中桶、且父聚合根存储的该周期最新 K 线未收盘时，
    /// 将其收养为聚合器的当前桶，使实时流从历史断点处无缝衔接
    /// （接缝处不重复、不丢桶）。
    pub fn init_candle_generator(&mut self) {
        if self.generator.current().is_some() {
            return;
        }
        let Some(instrument) = self.instrument.upgrade() else {
            return;
        };
        if let Some(candle) = instrument.candle(self.timeframe)
            && !candle.consolidated
            && self.generator.adopt_current(candle)
        {
            debug!(
                "{} {} generator resumed from stored in-progress candle",
                instrument.identity().symbol,
                self.timeframe
            );
        }
    }

    /// # Summary
    /// 读取计算窗口：父聚合根存储序列中最近 `depth` 根 K 线。
    pub fn get_candles(&self) -> Vec<Candle> {
        let Some(instrument) = self.instrument.upgrade() else {
            return Vec::new();
        };
        let mut candles = instrument.candles(self.timeframe);
        let skip = candles.len().saturating_sub(self.depth);
        candles.drain(..skip);
        candles
    }

    /// # Summary
    /// 喂入单笔 tick，驱动独占聚合器。
    ///
    /// # Logic
    /// 更新 `last_closed` 为本遍历是否关闭了一个桶。
    ///
    /// # Returns
    /// 本遍历关闭的 K 线（至多一根），所有权移交调用方存储。
    pub fn ingest(&mut self, tick: &Tick) -> Option<Candle> {
        let closed = self.generator.update_from_tick(tick);
        self.last_closed = closed.is_some();
        closed
    }

    /// # Summary
    /// 批量喂入 tick 序列（启动期回放）。
    ///
    /// # Returns
    /// 本遍历关闭的全部 K 线。
    pub fn ingest_ticks(&mut self, ticks: &[Tick]) -> Vec<Candle> {
        let closed = self.generator.generate_from_ticks(ticks);
        self.last_closed = !closed.is_empty();
        closed
    }

    /// # Summary
    /// 本遍历是否应运行指标重算。
    ///
    /// # Logic
    /// `update_at_close` 时仅在最近遍历观测到新收盘 K 线时为真，否则恒真。
    pub fn need_update(&self, _at: DateTime<Utc>) -> bool {
        if self.update_at_close {
            self.last_closed
        } else {
            true
        }
    }

    /// # Summary
    /// 本遍历是否允许发出交易信号（与重算门控独立配置）。
    pub fn need_signal(&self, _at: DateTime<Utc>) -> bool {
        if self.signal_at_close {
            self.last_closed
        } else {
            true
        }
    }

    /// # Summary
    /// 运行指标重算（受 `need_update` 门控）。
    ///
    /// # Logic
    /// 1. 门控未通过或样本不足 `depth` 时跳过。
    /// 2. 用计算窗口重建各指标槽的输出数组。
    pub fn compute(&mut self, at: DateTime<Utc>) {
        if !self.need_update(at) {
            return;
        }
        let candles = self.get_candles();
        if candles.len() < self.depth {
            return;
        }
        if let Some(price) = &mut self.price {
            price.compute(&candles);
        }
        if let Some(volume) = &mut self.volume {
            volume.compute(&candles);
        }
    }

    /// # Summary
    /// 每个处理遍历的收尾调用。
    ///
    /// # Logic
    /// 1. 恒更新 `last_time`。
    /// 2. 刚收盘且挂有价格指标：簿记右移——前值接收旧值，
    ///    新收/开盘价读取指标倒数第二槽（最后一槽是未收盘桶）。
    /// 3. 否则若簿记从未初始化且已有至少两个价格样本，用倒数第二槽初始化。
    /// 4. 其余情况（簿记已初始化的桶中途遍历）无操作。
    ///
    /// # Arguments
    /// * `at`: 本遍历的时间。
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.last_time = Some(at);

        let Some(price) = &self.price else {
            return;
        };
        if price.len() < 2 {
            return;
        }
        let idx = price.len() - 2;

        if self.last_closed {
            self.prev_close_price = self.close_price;
            self.prev_open_price = self.open_price;
            self.close_price = price.closes().get(idx).copied();
            self.open_price = price.opens().get(idx).copied();
        } else if self.close_price.is_none() {
            self.close_price = price.closes().get(idx).copied();
            self.open_price = price.opens().get(idx).copied();
        }
    }

    /// # Summary
    /// 收盘处理完成后的缓存清理。
    ///
    /// # Logic
    /// 一次收盘只允许消费一次"前一根"缓存：清空前值，
    /// 防止跨多于一根收盘桶复用陈旧数据。
    pub fn cleanup(&mut self, _at: DateTime<Utc>) {
        if self.last_closed {
            self.prev_close_price = None;
            self.prev_open_price = None;
        }
    }

    /// 价格指标槽（只读）
    pub fn price(&self) -> Option<&PriceIndicator> {
        self.price.as_ref()
    }

    /// 成交量指标槽（只读）
    pub fn volume(&self) -> Option<&VolumeIndicator> {
        self.volume.as_ref()
    }
}
