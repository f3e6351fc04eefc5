use chrono::{DateTime, Datelike, Days, NaiveTime, Utc};
use kawase_core::common::TimeFrame;
use kawase_core::market::entity::{Candle, Tick};
use kawase_core::market::error::MarketError;
use tracing::debug;

/// # Summary
/// 计算时间戳落入的聚合桶起点。
///
/// # Logic
/// 1. 周以下周期：按纪元秒整除对齐（纯整数分桶）。
/// 2. 周周期：取 UTC 日历日期截断到零点，再回退到最近的周一（ISO 周）。
/// 3. 月周期：取 UTC 日历日期截断到当月 1 日零点。
///
/// # Arguments
/// * `at`: 任意时间戳。
/// * `timeframe`: 目标周期。
///
/// # Returns
/// 对齐后的桶起点。
pub fn basetime(at: DateTime<Utc>, timeframe: TimeFrame) -> DateTime<Utc> {
    match timeframe {
        TimeFrame::Week1 => {
            let date = at.date_naive();
            let back = u64::from(date.weekday().num_days_from_monday());
            let monday = date - Days::new(back);
            monday.and_time(NaiveTime::MIN).and_utc()
        }
        TimeFrame::Month1 => {
            let date = at.date_naive();
            // 每月 1 日恒为合法日期
            let first = date.with_day(1).unwrap_or(date);
            first.and_time(NaiveTime::MIN).and_utc()
        }
        _ => {
            let secs = timeframe.secs();
            let aligned = at.timestamp().div_euclid(secs) * secs;
            DateTime::from_timestamp(aligned, 0).unwrap_or(at)
        }
    }
}

/// # Summary
/// 流式 K 线聚合器：将低粒度输入（tick 或低周期 K 线）增量聚合为
/// 单一目标周期的 K 线序列。
///
/// # Invariants
/// - 输入必须按时间戳非递减喂入；`time <= last_time` 的输入被静默丢弃
///   （同戳 tick 不做合并，属文档化的既定行为）。
/// - K 线驱动模式下目标周期必须是来源周期的正整数倍，构造时校验。
/// - 由聚合器产出并标记 `consolidated` 的 K 线之后绝不再被修改。
/// - 每个实例由单一写者独占驱动；读者同步责任由调用方承担。
#[derive(Debug, Clone)]
pub struct CandleGenerator {
    // 来源周期；None 表示 tick 驱动
    from: Option<TimeFrame>,
    // 目标周期
    to: TimeFrame,
    // 进行中的当前桶
    current: Option<Candle>,
    // 最近接受的输入时间戳
    last_time: Option<DateTime<Utc>>,
    // 最近一次批量调用消费的输入数量
    last_consumed: usize,
}

impl CandleGenerator {
    /// # Summary
    /// 构造 tick 驱动的聚合器。
    ///
    /// # Arguments
    /// * `to`: 目标周期。
    pub fn from_ticks(to: TimeFrame) -> Self {
        Self {
            from: None,
            to,
            current: None,
            last_time: None,
            last_consumed: 0,
        }
    }

    /// # Summary
    /// 构造 K 线驱动的聚合器。
    ///
    /// # Logic
    /// 目标周期必须是来源周期的正整数倍 (1 倍即逐根透传)，
    /// 否则在构造点立即失败。
    ///
    /// # Arguments
    /// * `from`: 来源周期。
    /// * `to`: 目标周期。
    ///
    /// # Returns
    /// 周期对不可整除时返回 `MarketError::NonDivisible`。
    pub fn from_candles(from: TimeFrame, to: TimeFrame) -> Result<Self, MarketError> {
        if to.secs() < from.secs() || to.secs() % from.secs() != 0 {
            return Err(MarketError::NonDivisible { from, to });
        }
        Ok(Self {
            from: Some(from),
            to,
            current: None,
            last_time: None,
            last_consumed: 0,
        })
    }

    /// 目标周期
    pub fn timeframe(&self) -> TimeFrame {
        self.to
    }

    /// 进行中的当前桶（批量产出从不包含它）
    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// 最近接受的输入时间戳
    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.last_time
    }

    /// 最近一次批量调用消费的输入数量
    pub fn last_consumed(&self) -> usize {
        self.last_consumed
    }

    /// # Summary
    /// 恢复聚合游标，用于从持久化断点继续流式聚合。
    ///
    /// # Arguments
    /// * `current`: 中断时的进行中 K 线。
    /// * `last_time`: 中断时最近接受的输入时间戳。
    pub fn resume(&mut self, current: Option<Candle>, last_time: Option<DateTime<Utc>>) {
        self.current = current;
        self.last_time = last_time;
    }

    /// # Summary
    /// 收养一根未收盘的存量 K 线作为当前桶（历史与实时的接缝处使用）。
    ///
    /// # Logic
    /// 仅当聚合器尚无当前桶、候选未收盘且周期一致时收养。
    ///
    /// # Arguments
    /// * `candle`: 候选的进行中 K 线。
    ///
    /// # Returns
    /// 是否完成收养。
    pub fn adopt_current(&mut self, candle: Candle) -> bool {
        if self.current.is_some() || candle.consolidated || candle.timeframe != self.to {
            return false;
        }
        debug!(
            "generator {} adopts in-progress candle at {}",
            self.to, candle.time
        );
        if self.last_time.is_none() {
            self.last_time = Some(candle.time);
        }
        self.current = Some(candle);
        true
    }

    /// # Summary
    /// 喂入单笔 tick。
    ///
    /// # Logic
    /// 1. 时间戳不晚于最近输入时拒绝，状态不变。
    /// 2. 当前桶存在且 tick 已越过桶终点：冻结当前桶作为本次产出。
    /// 3. 无当前桶则按对齐起点开新桶，以 `last` 价播种，成交量清零。
    /// 4. 累加：volume 累加，high/low 对 `last` 取极值，close 与 spread 取最新。
    ///
    /// # Arguments
    /// * `tick`: 新到的行情事件。
    ///
    /// # Returns
    /// 本次调用关闭的 K 线（至多一根），否则 None。
    pub fn update_from_tick(&mut self, tick: &Tick) -> Option<Candle> {
        if self.last_time.is_some_and(|t| tick.time <= t) {
            return None;
        }

        let closed = self.close_elapsed(tick.time);

        let current = self.current.get_or_insert_with(|| Candle {
            time: basetime(tick.time, self.to),
            timeframe: self.to,
            open: tick.last,
            high: tick.last,
            low: tick.last,
            close: tick.last,
            spread: tick.spread(),
            volume: 0.0,
            consolidated: false,
        });

        current.volume += tick.volume;
        current.high = current.high.max(tick.last);
        current.low = current.low.min(tick.last);
        current.close = tick.last;
        current.spread = tick.spread();

        self.last_time = Some(tick.time);
        closed
    }

    /// # Summary
    /// 喂入单根低周期 K 线。
    ///
    /// # Logic
    /// 与 tick 路径相同的关桶/开桶/累加结构，差异在于：
    /// 1. `ignore_non_ended` 时未收盘的来源桶直接无操作（防止成交量重复累计）。
    /// 2. 来源周期与声明不符是结构性错误。
    /// 3. 播种与累加复制来源各字段；high/low 对来源 high/low 取极值，
    ///    close 与 spread 取来源原值。
    ///
    /// # Arguments
    /// * `source`: 来源 K 线。
    /// * `ignore_non_ended`: 是否忽略未收盘的来源桶。
    ///
    /// # Returns
    /// 本次调用关闭的 K 线（至多一根）。
    pub fn update_from_candle(
        &mut self,
        source: &Candle,
        ignore_non_ended: bool,
    ) -> Result<Option<Candle>, MarketError> {
        if self.from != Some(source.timeframe) {
            return Err(MarketError::TimeframeMismatch {
                target: self.to,
                actual: source.timeframe,
            });
        }
        if ignore_non_ended && !source.consolidated {
            return Ok(None);
        }
        if self.last_time.is_some_and(|t| source.time <= t) {
            return Ok(None);
        }

        let closed = self.close_elapsed(source.time);

        let current = self.current.get_or_insert_with(|| Candle {
            time: basetime(source.time, self.to),
            timeframe: self.to,
            open: source.open,
            high: source.high,
            low: source.low,
            close: source.close,
            spread: source.spread,
            volume: 0.0,
            consolidated: false,
        });

        current.volume += source.volume;
        current.high = current.high.max(source.high);
        current.low = current.low.min(source.low);
        current.close = source.close;
        current.spread = source.spread;

        self.last_time = Some(source.time);
        Ok(closed)
    }

    /// # Summary
    /// 批量喂入 tick 序列。
    ///
    /// # Logic
    /// 按序逐笔调用单步更新，收集全部关闭产出（顺序保持），
    /// `last_consumed` 记录消费的输入数量（即使未产出也计入）。
    ///
    /// # Arguments
    /// * `ticks`: 按时间升序的 tick 序列。
    ///
    /// # Returns
    /// 本批关闭的全部 K 线（`consolidated = true`），进行中的桶从不包含。
    pub fn generate_from_ticks(&mut self, ticks: &[Tick]) -> Vec<Candle> {
        let mut out = Vec::new();
        for tick in ticks {
            if let Some(candle) = self.update_from_tick(tick) {
                out.push(candle);
            }
        }
        self.last_consumed = ticks.len();
        out
    }

    /// # Summary
    /// 批量喂入低周期 K 线序列。
    ///
    /// # Arguments
    /// * `candles`: 按时间升序的来源 K 线。
    /// * `ignore_non_ended`: 是否忽略未收盘的来源桶。
    ///
    /// # Returns
    /// 本批关闭的全部 K 线；首个结构性错误立即上抛。
    pub fn generate_from_candles(
        &mut self,
        candles: &[Candle],
        ignore_non_ended: bool,
    ) -> Result<Vec<Candle>, MarketError> {
        let mut out = Vec::new();
        for source in candles {
            if let Some(candle) = self.update_from_candle(source, ignore_non_ended)? {
                out.push(candle);
            }
        }
        self.last_consumed = candles.len();
        Ok(out)
    }

    /// # Summary
    /// 若观测时间已越过当前桶终点，冻结并摘下当前桶。
    ///
    /// # Arguments
    /// * `at`: 新观测的时间。
    ///
    /// # Returns
    /// 被冻结的 K 线，未越界时为 None。
    fn close_elapsed(&mut self, at: DateTime<Utc>) -> Option<Candle> {
        let elapsed = self
            .current
            .as_ref()
            .is_some_and(|c| at >= c.time + self.to.duration());
        if !elapsed {
            return None;
        }
        let mut closed = self.current.take()?;
        closed.consolidated = true;
        debug!(
            "candle {} closed at {} (o={} h={} l={} c={} v={})",
            self.to, closed.time, closed.open, closed.high, closed.low, closed.close, closed.volume
        );
        Some(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn tick(secs: i64, bid: f64, ask: f64, last: f64, volume: f64) -> Tick {
        Tick {
            time: at(secs),
            bid,
            ask,
            last,
            volume,
        }
    }

    #[test]
    fn test_basetime_sub_week_alignment() {
        for tf in [
            TimeFrame::Minute1,
            TimeFrame::Minute5,
            TimeFrame::Hour1,
            TimeFrame::Day1,
        ] {
            for secs in [0i64, 59, 3_601, 86_399, 1_700_000_123] {
                let t = at(secs);
                let base = basetime(t, tf);
                assert!(base <= t, "{} {}", tf, secs);
                assert!(t < base + tf.duration(), "{} {}", tf, secs);
                assert_eq!(base.timestamp() % tf.secs(), 0, "{} {}", tf, secs);
            }
        }
    }

    #[test]
    fn test_basetime_week_is_monday_midnight() {
        // 2024-03-07 是周四
        let thursday = Utc.with_ymd_and_hms(2024, 3, 7, 15, 30, 45).unwrap();
        let base = basetime(thursday, TimeFrame::Week1);
        assert_eq!(base, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(base.weekday(), chrono::Weekday::Mon);

        // 周一当天不回退
        let monday = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(basetime(monday, TimeFrame::Week1), monday);
    }

    #[test]
    fn test_basetime_month_is_first_midnight() {
        let t = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let base = basetime(t, TimeFrame::Month1);
        assert_eq!(base, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_non_divisible_pair_rejected_at_construction() {
        assert!(matches!(
            CandleGenerator::from_candles(TimeFrame::Week1, TimeFrame::Month1),
            Err(MarketError::NonDivisible { .. })
        ));
        assert!(matches!(
            CandleGenerator::from_candles(TimeFrame::Minute5, TimeFrame::Minute1),
            Err(MarketError::NonDivisible { .. })
        ));
        assert!(CandleGenerator::from_candles(TimeFrame::Minute1, TimeFrame::Minute5).is_ok());
        assert!(CandleGenerator::from_candles(TimeFrame::Day1, TimeFrame::Week1).is_ok());
    }

    #[test]
    fn test_identity_multiple_is_pass_through() {
        // 1 倍目标周期合法：逐根透传，字段不变
        let mut g = CandleGenerator::from_candles(TimeFrame::Minute1, TimeFrame::Minute1).unwrap();
        let sources: Vec<Candle> = (0..3)
            .map(|i| Candle {
                time: at(i * 60),
                timeframe: TimeFrame::Minute1,
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                spread: 0.1,
                volume: f64::from(u32::try_from(i).unwrap() + 1),
                consolidated: true,
            })
            .collect();

        let closed = g.generate_from_candles(&sources, true).unwrap();
        assert_eq!(closed.len(), 2);
        for (out, src) in closed.iter().zip(sources.iter()) {
            assert_eq!(out.time, src.time);
            assert_eq!(out.open, src.open);
            assert_eq!(out.close, src.close);
            assert_eq!(out.volume, src.volume);
            assert!(out.consolidated);
        }
        // 末根来源仍在进行中的当前桶里
        assert_eq!(g.current().unwrap().volume, 3.0);
    }

    #[test]
    fn test_monotonic_rejection_keeps_state() {
        let mut g = CandleGenerator::from_ticks(TimeFrame::Minute1);
        assert!(g.update_from_tick(&tick(30, 10.0, 10.2, 10.1, 5.0)).is_none());
        let snapshot = g.current().cloned().unwrap();

        // 同戳与更早的输入都被丢弃，状态不变
        for secs in [30, 10] {
            assert!(g.update_from_tick(&tick(secs, 9.0, 9.2, 9.1, 7.0)).is_none());
            let current = g.current().unwrap();
            assert_eq!(current.close, snapshot.close);
            assert_eq!(current.volume, snapshot.volume);
            assert_eq!(g.last_time(), Some(at(30)));
        }
    }

    #[test]
    fn test_minute_bucket_closes_on_overflow_tick() {
        let mut g = CandleGenerator::from_ticks(TimeFrame::Minute1);

        assert!(g.update_from_tick(&tick(0, 10.0, 10.2, 10.1, 5.0)).is_none());
        assert!(g.update_from_tick(&tick(30, 10.1, 10.3, 10.3, 3.0)).is_none());

        let closed = g.update_from_tick(&tick(61, 9.8, 10.0, 9.9, 2.0)).unwrap();
        assert!(closed.consolidated);
        assert_eq!(closed.time, at(0));
        assert_eq!(closed.open, 10.1);
        assert_eq!(closed.high, 10.3);
        assert_eq!(closed.low, 10.1);
        assert_eq!(closed.close, 10.3);
        assert_eq!(closed.volume, 8.0);

        let current = g.current().unwrap();
        assert_eq!(current.time, at(60));
        assert!(!current.consolidated);
        assert_eq!(current.open, 9.9);
        assert_eq!(current.high, 9.9);
        assert_eq!(current.low, 9.9);
        assert_eq!(current.close, 9.9);
        assert_eq!(current.volume, 2.0);
    }

    #[test]
    fn test_ohlc_invariant_under_stream() {
        let mut g = CandleGenerator::from_ticks(TimeFrame::Minute5);
        let prices = [10.0, 12.5, 9.1, 11.3, 10.7, 8.9, 13.2];
        for (i, p) in prices.iter().enumerate() {
            let secs = i64::try_from(i).unwrap() * 10;
            g.update_from_tick(&tick(secs, p - 0.1, p + 0.1, *p, 1.0));
            let c = g.current().unwrap();
            assert!(c.low <= c.open && c.open <= c.high);
            assert!(c.low <= c.close && c.close <= c.high);
        }
    }

    #[test]
    fn test_candle_timeframe_mismatch_is_structural_error() {
        let mut g = CandleGenerator::from_candles(TimeFrame::Minute1, TimeFrame::Minute5).unwrap();
        let alien = Candle {
            time: at(0),
            timeframe: TimeFrame::Hour1,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            spread: 0.0,
            volume: 1.0,
            consolidated: true,
        };
        assert!(matches!(
            g.update_from_candle(&alien, true),
            Err(MarketError::TimeframeMismatch { .. })
        ));
    }

    #[test]
    fn test_non_ended_source_is_ignored() {
        let mut g = CandleGenerator::from_candles(TimeFrame::Minute1, TimeFrame::Minute5).unwrap();
        let open_bar = Candle {
            time: at(0),
            timeframe: TimeFrame::Minute1,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            spread: 0.1,
            volume: 7.0,
            consolidated: false,
        };
        assert!(g.update_from_candle(&open_bar, true).unwrap().is_none());
        assert!(g.current().is_none());
        assert!(g.last_time().is_none());
    }

    #[test]
    fn test_batch_consumes_full_input() {
        let mut g = CandleGenerator::from_ticks(TimeFrame::Minute1);
        let ticks = vec![
            tick(0, 10.0, 10.2, 10.1, 5.0),
            tick(30, 10.1, 10.3, 10.3, 3.0),
            tick(61, 9.8, 10.0, 9.9, 2.0),
            tick(61, 9.8, 10.0, 9.9, 2.0), // 重复时间戳被丢弃但仍计入消费
        ];
        let closed = g.generate_from_ticks(&ticks);
        assert_eq!(closed.len(), 1);
        assert_eq!(g.last_consumed(), 4);
        assert!(closed.iter().all(|c| c.consolidated));
    }

    #[test]
    fn test_adopt_current_only_at_seam() {
        let mut g = CandleGenerator::from_ticks(TimeFrame::Minute1);
        let open_bar = Candle {
            time: at(60),
            timeframe: TimeFrame::Minute1,
            open: 9.9,
            high: 9.9,
            low: 9.9,
            close: 9.9,
            spread: 0.2,
            volume: 2.0,
            consolidated: false,
        };
        assert!(g.adopt_current(open_bar.clone()));
        // 已有当前桶时拒绝二次收养
        assert!(!g.adopt_current(open_bar.clone()));

        let mut closed_bar = open_bar;
        closed_bar.consolidated = true;
        let mut fresh = CandleGenerator::from_ticks(TimeFrame::Minute1);
        assert!(!fresh.adopt_current(closed_bar));
    }
}
