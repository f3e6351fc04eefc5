use crate::common::TimeFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 单笔原始行情事件。来源保证时间戳非递减，但不保证严格递增。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    // 事件时间
    pub time: DateTime<Utc>,
    // 买价
    pub bid: f64,
    // 卖价
    pub ask: f64,
    // 最新成交价
    pub last: f64,
    // 成交量
    pub volume: f64,
}

impl Tick {
    /// 当前买卖价差
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// 买卖中间价
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// # Summary
/// 单根 K 线数据实体，记录特定聚合桶内的行情波动。
///
/// # Invariants
/// - `time` 永远是该桶按 `timeframe` 对齐后的起点，而非产生它的数据的时间。
/// - `low <= open <= high` 且 `low <= close <= high` 在任意时刻成立。
/// - `consolidated = true` 表示该桶已关闭，之后不再被修改。
/// - 开放期间 `volume` 单调不减。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    // 聚合桶起始时间
    pub time: DateTime<Utc>,
    // 所属周期
    pub timeframe: TimeFrame,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 观测到的最新买卖价差
    pub spread: f64,
    // 成交量
    pub volume: f64,
    // 是否已收盘定型
    pub consolidated: bool,
}
