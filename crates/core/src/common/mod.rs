use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// # Summary
/// 市场标的实体，代表系统跟踪的特定交易对或合约。
///
/// # Invariants
/// - `symbol` 必须是合法的市场代码。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketIdentity {
    // 市场代码 (例如: EURUSD, BTCUSDT)
    pub symbol: String,
    // 交易所或经纪商代码 (可选)
    pub exchange: Option<String>,
}

impl MarketIdentity {
    /// 仅携带 symbol 的简便构造。
    pub fn from_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: None,
        }
    }
}

/// # Summary
/// K 线时间周期枚举，定义聚合桶的时间跨度。
///
/// # Invariants
/// - `Week1` 按 ISO 周一对齐，`Month1` 按自然月 1 日对齐，其余周期按纪元秒整除对齐。
/// - `Month1` 的名义时长为 30 天，仅用于桶关闭判定。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimeFrame {
    // 1分钟
    Minute1,
    // 5分钟
    Minute5,
    // 15分钟
    Minute15,
    // 1小时
    Hour1,
    // 4小时
    Hour4,
    // 1日
    Day1,
    // 1周
    Week1,
    // 1月 (名义 30 天)
    Month1,
}

impl TimeFrame {
    /// # Summary
    /// 返回该周期的桶宽秒数。
    ///
    /// # Logic
    /// `Month1` 返回名义 30 天，仅用于判定当前桶是否应当关闭。
    ///
    /// # Returns
    /// 桶宽秒数。
    pub fn secs(self) -> i64 {
        match self {
            TimeFrame::Minute1 => 60,
            TimeFrame::Minute5 => 300,
            TimeFrame::Minute15 => 900,
            TimeFrame::Hour1 => 3_600,
            TimeFrame::Hour4 => 14_400,
            TimeFrame::Day1 => 86_400,
            TimeFrame::Week1 => 604_800,
            TimeFrame::Month1 => 2_592_000,
        }
    }

    /// 以 chrono::Duration 表示的桶宽。
    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::seconds(self.secs())
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" | "minute1" => Ok(TimeFrame::Minute1),
            "5m" | "minute5" => Ok(TimeFrame::Minute5),
            "15m" | "minute15" => Ok(TimeFrame::Minute15),
            "1h" | "hour1" => Ok(TimeFrame::Hour1),
            "4h" | "hour4" => Ok(TimeFrame::Hour4),
            "1d" | "day1" => Ok(TimeFrame::Day1),
            "1w" | "week1" => Ok(TimeFrame::Week1),
            "1M" | "month1" => Ok(TimeFrame::Month1),
            _ => Err(format!("Unknown TimeFrame: {}", s)),
        }
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeFrame::Minute1 => write!(f, "1m"),
            TimeFrame::Minute5 => write!(f, "5m"),
            TimeFrame::Minute15 => write!(f, "15m"),
            TimeFrame::Hour1 => write!(f, "1h"),
            TimeFrame::Hour4 => write!(f, "4h"),
            TimeFrame::Day1 => write!(f, "1d"),
            TimeFrame::Week1 => write!(f, "1w"),
            TimeFrame::Month1 => write!(f, "1M"),
        }
    }
}
