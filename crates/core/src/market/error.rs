use crate::common::TimeFrame;
use thiserror::Error;

/// # Summary
/// 市场数据域错误枚举，涵盖聚合器结构性错误与数据源失败。
///
/// # Invariants
/// - 结构性错误（周期不匹配、不可整除的周期对）在构造或喂入点立即失败，
///   视为启动期配置缺陷而非逐 tick 可恢复状况。
#[derive(Error, Debug)]
pub enum MarketError {
    // 喂入聚合器的 K 线周期与声明的来源周期不符
    #[error("candle timeframe {actual} rejected by generator producing {target}")]
    TimeframeMismatch {
        target: TimeFrame,
        actual: TimeFrame,
    },
    // 目标周期不是来源周期的正整数倍
    #[error("timeframe {to} is not a multiple of {from}")]
    NonDivisible { from: TimeFrame, to: TimeFrame },
    // 数据源层错误，包含底层驱动错误信息
    #[error("feed error: {0}")]
    Feed(String),
    // 请求的数据未找到或内容为空
    #[error("data not found")]
    NotFound,
}
