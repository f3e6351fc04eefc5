use thiserror::Error;

/// # Summary
/// 策略域错误枚举，涵盖条件对象注册、配置与校验失败场景。
///
/// # Invariants
/// - 注册表查找失败是正常且可预期的错误路径，不允许以 panic 逃逸。
#[derive(Error, Debug)]
pub enum StrategyError {
    // 注册表中不存在该名称的区域构造器
    #[error("unsupported region '{0}'")]
    UnsupportedRegion(String),
    // 注册表中不存在该名称的警报构造器
    #[error("unsupported alert '{0}'")]
    UnsupportedAlert(String),
    // 条件对象配置后的 check() 校验未通过
    #[error("checking error: parameters rejected")]
    CheckFailed,
    // 载荷字段缺失、越界或类型不符
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    // 配置声明了未知的指标类型
    #[error("unknown indicator kind '{0}'")]
    UnknownIndicator(String),
}
