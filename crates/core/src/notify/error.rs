use thiserror::Error;

/// # Summary
/// 通知投递错误枚举。
///
/// # Invariants
/// - 指令面只把它折叠进结果消息，绝不因通知失败回滚状态。
#[derive(Error, Debug)]
pub enum NotifyError {
    /// 网络连接或传输错误
    #[error("Network error: {0}")]
    Network(String),

    /// 配置错误 (如 Webhook 地址为空)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 对端接收事件后返回的非成功状态
    #[error("Endpoint rejected event: {0}")]
    Endpoint(String),
}
