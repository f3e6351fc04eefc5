use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// # Summary
/// 指令面统一结果信封。每个指令无论成败都返回人类可读的消息列表
/// 与布尔错误标记，外加回显新值的可选字段。
///
/// # Invariants
/// - `error = true` 时不得发生任何部分变更（先全量校验，后变更）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    // 有序消息列表，调用方按原文渲染
    pub messages: Vec<String>,
    // 错误标记，调用方视为非零退出
    pub error: bool,
    // 回显：活动开关新值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<bool>,
    // 回显：下单数量新值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    // 回显：亲和度新值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<u8>,
    // 进程内标记：本次指令是否真正变更了状态。幂等移除不存在的
    // 标识不算变更。不随信封序列化。
    #[serde(skip)]
    pub mutated: bool,
}

impl CommandResult {
    /// 空的成功信封
    pub fn success() -> Self {
        Self::default()
    }

    /// 携带单条消息的失败信封
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            error: true,
            ..Self::default()
        }
    }

    /// 追加一条信息性消息
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// 追加一条消息并置位错误标记
    pub fn fail(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
        self.error = true;
    }
}

/// # Summary
/// 跨进程 RPC 平面信封（边界格式）。本核心只定义其序列化形态，
/// 传输与分发属外部协作者范畴。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    // 目标标识 (例如策略名)
    pub target: String,
    // 指令或类别代码
    pub command: String,
    // 可选的分组名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    // 开放载荷
    pub payload: Value,
    // 发出时间
    pub timestamp: DateTime<Utc>,
}
