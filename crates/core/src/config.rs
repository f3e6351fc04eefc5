use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub notify: NotifyConfig,
    pub watchlist: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// tick 回放文件所在目录，每个市场一个 `<symbol>.jsonl`
    pub replay_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// 状态变更推送的 Webhook 地址，缺省时仅记录日志
    pub webhook_url: Option<String>,
}

/// 单个被跟踪市场的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub symbol: String,
    /// 该市场启用的聚合周期 (例如 ["1m", "5m", "1h"])
    pub timeframes: Vec<String>,
    /// 每次计算读取的最小样本窗口
    pub depth: usize,
    /// 每个周期保留的历史样本数
    pub history: usize,
    /// 仅在 K 线收盘时重算指标
    pub update_at_close: bool,
    /// 仅在 K 线收盘时允许发出信号
    pub signal_at_close: bool,
    /// 初始下单数量
    pub trade_quantity: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                replay_dir: "data".to_string(),
            },
            notify: NotifyConfig { webhook_url: None },
            watchlist: vec![WatchConfig {
                symbol: "EURUSD".to_string(),
                timeframes: vec!["1m".to_string(), "5m".to_string()],
                depth: 20,
                history: 200,
                update_at_close: true,
                signal_at_close: true,
                trade_quantity: 1.0,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.feed.replay_dir, "data");
        assert!(config.notify.webhook_url.is_none());
        assert_eq!(config.watchlist.len(), 1);
        assert_eq!(config.watchlist[0].symbol, "EURUSD");
        assert!(config.watchlist[0].update_at_close);
    }
}
