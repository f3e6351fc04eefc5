use async_trait::async_trait;
use kawase_core::notify::error::NotifyError;
use kawase_core::notify::port::Notifier;
use std::sync::Mutex;

/// 记录每次广播目标市场的测试替身。
#[derive(Default)]
pub struct RecordingNotifier {
    markets: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notified(&self) -> Vec<String> {
        self.markets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn strategy_trader_updated(&self, market: &str) -> Result<(), NotifyError> {
        self.markets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(market.to_string());
        Ok(())
    }
}
