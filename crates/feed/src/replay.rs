use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kawase_core::common::{MarketIdentity, TimeFrame};
use kawase_core::market::entity::{Candle, Tick};
use kawase_core::market::error::MarketError;
use kawase_core::market::port::{TickSource, TickStream};
use kawase_market::generator::CandleGenerator;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// # Summary
/// 回放行情提供者。从本地 JSONL 文件读取 tick 序列，
/// 每个市场一个文件 (`<dir>/<SYMBOL>.jsonl`，每行一条 tick)。
///
/// # Invariants
/// - 文件内 tick 按时间非递减排列；乱序行为由下游聚合器的
///   丢弃规则兜底，本提供者不重排。
/// - `history` 消费过的 tick 不会再出现在随后的 `subscribe` 流里，
///   接缝桶不会被重复累加。
pub struct ReplayProvider {
    // tick 文件根目录
    dir: PathBuf,
    // 各市场历史装载的截止时间，订阅流从其之后继续
    cutover: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ReplayProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cutover: Mutex::new(HashMap::new()),
        }
    }

    fn file_for(&self, market: &MarketIdentity) -> PathBuf {
        self.dir.join(format!("{}.jsonl", market.symbol))
    }

    /// # Summary
    /// 读取并解析一个市场的完整 tick 文件。
    ///
    /// # Logic
    /// 1. 文件缺失映射为 `MarketError::NotFound`。
    /// 2. 空行跳过；解析失败的行带行号报错。
    async fn load_ticks(&self, path: &Path) -> Result<Vec<Tick>, MarketError> {
        if !path.exists() {
            return Err(MarketError::NotFound);
        }
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MarketError::Feed(format!("read {}: {}", path.display(), e)))?;

        let mut ticks = Vec::new();
        for (no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let tick: Tick = serde_json::from_str(line).map_err(|e| {
                MarketError::Feed(format!("{} line {}: {}", path.display(), no + 1, e))
            })?;
            ticks.push(tick);
        }
        debug!("{} ticks loaded from {}", ticks.len(), path.display());
        Ok(ticks)
    }
}

#[async_trait]
impl TickSource for ReplayProvider {
    /// # Summary
    /// 订阅一个市场的回放流。
    ///
    /// # Logic
    /// 1. 一次性加载整个 tick 文件。
    /// 2. 若此前 `history` 已消费过该市场，跳过截止时间之前
    ///    (含截止时间) 的 tick，从接缝之后继续。
    /// 3. 通过有界通道逐条推送；消费方关闭流则提前结束。
    ///
    /// # Returns
    /// 文件读完即结束的异步 tick 流。
    async fn subscribe(&self, market: &MarketIdentity) -> Result<TickStream, MarketError> {
        let path = self.file_for(market);
        let mut ticks = self.load_ticks(&path).await?;

        let cut = {
            let cutover = self.cutover.lock().unwrap_or_else(|e| e.into_inner());
            cutover.get(&market.symbol).copied()
        };
        if let Some(cut) = cut {
            ticks.retain(|t| t.time > cut);
        }
        info!("{} replay stream opened, {} ticks", market.symbol, ticks.len());

        let (tx, rx) = tokio::sync::mpsc::channel(256);
        tokio::spawn(async move {
            for tick in ticks {
                if tx.send(tick).await.is_err() {
                    break;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// # Summary
    /// 从 tick 文件离线聚合出指定周期的历史 K 线。
    ///
    /// # Logic
    /// 1. 全量 tick 喂给一个独立的聚合器。
    /// 2. 末尾附带聚合器进行中的未收盘桶。
    /// 3. 只保留最近 `limit` 根。
    /// 4. 记录该市场末笔 tick 时间，作为订阅流的接缝截止点。
    async fn history(
        &self,
        market: &MarketIdentity,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        let path = self.file_for(market);
        let ticks = self.load_ticks(&path).await?;

        if let Some(last) = ticks.last() {
            let mut cutover = self.cutover.lock().unwrap_or_else(|e| e.into_inner());
            cutover.insert(market.symbol.clone(), last.time);
        }

        let mut generator = CandleGenerator::from_ticks(timeframe);
        let mut candles = generator.generate_from_ticks(&ticks);
        if let Some(current) = generator.current() {
            candles.push(current.clone());
        }

        let skip = candles.len().saturating_sub(limit);
        candles.drain(..skip);
        Ok(candles)
    }
}
