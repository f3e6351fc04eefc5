use async_trait::async_trait;
use kawase_core::common::MarketIdentity;
use kawase_core::config::AppConfig;
use kawase_core::market::port::{Instrument, TickSource};
use kawase_core::notify::error::NotifyError;
use kawase_core::notify::port::Notifier;
use kawase_feed::replay::ReplayProvider;
use kawase_manager::strategy::StrategyService;
use kawase_market::instrument::InstrumentInner;
use kawase_notify::webhook::WebhookNotifier;
use kawase_strategy::indicator::IndicatorSpec;
use kawase_strategy::runner::MarketRunner;
use kawase_strategy::timeframe::{SubConfig, TimeframeBasedSub};
use kawase_strategy::trader::StrategyTrader;
use kawase_strategy::{alert, region};
use kawase_trade::paper::PaperExecutor;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Webhook 未配置时的兜底实现：只把事件写进日志。
struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn strategy_trader_updated(&self, market: &str) -> Result<(), NotifyError> {
        info!("{} strategy trader updated", market);
        Ok(())
    }
}

/// # Summary
/// 加载全局配置。
///
/// # Logic
/// 1. 可选的 `kawase.toml` 配置文件。
/// 2. `KAWASE_` 前缀环境变量覆盖，嵌套键用 `__` 分隔。
/// 3. 两者皆缺时回退编译内置默认值。
fn load_config() -> AppConfig {
    let loaded = config::Config::builder()
        .add_source(config::File::with_name("kawase").required(false))
        .add_source(config::Environment::with_prefix("KAWASE").separator("__"))
        .build()
        .and_then(config::Config::try_deserialize::<AppConfig>);

    match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed ({}), using defaults", e);
            AppConfig::default()
        }
    }
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 装配：
/// 回放行情源、纸面执行端、通知端、每个被跟踪市场的
/// Instrument / StrategyTrader / 计算单元与行情循环。
///
/// # Logic
/// 1. 初始化全局日志与配置。
/// 2. 实例化基础设施层（Feed、Executor、Notifier）。
/// 3. 按 watchlist 装配每个市场并启动其行情循环协程。
/// 4. 挂起等待外部信号退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("Kawase engine starting...");

    let config = load_config();

    // 基础设施层
    let feed = Arc::new(ReplayProvider::new(config.feed.replay_dir.clone()));
    let executor = Arc::new(PaperExecutor::new());
    let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => Arc::new(LogNotifier),
    };

    // 指令面服务
    let service = StrategyService::new(region::registry(), alert::registry(), executor, notifier);

    // 固定指标槽：收/开盘价簿记依赖 price 槽
    let mut indicators = HashMap::new();
    indicators.insert(
        "price".to_string(),
        IndicatorSpec {
            kind: "price".into(),
            params: json!({}),
        },
    );
    indicators.insert(
        "volume".to_string(),
        IndicatorSpec {
            kind: "volume".into(),
            params: json!({}),
        },
    );

    // 按 watchlist 装配每个市场
    for watch in &config.watchlist {
        let identity = MarketIdentity::from_symbol(&watch.symbol);
        let quantity = Decimal::try_from(watch.trade_quantity).unwrap_or(Decimal::ONE);
        let instrument = Arc::new(InstrumentInner::new(identity.clone(), watch.history, quantity));
        let port: Arc<dyn Instrument> = instrument.clone();

        let mut subs = Vec::new();
        for tf in &watch.timeframes {
            let timeframe = tf.parse()?;
            let sub = TimeframeBasedSub::new(
                &port,
                SubConfig {
                    timeframe,
                    depth: watch.depth,
                    history: watch.history,
                    update_at_close: watch.update_at_close,
                    signal_at_close: watch.signal_at_close,
                },
                &indicators,
            )?;
            subs.push(sub);
        }

        let trader = Arc::new(StrategyTrader::new(port));
        service.register(watch.symbol.clone(), trader.clone());

        let mut runner = MarketRunner::new(instrument, trader, subs);
        runner.bootstrap(feed.as_ref()).await?;
        let stream = feed.subscribe(&identity).await?;
        tokio::spawn(runner.run(stream));
        info!("{} market loop spawned", watch.symbol);
    }

    info!("StrategyService initialized. Waiting for signals...");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting...");

    Ok(())
}
