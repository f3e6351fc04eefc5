pub mod mock_notify;

use chrono::{DateTime, Utc};
use kawase_core::common::MarketIdentity;
use kawase_core::market::entity::Tick;
use kawase_core::market::port::Instrument;
use kawase_core::strategy::entity::Direction;
use kawase_core::trade::entity::TradeType;
use kawase_core::trade::port::OrderExecutor;
use kawase_manager::strategy::StrategyService;
use kawase_market::instrument::InstrumentInner;
use kawase_strategy::trader::StrategyTrader;
use kawase_strategy::{alert, region};
use kawase_trade::paper::PaperExecutor;
use mock_notify::RecordingNotifier;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    service: Arc<StrategyService>,
    trader: Arc<StrategyTrader>,
    executor: Arc<PaperExecutor>,
    notifier: Arc<RecordingNotifier>,
}

fn fixture() -> Fixture {
    let instrument = Arc::new(InstrumentInner::new(
        MarketIdentity::from_symbol("EURUSD"),
        16,
        dec!(1),
    ));
    // 报价基线：mid = 10.0
    instrument.apply_tick(&Tick {
        time: Utc::now(),
        bid: 9.95,
        ask: 10.05,
        last: 10.0,
        volume: 1.0,
    });

    let port: Arc<dyn Instrument> = instrument;
    let trader = Arc::new(StrategyTrader::new(port));
    let executor = Arc::new(PaperExecutor::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = StrategyService::new(
        region::registry(),
        alert::registry(),
        executor.clone(),
        notifier.clone(),
    );
    service.register("EURUSD", trader.clone());

    Fixture {
        service,
        trader,
        executor,
        notifier,
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[tokio::test]
async fn test_affinity_command_is_atomic() {
    let f = fixture();
    let before = f.trader.affinity();

    let result = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "set-affinity", "affinity": 150}))
        .await;

    assert!(result.error);
    assert_eq!(f.trader.affinity(), before);
    // 失败的指令不广播
    assert!(f.notifier.notified().is_empty());

    let result = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "set-affinity", "affinity": 80}))
        .await;
    assert!(!result.error);
    assert_eq!(result.affinity, Some(80));
    assert_eq!(f.trader.affinity(), 80);
    assert_eq!(f.notifier.notified(), vec!["EURUSD".to_string()]);
}

#[tokio::test]
async fn test_activity_toggle_echoes_new_value() {
    let f = fixture();
    let result = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "toggle"}))
        .await;
    assert_eq!(result.activity, Some(true));

    let result = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "disable"}))
        .await;
    assert_eq!(result.activity, Some(false));
    assert!(!f.trader.activity());
}

#[tokio::test]
async fn test_quantity_command_writes_through_to_instrument() {
    let f = fixture();
    let result = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "set-quantity", "quantity": 2.5}))
        .await;
    assert!(!result.error);
    assert_eq!(result.quantity, Some(dec!(2.5)));
    assert_eq!(f.trader.instrument().trade_quantity(), dec!(2.5));

    let result = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "set-quantity", "quantity": 0}))
        .await;
    assert!(result.error);
    assert_eq!(f.trader.instrument().trade_quantity(), dec!(2.5));
}

#[tokio::test]
async fn test_option_value_validation() {
    let f = fixture();
    let result = f
        .service
        .cmd_strategy_trader_modify(
            "EURUSD",
            &json!({"action": "set-option", "key": "mode", "value": true}),
        )
        .await;
    assert!(result.error);
    assert!(f.trader.option("mode").is_none());

    let result = f
        .service
        .cmd_strategy_trader_modify(
            "EURUSD",
            &json!({"action": "set-option", "key": "mode", "value": "fast"}),
        )
        .await;
    assert!(!result.error);
    assert!(f.trader.option("mode").is_some());

    // 幂等移除：第二次是信息性消息而非错误
    let first = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "del-option", "key": "mode"}))
        .await;
    assert!(!first.error);
    let second = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "del-option", "key": "mode"}))
        .await;
    assert!(!second.error);
    assert!(second.messages[0].contains("invalid identifier"));
}

#[tokio::test]
async fn test_region_lifecycle_and_idempotent_removal() {
    let f = fixture();
    let result = f
        .service
        .cmd_strategy_trader_modify(
            "EURUSD",
            &json!({
                "action": "add-region",
                "name": "range",
                "direction": "long",
                "timeframe": "5m",
                "params": {"low": 9.0, "high": 11.0},
            }),
        )
        .await;
    assert!(!result.error);
    assert_eq!(f.trader.region_ids(), vec![1]);
    assert_eq!(f.notifier.notified().len(), 1);

    let first = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "del-region", "id": 1}))
        .await;
    assert!(!first.error);
    assert!(first.messages[0].contains("removed"));
    assert_eq!(f.notifier.notified().len(), 2);

    let second = f
        .service
        .cmd_strategy_trader_modify("EURUSD", &json!({"action": "del-region", "id": 1}))
        .await;
    assert!(!second.error);
    assert!(second.messages[0].contains("invalid identifier"));
    // 幂等移除没有发生变更，不广播
    assert_eq!(f.notifier.notified().len(), 2);
}

#[tokio::test]
async fn test_unsupported_region_name_and_failed_check_reject() {
    let f = fixture();
    let result = f
        .service
        .cmd_strategy_trader_modify(
            "EURUSD",
            &json!({"action": "add-region", "name": "channel", "timeframe": "5m", "params": {}}),
        )
        .await;
    assert!(result.error);
    assert!(f.trader.region_ids().is_empty());

    // 自检失败：low 非正
    let result = f
        .service
        .cmd_strategy_trader_modify(
            "EURUSD",
            &json!({
                "action": "add-region",
                "name": "range",
                "timeframe": "5m",
                "params": {"low": 0.0, "high": 11.0},
            }),
        )
        .await;
    assert!(result.error);
    assert!(result.messages[0].contains("checking error"));
    assert!(f.trader.region_ids().is_empty());
}

#[tokio::test]
async fn test_alert_trigger_price_resolution() {
    let f = fixture();
    // mid = 10.0，+2% 解析为 10.2
    let result = f
        .service
        .cmd_strategy_trader_modify(
            "EURUSD",
            &json!({
                "action": "add-alert",
                "name": "price-cross",
                "timeframe": "1m",
                "countdown": 1,
                "params": {
                    "price": 2.0,
                    "method": "market-delta-percent",
                    "direction": "up",
                },
            }),
        )
        .await;
    assert!(!result.error, "{:?}", result.messages);

    // 基线在触发价下方，越过 10.2 触发
    assert!(f.trader.fire_alerts(at(1), 10.0, 10.1).is_empty());
    assert_eq!(f.trader.fire_alerts(at(2), 10.2, 10.3).len(), 1);
}

#[tokio::test]
async fn test_alert_resolution_rejects_bad_method_source_or_price() {
    let f = fixture();
    let base = json!({
        "action": "add-alert",
        "name": "price-cross",
        "timeframe": "1m",
    });

    let mut bad_method = base.clone();
    bad_method["params"] = json!({"price": 1.0, "method": "market-delta-points", "direction": "up"});
    let result = f.service.cmd_strategy_trader_modify("EURUSD", &bad_method).await;
    assert!(result.error);

    let mut bad_source = base.clone();
    bad_source["params"] = json!({"price": 1.0, "source": "close", "direction": "up"});
    let result = f.service.cmd_strategy_trader_modify("EURUSD", &bad_source).await;
    assert!(result.error);

    // mid 10.0 - 15.0 解析为负价
    let mut bad_price = base.clone();
    bad_price["params"] =
        json!({"price": -15.0, "method": "market-delta-price", "direction": "down"});
    let result = f.service.cmd_strategy_trader_modify("EURUSD", &bad_price).await;
    assert!(result.error);

    assert!(f.trader.alert_ids().is_empty());
}

#[tokio::test]
async fn test_trade_check_repair_recreates_missing_order() {
    let f = fixture();
    let id = f
        .trader
        .open_trade(TradeType::Asset, Direction::Long, dec!(1), Utc::now());
    let stop = f.executor.place("EURUSD", dec!(1));
    f.trader.update_trade(Some(id), |t| {
        t.entry_quantity = dec!(1);
        t.stop_order_id = Some(stop.clone());
    });

    // 执行端侧订单消失
    assert!(f.executor.drop_order(&stop));

    let result = f
        .service
        .cmd_trade_check("EURUSD", &json!({"id": id, "repair": true}))
        .await;
    assert!(!result.error, "{:?}", result.messages);
    assert!(result.messages.iter().any(|m| m.contains("repaired")));

    // 新订单已回写并真实挂载
    let new_stop = f.trader.trade(Some(id)).unwrap().stop_order_id.unwrap();
    assert_ne!(new_stop, stop);
    assert!(f.executor.has_order(&new_stop).await);
    assert_eq!(f.notifier.notified(), vec!["EURUSD".to_string()]);
}

#[tokio::test]
async fn test_trade_clean_cancels_orders_and_drops_record() {
    let f = fixture();
    let id = f
        .trader
        .open_trade(TradeType::Margin, Direction::Short, dec!(2), Utc::now());
    let entry = f.executor.place("EURUSD", dec!(2));
    let stop = f.executor.place("EURUSD", dec!(2));
    f.trader.update_trade(Some(id), |t| {
        t.entry_order_id = Some(entry);
        t.stop_order_id = Some(stop);
    });

    // "last" 哨兵指向最近一笔
    let result = f
        .service
        .cmd_trade_clean("EURUSD", &json!({"id": "last"}))
        .await;
    assert!(!result.error);
    assert!(f.trader.trades().is_empty());
    assert_eq!(f.executor.order_count(), 0);

    // 集合已空：再次清除是错误
    let result = f.service.cmd_trade_clean("EURUSD", &json!({})).await;
    assert!(result.error);
}

#[tokio::test]
async fn test_recheck_all_fans_out_per_market() {
    let f = fixture();
    let second = Arc::new(InstrumentInner::new(
        MarketIdentity::from_symbol("USDJPY"),
        16,
        dec!(1),
    ));
    let port: Arc<dyn Instrument> = second;
    f.service
        .register("USDJPY", Arc::new(StrategyTrader::new(port)));

    f.trader
        .open_trade(TradeType::Asset, Direction::Long, dec!(1), Utc::now());

    let results = f.service.cmd_strategy_trader_recheck_all().await;
    assert_eq!(results.len(), 2);
    let eurusd = results.iter().find(|(m, _)| m == "EURUSD").unwrap();
    assert!(!eurusd.1.error);
    assert_eq!(eurusd.1.messages.len(), 1);
}

#[tokio::test]
async fn test_modify_all_fans_out_per_market() {
    let f = fixture();
    let second = Arc::new(InstrumentInner::new(
        MarketIdentity::from_symbol("USDJPY"),
        16,
        dec!(1),
    ));
    let port: Arc<dyn Instrument> = second;
    f.service
        .register("USDJPY", Arc::new(StrategyTrader::new(port)));

    let results = f
        .service
        .cmd_strategy_trader_modify_all(&json!({"action": "enable"}))
        .await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.activity == Some(true)));
}
