mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use stockpulse::{
    models::{Alert, AlertKind, PriceSnapshot},
    services::{
        alert_monitor,
        notifier::Notifier,
        store::{MemoryStore, Store},
        user_service,
    },
};

use common::{FakeSource, Reply, test_app};

fn snapshot(symbol: &str, price: f64, volume: i64, age_secs: i64) -> PriceSnapshot {
    PriceSnapshot {
        symbol: symbol.to_string(),
        price,
        volume,
        change_percent: 0.0,
        timestamp: Utc::now().timestamp() - age_secs,
    }
}

async fn add_alert(store: &dyn Store, user_id: i64, symbol: &str, kind: AlertKind, threshold: f64) -> Alert {
    let alert = Alert::new(user_id, symbol, kind, threshold, Utc::now().timestamp());
    store.insert_alert(&alert).await.unwrap();
    alert
}

#[tokio::test(start_paused = true)]
async fn price_high_fires_once_and_comes_back_after_cooldown() {
    let source = Arc::new(FakeSource::new("fake").listing("AAPL", "Apple Inc."));
    source.reply("AAPL", vec![Reply::Price(201.0, 1_000)]);
    let app = test_app(vec![source]);
    let mut rx = app.notifier.subscribe();

    app.store.append_snapshot(&snapshot("AAPL", 195.0, 900, 60)).await.unwrap();
    let alert = add_alert(app.store.as_ref(), 42, "AAPL", AlertKind::PriceHigh, 200.0).await;

    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();
    assert_eq!(summary.symbols, 1);
    assert_eq!(summary.fired, 1);

    let sent = rx.try_recv().unwrap();
    assert_eq!(sent.recipient, 42);
    assert!(sent.text.contains("200.00"));
    assert!(sent.text.contains("201.00"));
    assert!(sent.text.contains("Apple Inc. (AAPL)"));

    let paused = app.store.alert(alert.id).await.unwrap();
    assert!(!paused.active);
    assert!(paused.cooldown_until.is_some());

    // still within the cool-down: nothing to scan, nothing sent
    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();
    assert_eq!(summary.symbols, 0);
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(1799)).await;
    assert!(!app.store.alert(alert.id).await.unwrap().active);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let restored = app.store.alert(alert.id).await.unwrap();
    assert!(restored.active);
    assert_eq!(restored.cooldown_until, None);
}

#[tokio::test(start_paused = true)]
async fn untriggered_alert_stays_active() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("AAPL", vec![Reply::Price(199.99, 0)]);
    let app = test_app(vec![source]);
    let mut rx = app.notifier.subscribe();

    let alert = add_alert(app.store.as_ref(), 1, "AAPL", AlertKind::PriceHigh, 200.0).await;

    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();
    assert_eq!(summary.fired, 0);
    assert!(rx.try_recv().is_err());
    assert!(app.store.alert(alert.id).await.unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn price_change_compares_against_the_previous_snapshot() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("TSLA", vec![Reply::Price(95.0, 0)]);
    let app = test_app(vec![source]);
    let mut rx = app.notifier.subscribe();

    app.store.append_snapshot(&snapshot("TSLA", 100.0, 0, 30)).await.unwrap();
    add_alert(app.store.as_ref(), 1, "TSLA", AlertKind::PriceChange, 5.0).await;

    alert_monitor::run_tick(app.state.clone()).await.unwrap();

    let sent = rx.try_recv().unwrap();
    assert!(sent.text.contains("TSLA down 5.0%"));
}

#[tokio::test(start_paused = true)]
async fn fetched_quote_is_recorded_in_price_history() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("MSFT", vec![Reply::Price(410.0, 5)]);
    let app = test_app(vec![source]);

    add_alert(app.store.as_ref(), 1, "MSFT", AlertKind::PriceHigh, 500.0).await;

    alert_monitor::run_tick(app.state.clone()).await.unwrap();
    // the second tick reuses the cached quote, which must not be stored twice
    alert_monitor::run_tick(app.state.clone()).await.unwrap();

    let rows = app.store.recent_snapshots("MSFT", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].price, 410.0);
}

#[tokio::test(start_paused = true)]
async fn duplicate_alerts_of_one_kind_notify_once() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("AAPL", vec![Reply::Price(150.0, 0)]);
    let app = test_app(vec![source]);
    let mut rx = app.notifier.subscribe();

    let a = add_alert(app.store.as_ref(), 7, "AAPL", AlertKind::PriceLow, 160.0).await;
    let b = add_alert(app.store.as_ref(), 7, "AAPL", AlertKind::PriceLow, 155.0).await;

    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();

    assert_eq!(summary.fired, 1);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
    assert!(!app.store.alert(a.id).await.unwrap().active);
    assert!(!app.store.alert(b.id).await.unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn one_quote_per_symbol_serves_every_user() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("AAPL", vec![Reply::Price(210.0, 0)]);
    let app = test_app(vec![source.clone()]);
    let mut rx = app.notifier.subscribe();

    add_alert(app.store.as_ref(), 1, "AAPL", AlertKind::PriceHigh, 200.0).await;
    add_alert(app.store.as_ref(), 2, "aapl", AlertKind::PriceHigh, 205.0).await;

    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();

    assert_eq!(summary.fired, 2);
    assert_eq!(source.calls(), 1);
    let mut recipients = vec![rx.try_recv().unwrap().recipient, rx.try_recv().unwrap().recipient];
    recipients.sort();
    assert_eq!(recipients, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn symbol_without_a_quote_is_skipped() {
    let source = Arc::new(FakeSource::new("fake"));
    let app = test_app(vec![source]);
    let mut rx = app.notifier.subscribe();

    let alert = add_alert(app.store.as_ref(), 1, "GONE", AlertKind::PriceLow, 1_000.0).await;

    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(rx.try_recv().is_err());
    assert!(app.store.alert(alert.id).await.unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn users_with_alerts_disabled_are_not_notified() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("AAPL", vec![Reply::Price(250.0, 0)]);
    let app = test_app(vec![source]);
    let mut rx = app.notifier.subscribe();

    user_service::ensure_user(&app.state, 5, Default::default()).await.unwrap();
    user_service::set_alerts_enabled(&app.state, 5, false).await.unwrap();
    let alert = add_alert(app.store.as_ref(), 5, "AAPL", AlertKind::PriceHigh, 200.0).await;

    alert_monitor::run_tick(app.state.clone()).await.unwrap();

    assert!(rx.try_recv().is_err());
    assert!(app.store.alert(alert.id).await.unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn expired_cooldowns_are_swept_at_the_start_of_a_tick() {
    let source = Arc::new(FakeSource::new("fake"));
    let app = test_app(vec![source]);

    let alert = add_alert(app.store.as_ref(), 1, "AAPL", AlertKind::PriceHigh, 200.0).await;
    let past = Utc::now().timestamp() - 1;
    app.store
        .deactivate_alerts(1, "AAPL", AlertKind::PriceHigh, past)
        .await
        .unwrap();

    let summary = alert_monitor::run_tick(app.state.clone()).await.unwrap();

    assert_eq!(summary.reactivated, 1);
    assert!(app.store.alert(alert.id).await.unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn stale_timer_does_not_cut_a_later_cooldown_short() {
    let app = test_app(vec![]);
    let alert = add_alert(app.store.as_ref(), 1, "AAPL", AlertKind::PriceHigh, 200.0).await;
    let store: Arc<dyn Store> = app.store.clone();

    let ids = store
        .deactivate_alerts(1, "AAPL", AlertKind::PriceHigh, 1_800)
        .await
        .unwrap();
    alert_monitor::schedule_reactivation(store.clone(), ids, 1_800, Duration::from_secs(1_800));

    // the sweep ends the first cool-down and the alert fires straight away
    assert_eq!(store.reactivate_expired(1_800).await.unwrap(), 1);
    store
        .deactivate_alerts(1, "AAPL", AlertKind::PriceHigh, 3_600)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1_801)).await;

    let paused = app.store.alert(alert.id).await.unwrap();
    assert!(!paused.active);
    assert_eq!(paused.cooldown_until, Some(3_600));
}

/// Records whether the alert was still active when its notification went out.
struct ActiveAtSend {
    store: Arc<MemoryStore>,
    alert: ObjectId,
    seen: Mutex<Vec<bool>>,
}

#[async_trait]
impl Notifier for ActiveAtSend {
    async fn notify(&self, _recipient: i64, _text: &str) -> Result<(), String> {
        let active = self.store.alert(self.alert).await.is_none_or(|a| a.active);
        self.seen.lock().unwrap().push(active);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn alert_is_paused_before_the_notification_goes_out() {
    let source = Arc::new(FakeSource::new("fake"));
    source.reply("AAPL", vec![Reply::Price(201.0, 0)]);
    let app = test_app(vec![source]);

    let alert = add_alert(app.store.as_ref(), 9, "AAPL", AlertKind::PriceHigh, 200.0).await;
    let check = Arc::new(ActiveAtSend {
        store: app.store.clone(),
        alert: alert.id,
        seen: Mutex::new(Vec::new()),
    });

    let mut state = app.state.clone();
    state.notifier = check.clone();

    let summary = alert_monitor::run_tick(state).await.unwrap();

    assert_eq!(summary.fired, 1);
    assert_eq!(*check.seen.lock().unwrap(), vec![false]);
}
