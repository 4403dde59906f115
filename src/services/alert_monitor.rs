use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use tokio::task::JoinHandle;
use tokio::time;

use crate::{
    AppState,
    models::{Alert, AlertKind, PriceRecord, PriceSnapshot},
    services::{indicators, store::Store},
};

/// Snapshots loaded per symbol: enough for 20 returns once the fresh quote is
/// appended.
pub const SNAPSHOT_WINDOW: i64 = 21;

/// Signals appended to a notification.
const MAX_SIGNALS: usize = 3;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub symbols: usize,
    pub skipped: usize,
    pub fired: usize,
    pub reactivated: u64,
}

/// What the monitor knows about one symbol during a tick.
#[derive(Debug, Clone)]
pub struct MarketView {
    pub symbol: String,
    pub price: f64,
    pub volume: i64,
    pub previous: Option<PriceSnapshot>,
    /// Prices oldest → newest, ending with the current price.
    pub prices: Vec<f64>,
}

impl MarketView {
    /// `history` is newest first and must not contain the current quote.
    pub fn new(record: &PriceRecord, history: &[PriceSnapshot]) -> Self {
        let window = (SNAPSHOT_WINDOW - 1) as usize;
        let mut prices: Vec<f64> = history.iter().take(window).map(|s| s.price).collect();
        prices.reverse();
        prices.push(record.price);

        Self {
            symbol: record.symbol.to_uppercase(),
            price: record.price,
            volume: record.volume,
            previous: history.first().cloned(),
            prices,
        }
    }
}

pub fn spawn_alert_monitor(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let every = state.settings.alert_check_interval();
        tracing::info!("[alert-monitor] started, checking every {:?}", every);

        loop {
            // run each tick on its own task so a panic is logged, not fatal
            match tokio::spawn(run_tick(state.clone())).await {
                Ok(Ok(summary)) => {
                    if summary.fired > 0 || summary.reactivated > 0 {
                        tracing::info!("[alert-monitor] tick: {:?}", summary);
                    } else {
                        tracing::debug!("[alert-monitor] tick: {:?}", summary);
                    }
                }
                Ok(Err(e)) => tracing::error!("[alert-monitor] tick error: {}", e),
                Err(e) => tracing::error!("[alert-monitor] tick aborted: {}", e),
            }

            time::sleep(every).await;
        }
    })
}

pub async fn run_tick(state: AppState) -> Result<TickSummary, String> {
    let mut summary = TickSummary::default();

    match state.store.reactivate_expired(Utc::now().timestamp()).await {
        Ok(n) => summary.reactivated = n,
        Err(e) => tracing::warn!("[alert-monitor] reactivation sweep failed: {}", e),
    }

    let purged = state.market.purge_expired();
    if purged > 0 {
        tracing::debug!("[alert-monitor] dropped {} stale cache entries", purged);
    }

    let pairs = state.store.active_alert_pairs().await?;

    // one quote per symbol per tick
    let mut by_symbol: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for (user_id, symbol) in pairs {
        by_symbol.entry(symbol).or_default().push(user_id);
    }

    for (symbol, users) in by_symbol {
        summary.symbols += 1;

        let Some(view) = observe(&state, &symbol).await else {
            summary.skipped += 1;
            continue;
        };

        for user_id in users {
            match check_user_alerts(&state, user_id, &view).await {
                Ok(n) => summary.fired += n,
                Err(e) => tracing::error!(
                    "[alert-monitor] checking alerts for {} {} failed: {}",
                    user_id,
                    symbol,
                    e
                ),
            }
        }
    }

    Ok(summary)
}

/// Fetches the current quote, records it in the price history unless it is
/// the same quote as last time, and builds the view alerts are judged on.
async fn observe(state: &AppState, symbol: &str) -> Option<MarketView> {
    let record = state.market.current_price(symbol).await?;

    let mut history = match state.store.recent_snapshots(symbol, SNAPSHOT_WINDOW).await {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("[alert-monitor] history for {} unavailable: {}", symbol, e);
            Vec::new()
        }
    };

    // a cached quote comes back with the timestamp it was stored under
    let repeated = history
        .first()
        .is_some_and(|s| s.timestamp == record.timestamp && s.price == record.price);

    if repeated {
        history.remove(0);
    } else if let Err(e) = state.store.append_snapshot(&PriceSnapshot::from(&record)).await {
        tracing::warn!("[alert-monitor] could not record {} snapshot: {}", symbol, e);
    }

    Some(MarketView::new(&record, &history))
}

async fn check_user_alerts(state: &AppState, user_id: i64, view: &MarketView) -> Result<usize, String> {
    if let Some(prefs) = state.store.get_preferences(user_id).await? {
        if !prefs.alerts_enabled {
            return Ok(0);
        }
    }

    let alerts: Vec<Alert> = state
        .store
        .list_user_alerts(user_id)
        .await?
        .into_iter()
        .filter(|a| a.active && a.symbol.eq_ignore_ascii_case(&view.symbol))
        .collect();

    let mut fired_kinds: HashSet<AlertKind> = HashSet::new();
    let mut sent = 0;

    for alert in alerts {
        if fired_kinds.contains(&alert.kind) {
            continue;
        }

        let Some(body) = evaluate(&alert, view) else {
            continue;
        };

        // one attempt per kind per tick, whatever happens below
        fired_kinds.insert(alert.kind);

        let cooldown = state.settings.alert_cooldown();
        let until = cooldown_deadline(Utc::now(), cooldown);

        let ids = match state
            .store
            .deactivate_alerts(user_id, &view.symbol, alert.kind, until)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(
                    "[alert-monitor] pausing {} {} for {} failed, not notifying: {}",
                    view.symbol,
                    alert.kind,
                    user_id,
                    e
                );
                continue;
            }
        };

        schedule_reactivation(Arc::clone(&state.store), ids, until, cooldown);
        send_alert(state, user_id, &view.symbol, body).await;
        sent += 1;
    }

    Ok(sent)
}

/// Unix second at which a cool-down starting at `now` is over, rounded up so
/// the sweep never ends it early.
pub fn cooldown_deadline(now: DateTime<Utc>, cooldown: Duration) -> i64 {
    let end = now.timestamp() + cooldown.as_secs() as i64;
    if now.timestamp_subsec_nanos() > 0 || cooldown.subsec_nanos() > 0 {
        end + 1
    } else {
        end
    }
}

/// Returns the notification body when the alert's condition holds.
pub fn evaluate(alert: &Alert, view: &MarketView) -> Option<String> {
    let sym = &view.symbol;
    let price = view.price;
    let threshold = alert.threshold;

    match alert.kind {
        AlertKind::PriceHigh => (price >= threshold).then(|| {
            format!("🚀 {sym} broke above {threshold:.2}!\nCurrent price: ${price:.2}")
        }),

        AlertKind::PriceLow => (price <= threshold).then(|| {
            format!("📉 {sym} fell below {threshold:.2}!\nCurrent price: ${price:.2}")
        }),

        AlertKind::PriceChange => {
            let previous = view.previous.as_ref()?.price;
            if previous == 0.0 {
                return None;
            }
            let change = ((price - previous) / previous * 100.0).abs();
            let direction = if price > previous { "up" } else { "down" };
            (change >= threshold).then(|| {
                format!("⚡ {sym} {direction} {change:.1}%!\nCurrent price: ${price:.2}")
            })
        }

        AlertKind::VolumeSpike => {
            let previous = view.previous.as_ref()?.volume;
            let ratio = if previous > 0 {
                view.volume as f64 / previous as f64
            } else {
                0.0
            };
            (ratio >= threshold).then(|| {
                format!(
                    "📊 {sym} volume up {ratio:.1}x!\nCurrent volume: {}",
                    fmt_thousands(view.volume)
                )
            })
        }

        AlertKind::Volatility => {
            if view.prices.len() < 2 {
                return None;
            }
            let returns = indicators::fractional_returns(&view.prices);
            let volatility = indicators::root_mean_square(&returns)? * 100.0;
            (volatility >= threshold).then(|| {
                format!("🌊 {sym} volatility reached {volatility:.1}%!\nCurrent price: ${price:.2}")
            })
        }
    }
}

async fn send_alert(state: &AppState, user_id: i64, symbol: &str, body: String) {
    let mut message = match state.market.stock_info(symbol).await {
        Some(info) => format!("🔔 **{} ({})**\n\n{}", info.name, symbol, body),
        None => body,
    };

    let personality = match state.store.get_user(user_id).await {
        Ok(Some(u)) => u.personality,
        _ => Default::default(),
    };

    if let Some(analysis) = state.market.analysis(symbol, personality).await {
        if !analysis.signals.is_empty() {
            message.push_str("\n\n📈 **Technical signals:**\n");
            for signal in analysis.signals.iter().take(MAX_SIGNALS) {
                message.push_str(&format!("• {signal}\n"));
            }
        }
    }

    match state.notifier.notify(user_id, &message).await {
        Ok(()) => tracing::info!("[alert-monitor] alert sent to {} for {}", user_id, symbol),
        Err(e) => tracing::error!("[alert-monitor] sending alert to {} failed: {}", user_id, e),
    }
}

/// Fire-and-forget: turns the alerts back on once the cool-down ending at
/// `until` has passed. A no-op if the sweep got there first.
pub fn schedule_reactivation(store: Arc<dyn Store>, ids: Vec<ObjectId>, until: i64, after: Duration) {
    if ids.is_empty() {
        return;
    }

    tokio::spawn(async move {
        time::sleep(after).await;
        match store.reactivate_alerts(&ids, until).await {
            Ok(n) => tracing::debug!("[alert-monitor] reactivated {} alert(s)", n),
            Err(e) => tracing::error!("[alert-monitor] reactivating alerts failed: {}", e),
        }
    });
}

fn fmt_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(price: f64, volume: i64) -> PriceRecord {
        PriceRecord {
            symbol: "AAPL".into(),
            price,
            volume,
            change: 0.0,
            change_percent: 0.0,
            high: price,
            low: price,
            open: price,
            timestamp: 1_000,
            source: "test".into(),
        }
    }

    fn snap(price: f64, volume: i64, ts: i64) -> PriceSnapshot {
        PriceSnapshot {
            symbol: "AAPL".into(),
            price,
            volume,
            change_percent: 0.0,
            timestamp: ts,
        }
    }

    fn alert(kind: AlertKind, threshold: f64) -> Alert {
        Alert::new(1, "AAPL", kind, threshold, 0)
    }

    #[test]
    fn price_high_is_inclusive() {
        let view = MarketView::new(&record(200.0, 0), &[]);
        assert!(evaluate(&alert(AlertKind::PriceHigh, 200.0), &view).is_some());
        assert!(evaluate(&alert(AlertKind::PriceHigh, 200.01), &view).is_none());
    }

    #[test]
    fn price_low_is_inclusive() {
        let view = MarketView::new(&record(150.0, 0), &[]);
        assert!(evaluate(&alert(AlertKind::PriceLow, 150.0), &view).is_some());
        assert!(evaluate(&alert(AlertKind::PriceLow, 149.99), &view).is_none());
    }

    #[test]
    fn price_high_message_carries_threshold_and_price() {
        let view = MarketView::new(&record(201.0, 0), &[snap(195.0, 0, 900)]);
        let msg = evaluate(&alert(AlertKind::PriceHigh, 200.0), &view).unwrap();
        assert!(msg.contains("200.00"));
        assert!(msg.contains("201.00"));
    }

    #[test]
    fn price_change_labels_direction() {
        let up = MarketView::new(&record(105.0, 0), &[snap(100.0, 0, 900)]);
        let msg = evaluate(&alert(AlertKind::PriceChange, 5.0), &up).unwrap();
        assert!(msg.contains(" up 5.0%"));

        let down = MarketView::new(&record(95.0, 0), &[snap(100.0, 0, 900)]);
        let msg = evaluate(&alert(AlertKind::PriceChange, 5.0), &down).unwrap();
        assert!(msg.contains(" down 5.0%"));

        assert!(evaluate(&alert(AlertKind::PriceChange, 5.1), &down).is_none());
    }

    #[test]
    fn delta_kinds_need_a_previous_snapshot() {
        let view = MarketView::new(&record(105.0, 1_000), &[]);
        assert!(evaluate(&alert(AlertKind::PriceChange, 0.1), &view).is_none());
        assert!(evaluate(&alert(AlertKind::VolumeSpike, 0.1), &view).is_none());
        assert!(evaluate(&alert(AlertKind::Volatility, 0.0), &view).is_none());
    }

    #[test]
    fn volume_spike_uses_ratio_and_ignores_zero_base() {
        let view = MarketView::new(&record(100.0, 3_000_000), &[snap(100.0, 1_000_000, 900)]);
        let msg = evaluate(&alert(AlertKind::VolumeSpike, 2.0), &view).unwrap();
        assert!(msg.contains("3.0x"));
        assert!(msg.contains("3,000,000"));

        let zero = MarketView::new(&record(100.0, 3_000_000), &[snap(100.0, 0, 900)]);
        assert!(evaluate(&alert(AlertKind::VolumeSpike, 0.5), &zero).is_none());
    }

    #[test]
    fn volatility_is_rms_of_returns_in_percent() {
        // returns: +10%, -10%
        let history = [snap(110.0, 0, 2), snap(100.0, 0, 1)];
        let view = MarketView::new(&record(99.0, 0), &history);
        assert_eq!(view.prices, vec![100.0, 110.0, 99.0]);

        assert!(evaluate(&alert(AlertKind::Volatility, 9.99), &view).is_some());
        assert!(evaluate(&alert(AlertKind::Volatility, 10.1), &view).is_none());
    }

    #[test]
    fn steady_trend_counts_as_volatility() {
        // returns: +10%, +10%
        let history = [snap(110.0, 0, 2), snap(100.0, 0, 1)];
        let view = MarketView::new(&record(121.0, 0), &history);

        let msg = evaluate(&alert(AlertKind::Volatility, 5.0), &view).unwrap();
        assert!(msg.contains("10.0%"));
        assert!(evaluate(&alert(AlertKind::Volatility, 10.01), &view).is_none());
    }

    #[test]
    fn cooldown_deadline_rounds_partial_seconds_up() {
        let cooldown = Duration::from_secs(1_800);

        let whole = DateTime::from_timestamp(1_000, 0).unwrap();
        assert_eq!(cooldown_deadline(whole, cooldown), 2_800);

        let partial = DateTime::from_timestamp(1_000, 999_000_000).unwrap();
        assert_eq!(cooldown_deadline(partial, cooldown), 2_801);
    }

    #[test]
    fn view_keeps_at_most_twenty_returns() {
        let history: Vec<PriceSnapshot> = (0..40).rev().map(|i| snap(100.0 + i as f64, 0, i)).collect();
        let view = MarketView::new(&record(150.0, 0), &history);
        assert_eq!(view.prices.len(), SNAPSHOT_WINDOW as usize);
        assert_eq!(view.previous.unwrap().price, 139.0);
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(fmt_thousands(0), "0");
        assert_eq!(fmt_thousands(999), "999");
        assert_eq!(fmt_thousands(1_234_567), "1,234,567");
    }
}
