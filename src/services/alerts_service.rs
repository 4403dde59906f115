use chrono::Utc;
use regex::Regex;

use crate::{
    AppState,
    models::{Alert, AlertKind},
};

const SYMBOL_PATTERN: &str = r"^[A-Z0-9][A-Z0-9.\-]{0,9}$";

pub fn normalize_symbol(symbol: &str) -> Result<String, String> {
    let sym = symbol.trim().to_uppercase();
    let re = Regex::new(SYMBOL_PATTERN).map_err(|e| e.to_string())?;

    if !re.is_match(&sym) {
        return Err(format!("Invalid symbol: {}", symbol.trim()));
    }

    Ok(sym)
}

pub fn validate_threshold(threshold: f64) -> Result<f64, String> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err("Threshold must be a positive number.".into());
    }
    Ok(threshold)
}

pub async fn create_alert(
    state: &AppState,
    user_id: i64,
    symbol: &str,
    kind: AlertKind,
    threshold: f64,
) -> Result<Alert, String> {
    let sym = normalize_symbol(symbol)?;
    let threshold = validate_threshold(threshold)?;

    if state.market.stock_info(&sym).await.is_none() {
        return Err(format!("Unknown symbol: {sym}"));
    }

    let alert = Alert::new(user_id, &sym, kind, threshold, Utc::now().timestamp());
    state.store.insert_alert(&alert).await?;

    tracing::info!(
        "[alerts] user {} set {} {} at {}",
        user_id,
        sym,
        kind.as_str(),
        threshold
    );

    Ok(alert)
}

pub async fn list_alerts(state: &AppState, user_id: i64) -> Result<Vec<Alert>, String> {
    state.store.list_user_alerts(user_id).await
}

/// Removes every alert of this kind the user holds on the symbol.
pub async fn delete_alert(
    state: &AppState,
    user_id: i64,
    symbol: &str,
    kind: AlertKind,
) -> Result<u64, String> {
    let sym = normalize_symbol(symbol)?;
    state.store.delete_alerts(user_id, &sym, kind).await
}

pub fn alert_summary(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return "You have no alerts set.".to_string();
    }

    let mut out = String::from("🔔 **Your alerts:**\n\n");
    for a in alerts {
        let status = if a.active { "active" } else { "paused" };
        out.push_str(&format!(
            "• {} {} {} ({})\n",
            a.symbol,
            a.kind.label(),
            fmt_threshold(a),
            status
        ));
    }
    out
}

fn fmt_threshold(a: &Alert) -> String {
    match a.kind {
        AlertKind::PriceHigh | AlertKind::PriceLow => format!("${:.2}", a.threshold),
        AlertKind::PriceChange | AlertKind::Volatility => format!("{:.1}%", a.threshold),
        AlertKind::VolumeSpike => format!("{:.1}x", a.threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_trimmed_and_uppercased() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
        assert_eq!(normalize_symbol("2330.tw").unwrap(), "2330.TW");
    }

    #[test]
    fn malformed_symbols_are_rejected() {
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("AA PL").is_err());
        assert!(normalize_symbol("$AAPL").is_err());
        assert!(normalize_symbol("ABCDEFGHIJKL").is_err());
    }

    #[test]
    fn threshold_must_be_positive_and_finite() {
        assert!(validate_threshold(0.0).is_err());
        assert!(validate_threshold(-1.0).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
        assert!(validate_threshold(f64::INFINITY).is_err());
        assert_eq!(validate_threshold(2.5).unwrap(), 2.5);
    }

    #[test]
    fn summary_marks_paused_alerts() {
        let mut paused = Alert::new(1, "TSLA", AlertKind::PriceChange, 5.0, 2);
        paused.active = false;
        let alerts = vec![Alert::new(1, "AAPL", AlertKind::PriceHigh, 200.0, 1), paused];

        let text = alert_summary(&alerts);
        assert!(text.contains("AAPL"));
        assert!(text.contains("$200.00 (active)"));
        assert!(text.contains("5.0% (paused)"));
        assert_eq!(alert_summary(&[]), "You have no alerts set.");
    }
}
