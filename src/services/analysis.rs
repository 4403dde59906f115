use serde::Serialize;

use crate::models::{Personality, PriceRecord};
use crate::services::indicators::{Indicators, MaTrend};

/// Indicator readout plus the signals that matter for one personality.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub symbol: String,
    pub current_price: f64,
    pub change_percent: f64,
    pub personality: Personality,
    pub signals: Vec<String>,
    pub recommendation: &'static str,
    pub risk_level: &'static str,
    pub indicators: Indicators,
}

pub fn analyze(quote: &PriceRecord, ind: &Indicators, personality: Personality) -> Analysis {
    let (signals, recommendation) = match personality {
        Personality::ShortTerm => (
            short_term_signals(ind),
            "Suited to short-term trades, keep a tight stop-loss",
        ),
        Personality::Balanced => (balanced_signals(ind), "Balanced allocation, review regularly"),
        Personality::LongTerm => (long_term_signals(ind), "Hold long term, buy on a schedule"),
        Personality::Growth => (
            growth_signals(ind),
            "High risk, high reward, enforce strict stop-losses",
        ),
        Personality::Passive => (passive_signals(ind), "Passive investing, buy on a schedule"),
    };

    Analysis {
        symbol: quote.symbol.clone(),
        current_price: quote.price,
        change_percent: quote.change_percent,
        personality,
        signals,
        recommendation,
        risk_level: personality.profile().risk_level,
        indicators: ind.clone(),
    }
}

fn short_term_signals(ind: &Indicators) -> Vec<String> {
    let mut out = Vec::new();

    match ind.rsi {
        Some(rsi) if rsi < 30.0 => out.push("RSI oversold, a bounce is possible".to_string()),
        Some(rsi) if rsi > 70.0 => out.push("RSI overbought, watch for a pullback".to_string()),
        _ => {}
    }

    if let (Some(macd), Some(signal)) = (ind.macd, ind.macd_signal) {
        if macd > signal {
            out.push("MACD golden cross, short-term bullish".to_string());
        } else {
            out.push("MACD death cross, short-term bearish".to_string());
        }
    }

    match ind.bb_position {
        Some(pos) if pos < 0.2 => out.push("Near the lower Bollinger band, a bounce is possible".to_string()),
        Some(pos) if pos > 0.8 => out.push("Near the upper Bollinger band, watch for a pullback".to_string()),
        _ => {}
    }

    out
}

fn balanced_signals(ind: &Indicators) -> Vec<String> {
    let mut out = Vec::new();

    match ind.ma_trend {
        MaTrend::StrongUptrend => out.push("Moving averages stacked bullish, trend is up".to_string()),
        MaTrend::StrongDowntrend => out.push("Moving averages stacked bearish, trend is down".to_string()),
        _ => {}
    }

    if ind.volume_ratio.is_some_and(|r| r > 1.5) {
        out.push("Volume expanding, watch the follow-through".to_string());
    }

    if ind.rsi.is_some_and(|r| (40.0..=60.0).contains(&r)) {
        out.push("RSI neutral, check other indicators".to_string());
    }

    out
}

fn long_term_signals(ind: &Indicators) -> Vec<String> {
    let mut out = Vec::new();

    match ind.ma_trend {
        MaTrend::StrongUptrend => out.push("Long-term trend is up, suitable to hold".to_string()),
        MaTrend::StrongDowntrend => out.push("Long-term trend is down, hold with caution".to_string()),
        _ => {}
    }

    if ind.volatility.is_some_and(|v| v < 0.02) {
        out.push("Low volatility, suitable for long-term holding".to_string());
    }

    out
}

fn growth_signals(ind: &Indicators) -> Vec<String> {
    let mut out = Vec::new();

    if ind.volatility.is_some_and(|v| v > 0.05) {
        out.push("High volatility, large upside potential".to_string());
    }

    if ind.volume_ratio.is_some_and(|r| r > 2.0) {
        out.push("Volume surging, watch for a breakout".to_string());
    }

    match ind.rsi {
        Some(rsi) if rsi < 20.0 => out.push("Extremely oversold, a bounce is possible".to_string()),
        Some(rsi) if rsi > 80.0 => out.push("Extremely overbought, mind the risk".to_string()),
        _ => {}
    }

    out
}

fn passive_signals(ind: &Indicators) -> Vec<String> {
    let mut out = Vec::new();

    match ind.ma_trend {
        MaTrend::StrongUptrend => out.push("Long-term trend is healthy, keep holding".to_string()),
        MaTrend::Sideways => out.push("Range-bound, suitable for scheduled buying".to_string()),
        _ => {}
    }

    if ind.volatility.is_some_and(|v| v < 0.015) {
        out.push("Low volatility, suitable for passive investing".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readout() -> Indicators {
        Indicators {
            close: 100.0,
            rsi: Some(25.0),
            macd: Some(1.2),
            macd_signal: Some(0.8),
            macd_histogram: Some(0.4),
            bb_upper: Some(110.0),
            bb_middle: Some(105.0),
            bb_lower: Some(99.0),
            bb_position: Some(0.09),
            ma5: Some(101.0),
            ma10: Some(102.0),
            ma20: Some(103.0),
            ma50: Some(104.0),
            volume_sma: Some(1_000.0),
            volume_ratio: Some(2.5),
            volatility: Some(0.06),
            ma_trend: MaTrend::StrongDowntrend,
        }
    }

    fn quote() -> PriceRecord {
        PriceRecord {
            symbol: "AAPL".into(),
            price: 100.0,
            volume: 2_500,
            change: -1.0,
            change_percent: -0.99,
            high: 101.5,
            low: 99.5,
            open: 101.0,
            timestamp: 0,
            source: "test".into(),
        }
    }

    #[test]
    fn short_term_reads_rsi_macd_and_band() {
        let a = analyze(&quote(), &readout(), Personality::ShortTerm);
        assert_eq!(a.signals.len(), 3);
        assert!(a.signals[0].contains("oversold"));
        assert!(a.signals[1].contains("golden cross"));
        assert!(a.signals[2].contains("lower Bollinger"));
        assert_eq!(a.risk_level, "high");
    }

    #[test]
    fn growth_flags_volatility_and_volume() {
        let a = analyze(&quote(), &readout(), Personality::Growth);
        assert!(a.signals.iter().any(|s| s.contains("High volatility")));
        assert!(a.signals.iter().any(|s| s.contains("Volume surging")));
    }

    #[test]
    fn missing_values_produce_no_signals() {
        let mut ind = readout();
        ind.rsi = None;
        ind.macd = None;
        ind.bb_position = None;
        let a = analyze(&quote(), &ind, Personality::ShortTerm);
        assert!(a.signals.is_empty());
    }
}
