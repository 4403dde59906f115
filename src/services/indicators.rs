//! Technical indicators over a window of daily candles.
//!
//! Every value is computed at the latest candle. An indicator whose window is
//! not filled yet is `None` rather than a partial value.

use serde::Serialize;
use ta::Next;
use ta::indicators::{
    BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};

use crate::models::Candle;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const VOLATILITY_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaTrend {
    StrongUptrend,
    Uptrend,
    StrongDowntrend,
    Downtrend,
    Sideways,
    InsufficientData,
}

impl MaTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaTrend::StrongUptrend => "strong_uptrend",
            MaTrend::Uptrend => "uptrend",
            MaTrend::StrongDowntrend => "strong_downtrend",
            MaTrend::Downtrend => "downtrend",
            MaTrend::Sideways => "sideways",
            MaTrend::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicators {
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_position: Option<f64>,
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma50: Option<f64>,
    pub volume_sma: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub volatility: Option<f64>,
    pub ma_trend: MaTrend,
}

pub fn compute(candles: &[Candle]) -> Option<Indicators> {
    let last = candles.last()?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let (macd, macd_signal, macd_histogram) = match macd(&closes) {
        Some((m, s, h)) => (Some(m), Some(s), Some(h)),
        None => (None, None, None),
    };

    let (bb_upper, bb_middle, bb_lower) = match bollinger(&closes) {
        Some((u, m, l)) => (Some(u), Some(m), Some(l)),
        None => (None, None, None),
    };

    let volume_sma = sma(&volumes, 20);
    let volume_ratio = volume_sma.filter(|v| *v > 0.0).map(|v| last.volume / v);

    let ma5 = sma(&closes, 5);
    let ma20 = sma(&closes, 20);
    let ma50 = sma(&closes, 50);

    Some(Indicators {
        close: last.close,
        rsi: rsi(&closes),
        macd,
        macd_signal,
        macd_histogram,
        bb_upper,
        bb_middle,
        bb_lower,
        bb_position: bb_position(last.close, bb_upper, bb_lower),
        ma5,
        ma10: sma(&closes, 10),
        ma20,
        ma50,
        volume_sma,
        volume_ratio,
        volatility: rolling_volatility(&closes, VOLATILITY_WINDOW),
        ma_trend: ma_trend(closes.len(), ma5, ma20, ma50),
    })
}

pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let mut ind = SimpleMovingAverage::new(period).ok()?;
    values.iter().map(|v| ind.next(*v)).last()
}

pub fn rsi(closes: &[f64]) -> Option<f64> {
    if closes.len() <= RSI_PERIOD {
        return None;
    }
    let mut ind = RelativeStrengthIndex::new(RSI_PERIOD).ok()?;
    closes.iter().map(|v| ind.next(*v)).last()
}

/// (macd line, signal line, histogram)
pub fn macd(closes: &[f64]) -> Option<(f64, f64, f64)> {
    if closes.len() < MACD_SLOW + MACD_SIGNAL - 1 {
        return None;
    }
    let mut ind = MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL).ok()?;
    closes
        .iter()
        .map(|v| ind.next(*v))
        .last()
        .map(|out| (out.macd, out.signal, out.histogram))
}

/// (upper, middle, lower)
pub fn bollinger(closes: &[f64]) -> Option<(f64, f64, f64)> {
    if closes.len() < BOLLINGER_PERIOD {
        return None;
    }
    let mut ind = BollingerBands::new(BOLLINGER_PERIOD, BOLLINGER_STD).ok()?;
    closes
        .iter()
        .map(|v| ind.next(*v))
        .last()
        .map(|out| (out.upper, out.average, out.lower))
}

/// Where the close sits inside the band: 0 at the lower band, 1 at the upper.
pub fn bb_position(close: f64, upper: Option<f64>, lower: Option<f64>) -> Option<f64> {
    let (upper, lower) = (upper?, lower?);
    if upper == lower {
        return Some(0.5);
    }
    Some((close - lower) / (upper - lower))
}

pub fn ma_trend(points: usize, ma5: Option<f64>, ma20: Option<f64>, ma50: Option<f64>) -> MaTrend {
    if points < 50 {
        return MaTrend::InsufficientData;
    }
    let (Some(ma5), Some(ma20), Some(ma50)) = (ma5, ma20, ma50) else {
        return MaTrend::InsufficientData;
    };

    if ma5 > ma20 && ma20 > ma50 {
        MaTrend::StrongUptrend
    } else if ma5 > ma20 {
        MaTrend::Uptrend
    } else if ma5 < ma20 && ma20 < ma50 {
        MaTrend::StrongDowntrend
    } else if ma5 < ma20 {
        MaTrend::Downtrend
    } else {
        MaTrend::Sideways
    }
}

/// Fractional returns between consecutive prices. Pairs starting at a zero
/// price are skipped.
pub fn fractional_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Spread of the values around zero rather than around their mean, so a
/// steady run of same-sign returns still reads as movement.
pub fn root_mean_square(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sq = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
    Some(sq.sqrt())
}

pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Sample stdev of the last `window` daily returns.
pub fn rolling_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if closes.len() < window + 1 {
        return None;
    }
    let returns = fractional_returns(&closes[closes.len() - window - 1..]);
    sample_stdev(&returns)
}
