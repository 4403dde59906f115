use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Period;

/// Risk/strategy profile chosen by a user. Drives which history window is
/// analysed and which signals are surfaced in notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    ShortTerm,
    #[default]
    Balanced,
    LongTerm,
    Growth,
    Passive,
}

#[derive(Debug, Clone, Copy)]
pub struct PersonalityProfile {
    pub title: &'static str,
    pub description: &'static str,
    pub indicators: &'static [&'static str],
    pub period: Period,
    pub risk_level: &'static str,
}

impl Personality {
    pub const ALL: [Personality; 5] = [
        Personality::ShortTerm,
        Personality::Balanced,
        Personality::LongTerm,
        Personality::Growth,
        Personality::Passive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::ShortTerm => "short_term",
            Personality::Balanced => "balanced",
            Personality::LongTerm => "long_term",
            Personality::Growth => "growth",
            Personality::Passive => "passive",
        }
    }

    pub fn profile(&self) -> PersonalityProfile {
        match self {
            Personality::ShortTerm => PersonalityProfile {
                title: "Short-term trader",
                description: "Short holding periods, focused on technicals",
                indicators: &["RSI", "MACD", "BOLLINGER"],
                period: Period::OneMonth,
                risk_level: "high",
            },
            Personality::Balanced => PersonalityProfile {
                title: "Balanced investor",
                description: "Technicals plus fundamentals, reviewed regularly",
                indicators: &["RSI", "MA", "VOLUME"],
                period: Period::ThreeMonths,
                risk_level: "medium",
            },
            Personality::LongTerm => PersonalityProfile {
                title: "Long-term owner",
                description: "Long holding periods, focused on fundamentals",
                indicators: &["MA", "VOLUME", "TREND"],
                period: Period::SixMonths,
                risk_level: "low",
            },
            Personality::Growth => PersonalityProfile {
                title: "Growth investor",
                description: "High risk, high reward, growth names",
                indicators: &["RSI", "MACD", "VOLUME"],
                period: Period::OneMonth,
                risk_level: "very high",
            },
            Personality::Passive => PersonalityProfile {
                title: "Passive investor",
                description: "Index investing with periodic contributions",
                indicators: &["MA", "TREND"],
                period: Period::OneYear,
                risk_level: "very low",
            },
        }
    }

    pub fn period(&self) -> Period {
        self.profile().period
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().title)
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| format!("unknown personality: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_loose_spellings() {
        assert_eq!("Short-Term".parse::<Personality>().unwrap(), Personality::ShortTerm);
        assert_eq!("long term".parse::<Personality>().unwrap(), Personality::LongTerm);
        assert!("yolo".parse::<Personality>().is_err());
    }

    #[test]
    fn default_is_balanced_with_three_month_window() {
        let p = Personality::default();
        assert_eq!(p, Personality::Balanced);
        assert_eq!(p.period(), Period::ThreeMonths);
    }
}
