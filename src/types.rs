// =============================================================================
// Shared types used across the JumpTrader signal engine
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Candle interval tracked per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Self::M1, Self::H1, Self::H4, Self::D1];

    /// Interval string as understood by the exchange (`interval=` param).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }

    /// Bar length in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Self::M1 => 60_000,
            Self::H1 => 3_600_000,
            Self::H4 => 14_400_000,
            Self::D1 => 86_400_000,
        }
    }

    /// Default number of bars retained: 24h of 1m, 7d of 1h and 4h, 30d of 1d.
    pub fn default_retention(&self) -> usize {
        match self {
            Self::M1 => 1440,
            Self::H1 => 168,
            Self::H4 => 42,
            Self::D1 => 30,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::M1),
            "1h" => Ok(Self::H1),
            "4h" => Ok(Self::H4),
            "1d" => Ok(Self::D1),
            other => anyhow::bail!("unsupported timeframe '{other}'"),
        }
    }
}

/// Direction of a move or of a detector's bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Sign of `value`; `None` for zero (and NaN).
    pub fn of(value: f64) -> Option<Self> {
        if value > 0.0 {
            Some(Self::Up)
        } else if value < 0.0 {
            Some(Self::Down)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
        }
    }
}

/// Discretised signal tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tier for a metric-to-threshold ratio that has already crossed 1.0.
    pub fn from_strength(strength: f64) -> Self {
        if strength >= 2.0 {
            Self::High
        } else if strength >= 1.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Current UNIX timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_and_displays() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("5m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn timeframe_serialises_as_interval_string() {
        let json = serde_json::to_string(&Timeframe::H4).unwrap();
        assert_eq!(json, "\"4h\"");
    }

    #[test]
    fn severity_tiers_from_strength() {
        assert_eq!(Severity::from_strength(1.0), Severity::Low);
        assert_eq!(Severity::from_strength(1.5), Severity::Medium);
        assert_eq!(Severity::from_strength(3.1), Severity::High);
    }

    #[test]
    fn direction_of_zero_is_none() {
        assert_eq!(Direction::of(0.0), None);
        assert_eq!(Direction::of(-0.1), Some(Direction::Down));
    }
}
