//! Candle timeframes
//!
//! Intraday timeframes are fixed-length intervals counted from the session
//! open. `D1` is one candle per trading session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Supported candle timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1 minute
    #[serde(rename = "1m")]
    M1,
    /// 5 minutes
    #[serde(rename = "5m")]
    M5,
    /// 15 minutes
    #[serde(rename = "15m")]
    M15,
    /// One candle per trading session
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Interval length in seconds.
    pub fn interval_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::D1 => 86_400,
        }
    }

    /// Whether the aligned bin start is always the session open.
    pub fn is_session_bound(&self) -> bool {
        matches!(self, Timeframe::D1)
    }

    /// Wire label ("1m", "5m", "15m", "1d").
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::D1 => "1d",
        }
    }

    /// All supported timeframes.
    pub fn all() -> &'static [Timeframe] {
        &[Timeframe::M1, Timeframe::M5, Timeframe::M15, Timeframe::D1]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::all()
            .iter()
            .copied()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| ConfigError::InvalidTimeframe(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_interval() {
        assert_eq!(Timeframe::M1.interval_secs(), 60);
        assert_eq!(Timeframe::M5.interval_secs(), 300);
        assert_eq!(Timeframe::M15.interval_secs(), 900);
        assert_eq!(Timeframe::D1.interval_secs(), 86_400);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert_eq!(
            "3m".parse::<Timeframe>(),
            Err(ConfigError::InvalidTimeframe("3m".to_string()))
        );
    }

    #[test]
    fn test_timeframe_serialization() {
        let json = serde_json::to_string(&Timeframe::M15).unwrap();
        assert_eq!(json, "\"15m\"");
        let tf: Timeframe = serde_json::from_str("\"1m\"").unwrap();
        assert_eq!(tf, Timeframe::M1);
    }
}
