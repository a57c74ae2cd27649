//! Engine configuration
//!
//! All knobs have production defaults for the Indian cash/F&O session
//! (09:15 IST open). Configuration may be loaded from JSON; every loaded
//! configuration is validated before use and never silently defaulted.

use std::fs;
use std::path::Path;

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;
use types::errors::ConfigError;

/// Trading session anchor: a fixed daily open in a fixed market timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local wall-clock open, "HH:MM" or "HH:MM:SS"
    pub open_time: String,
    /// Market timezone as minutes east of UTC (IST = 330)
    pub utc_offset_minutes: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_time: "09:15".to_string(),
            utc_offset_minutes: 330,
        }
    }
}

impl SessionConfig {
    /// Parse the configured open time.
    pub fn open(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.open_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.open_time, "%H:%M:%S"))
            .map_err(|_| ConfigError::InvalidSessionOpen(self.open_time.clone()))
    }

    /// Parse the configured market offset.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or(ConfigError::InvalidUtcOffset {
            minutes: self.utc_offset_minutes,
        })
    }
}

/// Configuration for the footprint engine and its ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionConfig,
    /// How far (seconds) a tick may lag the last processed tick and still be applied.
    pub out_of_order_tolerance_secs: i64,
    /// Recent trade fingerprints remembered per symbol for duplicate suppression.
    pub dedup_window: usize,
    /// Largest single print accepted.
    pub max_trade_quantity: u64,
    /// Largest believable jump in the feed's cumulative volume between two messages.
    pub max_cumulative_jump: u64,
    /// Upper bound on levels in a dense footprint ladder.
    pub max_ladder_levels: usize,
}

/// Out-of-order tolerance ceiling: one day.
pub const MAX_TOLERANCE_SECS: i64 = 86_400;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            out_of_order_tolerance_secs: 0,
            dedup_window: 200,
            max_trade_quantity: 5_000_000,
            max_cumulative_jump: 2_000_000,
            max_ladder_levels: 5_000,
        }
    }
}

impl EngineConfig {
    /// Validate every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.open()?;
        self.session.offset()?;

        if self.out_of_order_tolerance_secs < 0 {
            return Err(invalid("out_of_order_tolerance_secs", "must be >= 0"));
        }
        if self.out_of_order_tolerance_secs > MAX_TOLERANCE_SECS {
            return Err(invalid("out_of_order_tolerance_secs", "must be <= 86400"));
        }
        if self.dedup_window == 0 {
            return Err(invalid("dedup_window", "must be > 0"));
        }
        if self.max_trade_quantity == 0 {
            return Err(invalid("max_trade_quantity", "must be > 0"));
        }
        if self.max_cumulative_jump == 0 {
            return Err(invalid("max_cumulative_jump", "must be > 0"));
        }
        if self.max_ladder_levels == 0 {
            return Err(invalid("max_ladder_levels", "must be > 0"));
        }
        Ok(())
    }

    /// Load from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            session_open = %config.session.open_time,
            utc_offset_minutes = config.session.utc_offset_minutes,
            "Engine configuration loaded"
        );
        Ok(config)
    }
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.open().unwrap(), NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(config.session.offset().unwrap().local_minus_utc(), 19_800);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"out_of_order_tolerance_secs": 2}"#).unwrap();
        assert_eq!(config.out_of_order_tolerance_secs, 2);
        assert_eq!(config.dedup_window, 200);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_session_override() {
        let json = r#"{"session": {"open_time": "09:30:00", "utc_offset_minutes": -300}}"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        assert_eq!(config.session.open().unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.session.offset().unwrap().local_minus_utc(), -18_000);
    }

    #[test]
    fn test_invalid_open_time() {
        let json = r#"{"session": {"open_time": "25:99"}}"#;
        assert_eq!(
            EngineConfig::from_json_str(json),
            Err(ConfigError::InvalidSessionOpen("25:99".to_string()))
        );
    }

    #[test]
    fn test_invalid_offset() {
        let json = r#"{"session": {"utc_offset_minutes": 100000}}"#;
        assert!(matches!(
            EngineConfig::from_json_str(json),
            Err(ConfigError::InvalidUtcOffset { minutes: 100000 })
        ));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let json = r#"{"out_of_order_tolerance_secs": -1}"#;
        assert!(matches!(
            EngineConfig::from_json_str(json),
            Err(ConfigError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_tolerance_bounded_to_one_day() {
        let config = EngineConfig {
            out_of_order_tolerance_secs: i64::MAX,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidSetting {
                name: "out_of_order_tolerance_secs".to_string(),
                reason: "must be <= 86400".to_string(),
            })
        );
        let config = EngineConfig {
            out_of_order_tolerance_secs: MAX_TOLERANCE_SECS,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_json_file("/nonexistent/footprint.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
