//! Session tracking and time-bin alignment
//!
//! Bins are aligned to the daily session open (09:15 IST by default), not
//! to the Unix epoch. A tick before today's open belongs to the previous
//! session. The daily timeframe has exactly one bin per session, starting
//! at the open.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use types::errors::ConfigError;
use types::timeframe::Timeframe;

use crate::config::SessionConfig;

const SECS_PER_DAY: i64 = 86_400;

/// Fixed daily open in a fixed-offset market timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCalendar {
    /// Open as seconds after local midnight
    open_secs: i64,
    offset: FixedOffset,
}

impl SessionCalendar {
    pub fn new(config: &SessionConfig) -> Result<Self, ConfigError> {
        let open = config.open()?;
        Ok(Self {
            open_secs: i64::from(open.num_seconds_from_midnight()),
            offset: config.offset()?,
        })
    }

    /// Open instant (Unix seconds) of the session containing `timestamp`.
    pub fn session_open(&self, timestamp: i64) -> i64 {
        let shift = i64::from(self.offset.local_minus_utc());
        let local = timestamp + shift;
        let mut open_local = local.div_euclid(SECS_PER_DAY) * SECS_PER_DAY + self.open_secs;
        if local < open_local {
            open_local -= SECS_PER_DAY;
        }
        open_local - shift
    }

    pub fn same_session(&self, a: i64, b: i64) -> bool {
        self.session_open(a) == self.session_open(b)
    }

    /// Start of the `timeframe` bin containing `timestamp`.
    pub fn bin_start(&self, timestamp: i64, timeframe: Timeframe) -> i64 {
        let open = self.session_open(timestamp);
        if timeframe.is_session_bound() {
            return open;
        }
        aligned_bin_start(timestamp, timeframe.interval_secs(), open)
    }

    /// Local trading date of the session containing `timestamp`.
    pub fn session_date(&self, timestamp: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.session_open(timestamp), 0)
            .map(|dt| dt.with_timezone(&self.offset).date_naive())
    }
}

/// Align `timestamp` to an `interval_secs` grid anchored at `session_open`.
/// Ticks before the open are binned against the previous session's open.
pub fn aligned_bin_start(timestamp: i64, interval_secs: i64, session_open: i64) -> i64 {
    let mut open = session_open;
    if timestamp < open {
        open -= SECS_PER_DAY;
    }
    let bin_index = (timestamp - open).div_euclid(interval_secs);
    open + bin_index * interval_secs
}
