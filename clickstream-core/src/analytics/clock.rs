//! Hour-of-day derivation
//!
//! The hour an event happened in depends on a timezone. Rather than reading
//! the host clock's zone, callers inject an [`HourClock`]: either a
//! [`FixedOffsetClock`] built from configuration or any `Fn(i64) -> u8`.

use crate::error::{Error, Result};
use chrono::{FixedOffset, Offset, Utc};

const MILLIS_PER_SECOND: i64 = 1_000;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;

/// Maps an epoch-millisecond timestamp to an hour of day in `0..=23`.
pub trait HourClock: Send + Sync {
    fn hour_of(&self, timestamp_ms: i64) -> u8;
}

impl<F> HourClock for F
where
    F: Fn(i64) -> u8 + Send + Sync,
{
    fn hour_of(&self, timestamp_ms: i64) -> u8 {
        self(timestamp_ms)
    }
}

/// Hour of day at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOffsetClock {
    offset: FixedOffset,
}

impl FixedOffsetClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Parse `"UTC"`, `"Z"`, `"+HH:MM"`, `"-HH:MM"` or `"+HH"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("utc") || spec == "Z" {
            return Ok(Self::utc());
        }

        let invalid = || Error::Config(format!("invalid UTC offset: {:?}", spec));

        let (sign, rest) = match spec.as_bytes().first() {
            Some(b'+') => (1, &spec[1..]),
            Some(b'-') => (-1, &spec[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None => (rest, "0"),
        };
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3_600 + minutes * 60))
            .map(Self::new)
            .ok_or_else(invalid)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for FixedOffsetClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl HourClock for FixedOffsetClock {
    fn hour_of(&self, timestamp_ms: i64) -> u8 {
        let local_secs = timestamp_ms.div_euclid(MILLIS_PER_SECOND)
            + i64::from(self.offset.local_minus_utc());
        (local_secs.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_HOUR) as u8
    }
}
