//! Duration helpers for configuration files and log messages.

use std::time::Duration;

const fn div_rem_u64(a: u64, b: u64) -> (u64, u64) {
    (a / b, a % b)
}

/// Serde serialization deserialization for a duration.
///
/// Durations are written as `HH:MM` or `HH:MM:SS`.
pub mod with_duration {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Deserialize a duration.
    ///
    /// # Errors
    ///
    /// If the duration is invalid.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<super::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let d = super::duration::from_str(&s)
            .map_err(|_| serde::de::Error::custom(format!("Invalid duration {s}")))?;
        Ok(d)
    }

    /// Serialize a duration.
    ///
    /// # Errors
    ///
    /// If the serializer rejects the string.
    pub fn serialize<S>(duration: &super::Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let result = super::duration::to_string(duration);
        serializer.serialize_str(&result)
    }
}

/// `Duration` helpers
pub mod duration {
    use std::time::Duration;
    use thiserror::Error;

    /// An error that can occur when creating a `Duration`.
    #[derive(Error, Debug)]
    pub enum HmsError {
        /// Minutes overflow
        #[error("Minutes overflow")]
        MinutesOverflow,

        /// Seconds overflow
        #[error("Seconds overflow")]
        SecondsOverflow,

        /// Total seconds overflow
        #[error("Total seconds overflow")]
        TotalSecondsOverflow,
    }

    /// Create a new Duration from hours, minutes and seconds.
    ///
    /// # Errors
    ///
    /// If the hours, minutes or seconds are out of range.
    pub fn try_hms(hours: u64, minutes: u64, seconds: u64) -> Result<Duration, HmsError> {
        if minutes > 59 {
            return Err(HmsError::MinutesOverflow);
        }
        if seconds > 59 {
            return Err(HmsError::SecondsOverflow);
        }

        hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60))
            .and_then(|x| x.checked_add(seconds))
            .map(Duration::from_secs)
            .ok_or(HmsError::TotalSecondsOverflow)
    }

    /// Get the hours, minutes and seconds of a duration.
    #[must_use]
    pub const fn hms(duration: &Duration) -> (u64, u64, u64) {
        let secs = duration.as_secs();
        let (minutes, secs) = super::div_rem_u64(secs, 60);
        let (hours, minutes) = super::div_rem_u64(minutes, 60);
        (hours, minutes, secs)
    }

    /// Turn a duration into a string.
    #[must_use]
    pub fn to_string(duration: &Duration) -> String {
        let (hours, minutes, seconds) = hms(duration);
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }

    /// An error that can occur when parsing a `Duration`.
    #[derive(Error, Debug)]
    pub enum DurationParseError {
        /// Invalid duration
        #[error("Invalid duration")]
        InvalidDuration,
    }

    /// Turn a string into a `Duration`
    ///
    /// # Errors
    ///
    /// If the string is not a valid `Duration`.
    pub fn from_str(s: &str) -> Result<Duration, DurationParseError> {
        let splits = s.split(':').collect::<Vec<&str>>();

        let parse = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|_| DurationParseError::InvalidDuration)
        };

        match splits.as_slice() {
            [hours, minutes] => try_hms(parse(hours)?, parse(minutes)?, 0)
                .map_err(|_| DurationParseError::InvalidDuration),
            [hours, minutes, seconds] => {
                try_hms(parse(hours)?, parse(minutes)?, parse(seconds)?)
                    .map_err(|_| DurationParseError::InvalidDuration)
            }
            _ => Err(DurationParseError::InvalidDuration),
        }
    }
}

/// Macro to create a `Duration` from an integer constant.
///
/// Note: This macro only intended for static values where the values are known not to overflow.
#[macro_export]
macro_rules! unsafe_duration {
    (minutes: $minutes:expr) => {
        $crate::Duration::from_secs($minutes * 60)
    };
    (seconds: $seconds:expr) => {
        $crate::Duration::from_secs($seconds)
    };
}
