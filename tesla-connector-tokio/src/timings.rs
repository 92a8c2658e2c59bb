//! Tunable delays and thresholds for polling and commands.
use std::time::Duration;

use serde::Deserialize;
use tesla_connector_common::{datetime::with_duration, unsafe_duration};

/// Timings used by the devices and coordinators.
///
/// Every value can be overridden in the config file, durations are written as `HH:MM:SS`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// How often the coordinator refreshes a device.
    #[serde(with = "with_duration")]
    pub update_interval: Duration,

    /// Maximum time a single coordinator refresh may take.
    #[serde(with = "with_duration")]
    pub coordinator_timeout: Duration,

    /// Give up waking the car after this long.
    #[serde(with = "with_duration")]
    pub wake_up_timeout: Duration,

    /// Wake the car again before a command if the last wake up is older than this.
    #[serde(with = "with_duration")]
    pub wake_up_threshold: Duration,

    /// Time to wait between wake up requests.
    #[serde(with = "with_duration")]
    pub wake_up_poll_backoff: Duration,

    /// Maximum time a single command attempt may take.
    #[serde(with = "with_duration")]
    pub command_timeout: Duration,

    /// Total number of attempts for a command.
    pub command_retries: u32,

    /// Time to wait between command attempts.
    #[serde(with = "with_duration")]
    pub command_retry_backoff: Duration,

    /// Stop polling the car if no command was sent for this long.
    #[serde(with = "with_duration")]
    pub sleep_threshold: Duration,

    /// How long to wait for the charging state to change after a charge command.
    #[serde(with = "with_duration")]
    pub charging_state_wait: Duration,

    /// Poll interval while waiting for the charging state.
    #[serde(with = "with_duration")]
    pub charging_state_poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            update_interval: unsafe_duration!(seconds: 60),
            coordinator_timeout: unsafe_duration!(seconds: 10),
            wake_up_timeout: unsafe_duration!(seconds: 30),
            wake_up_threshold: unsafe_duration!(minutes: 30),
            wake_up_poll_backoff: unsafe_duration!(seconds: 2),
            command_timeout: unsafe_duration!(seconds: 10),
            command_retries: 3,
            command_retry_backoff: unsafe_duration!(seconds: 5),
            sleep_threshold: unsafe_duration!(minutes: 15),
            charging_state_wait: unsafe_duration!(seconds: 30),
            charging_state_poll_interval: unsafe_duration!(seconds: 5),
        }
    }
}
