//! Devices that can be polled and controlled.
use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tesla_connector_common::{datetime::duration, vehicle::ChargingState};
use thiserror::Error;

use crate::services::tesla::api::{self, Command};

pub mod vehicle;
pub mod wall_connector;

/// A stable identifier for a device.
///
/// The VIN for a vehicle, the energy site id for a wall connector.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something went wrong talking to a device.
#[derive(Debug, Error)]
pub enum Error {
    /// The API call failed.
    #[error("{0}")]
    Api(#[from] api::Error),

    /// A command didn't complete in time.
    #[error("Command {command} timed out after {}", duration::to_string(.duration))]
    CommandTimeout {
        /// The command sent.
        command: Command,
        /// How long we waited.
        duration: Duration,
    },

    /// The vehicle answered but refused the command.
    #[error("Command {command} failed for vehicle vin: {vin} REASON: {reason}")]
    CommandRejected {
        /// The vehicle.
        vin: String,
        /// The command sent.
        command: Command,
        /// The reason given by the vehicle.
        reason: String,
    },

    /// The vehicle didn't come online in time.
    #[error("Vehicle did not wake up after {}", duration::to_string(.0))]
    WakeUpTimeout(Duration),

    /// The vehicle didn't reach the expected charging state in time.
    #[error("Vehicle did not reach charging state {0} in time")]
    StateNotReached(ChargingState),
}

impl Error {
    /// Was the refresh token rejected?
    ///
    /// This needs the user to log in again, retrying won't help.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Api(api::Error::TokenInvalid))
    }

    /// The HTTP status of the underlying API failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Api(err) => err.status(),
            _ => None,
        }
    }
}

/// A device that can be refreshed by a coordinator.
#[async_trait]
pub trait Device: Send + Sync + 'static {
    /// The data published for this device.
    type Data: Clone + Debug + Send + Sync + 'static;

    /// The stable identifier of this device.
    fn device_id(&self) -> &DeviceId;

    /// The last snapshot, without waiting for any operation in progress.
    fn current_data(&self) -> Option<Arc<Self::Data>>;

    /// Refresh the data, following the device's own polling policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the data could not be retrieved.
    async fn fetch(&self) -> Result<Option<Arc<Self::Data>>, Error>;
}
