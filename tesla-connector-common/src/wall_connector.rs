//! Wall connector live status as returned by the `charger_live_status` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

/// Decoded status of the first wall connector of an energy site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConnectorData {
    /// VIN of the vehicle that is plugged in, empty if none.
    #[serde(deserialize_with = "lenient::or_default")]
    pub vin: String,

    /// Power delivered during the current session.
    #[serde(deserialize_with = "lenient::or_default")]
    pub wall_connector_power: f64,
}

impl WallConnectorData {
    /// Decode the unwrapped `charger_live_status` response.
    ///
    /// Only the first wall connector is used. Never fails.
    #[must_use]
    pub fn decode(value: &Value) -> Self {
        value
            .get("wall_connectors")
            .and_then(Value::as_array)
            .and_then(|connectors| connectors.first())
            .map(lenient::decode)
            .unwrap_or_default()
    }

    /// Is a vehicle plugged in?
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.vin.is_empty()
    }
}
