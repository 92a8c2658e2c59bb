//! Vehicle telemetry as returned by the `vehicle_data` endpoint.

use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::lenient;

/// Vehicle state reported while the car is connected.
pub const ONLINE: &str = "online";

/// Vehicle state used when the car is asleep or can't be reached.
pub const OFFLINE: &str = "offline";

/// Is the car currently charging?
#[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
pub enum ChargingState {
    /// Nothing is happening.
    #[default]
    NotCharging,

    /// Charging is in progress
    Charging,

    /// Charging is complete
    Complete,

    /// Charging was suspended, e.g. by the wall connector.
    Suspended,

    /// Charging is not in progress and we are disconnected
    Disconnected,

    /// Charging is not in progress
    Stopped,

    /// Charging is starting
    Starting,

    /// Charger cable is connected but not getting power
    NoPower,

    /// Anything the API reports that we don't know about.
    #[serde(other)]
    Unknown,
}

impl ChargingState {
    /// Is the car currently charging?
    #[must_use]
    pub const fn is_charging(self) -> bool {
        matches!(self, ChargingState::Charging)
    }

    /// The name the API uses for this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChargingState::NotCharging => "NotCharging",
            ChargingState::Charging => "Charging",
            ChargingState::Complete => "Complete",
            ChargingState::Suspended => "Suspended",
            ChargingState::Disconnected => "Disconnected",
            ChargingState::Stopped => "Stopped",
            ChargingState::Starting => "Starting",
            ChargingState::NoPower => "NoPower",
            ChargingState::Unknown => "Unknown",
        }
    }
}

impl Display for ChargingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_CHARGER_VOLTAGE: u32 = 240;

fn charger_voltage<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    lenient::or_none(deserializer).map(|voltage| voltage.unwrap_or(DEFAULT_CHARGER_VOLTAGE))
}

/// Charging state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeState {
    /// Battery level in percent
    #[serde(deserialize_with = "lenient::or_default")]
    pub battery_level: u8,

    /// Estimated range with the current battery level.
    #[serde(deserialize_with = "lenient::or_default")]
    pub battery_range: f64,

    /// The requested charging current in amps.
    #[serde(deserialize_with = "lenient::or_default")]
    pub charge_amps: u32,

    #[serde(deserialize_with = "lenient::or_none")]
    charger_actual_current: Option<u32>,

    /// The current the car is requesting from the charger.
    #[serde(deserialize_with = "lenient::or_default")]
    pub charge_current_request: u32,

    /// The maximum current the car can request.
    #[serde(deserialize_with = "lenient::or_default")]
    pub charge_current_request_max: u32,

    /// The current charge limit in percent
    #[serde(deserialize_with = "lenient::or_default")]
    pub charge_limit_soc: u8,

    /// Estimated minutes until the charge limit is reached.
    #[serde(deserialize_with = "lenient::or_default")]
    pub minutes_to_full_charge: u32,

    /// The current charge state
    #[serde(deserialize_with = "lenient::or_default")]
    pub charging_state: ChargingState,

    /// Voltage supplied by the charger.
    #[serde(deserialize_with = "charger_voltage")]
    pub charger_voltage: u32,

    /// Energy added during the current charging session in kWh.
    #[serde(deserialize_with = "lenient::or_default")]
    pub charge_energy_added: f64,
}

impl Default for ChargeState {
    fn default() -> Self {
        Self {
            battery_level: 0,
            battery_range: 0.0,
            charge_amps: 0,
            charger_actual_current: None,
            charge_current_request: 0,
            charge_current_request_max: 0,
            charge_limit_soc: 0,
            minutes_to_full_charge: 0,
            charging_state: ChargingState::NotCharging,
            charger_voltage: DEFAULT_CHARGER_VOLTAGE,
            charge_energy_added: 0.0,
        }
    }
}

impl ChargeState {
    /// The current actually delivered by the charger.
    ///
    /// Falls back to the requested amps if the car didn't report it.
    #[must_use]
    pub fn charger_actual_current(&self) -> u32 {
        self.charger_actual_current.unwrap_or(self.charge_amps)
    }
}

/// Vehicle state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    /// Odometer reading.
    #[serde(deserialize_with = "lenient::or_default")]
    pub odometer: f64,

    /// Are the doors locked?
    #[serde(deserialize_with = "lenient::or_default")]
    pub locked: bool,
}

fn state_or_offline<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let state: Option<String> = lenient::or_none(deserializer)?;
    Ok(state.unwrap_or_else(|| OFFLINE.to_string()))
}

/// Decoded vehicle telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleData {
    /// Connection state, `online`, `asleep` or `offline`.
    #[serde(deserialize_with = "state_or_offline")]
    pub state: String,

    /// Charging information.
    #[serde(deserialize_with = "lenient::or_default")]
    pub charge_state: ChargeState,

    /// Doors, odometer and friends.
    #[serde(deserialize_with = "lenient::or_default")]
    pub vehicle_state: VehicleState,
}

impl Default for VehicleData {
    fn default() -> Self {
        Self {
            state: OFFLINE.to_string(),
            charge_state: ChargeState::default(),
            vehicle_state: VehicleState::default(),
        }
    }
}

impl VehicleData {
    /// Decode the unwrapped `vehicle_data` response.
    ///
    /// Never fails, anything missing gets a default value.
    #[must_use]
    pub fn decode(value: &Value) -> Self {
        lenient::decode(value)
    }

    /// Is the car offline as far as we know?
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.state == OFFLINE
    }

    /// Mark the car as offline without touching anything else.
    pub fn mark_offline(&mut self) {
        OFFLINE.clone_into(&mut self.state);
    }
}
