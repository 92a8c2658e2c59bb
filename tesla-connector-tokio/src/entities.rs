//! Entities shown to the user for each device.
//!
//! Every entity is described by a static `Description`. The description says where
//! the value comes from, how to show it, and what it controls.
use std::fmt::{self, Display};

use tesla_connector_common::{vehicle::VehicleData, wall_connector::WallConnectorData};
use thiserror::Error;
use tracing::info;

use crate::{
    coordinator::Handle,
    devices::{self, vehicle::Vehicle, DeviceId},
};

/// Prefix of every unique id.
pub const DOMAIN: &str = "tesla_connector";

/// What kind of entity this is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capability {
    /// Read only value.
    Sensor,

    /// Read only on/off value, shown with a label.
    BinarySensor {
        /// Label when on.
        on_label: &'static str,
        /// Label when off.
        off_label: &'static str,
    },

    /// On/off value that can be changed.
    Switch,

    /// Number that can be changed within a range.
    Number {
        /// Smallest allowed value.
        min: f64,
        /// Largest allowed value.
        max: f64,
        /// Step between values.
        step: f64,
    },
}

impl Capability {
    /// The platform name of the capability.
    #[must_use]
    pub const fn platform(self) -> &'static str {
        match self {
            Capability::Sensor => "sensor",
            Capability::BinarySensor { .. } => "binary_sensor",
            Capability::Switch => "switch",
            Capability::Number { .. } => "number",
        }
    }
}

/// The value of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    /// A number.
    Number(f64),
    /// Some text.
    Text(String),
    /// On or off.
    Flag(bool),
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Number(value) => write!(f, "{value}"),
            State::Text(value) => f.write_str(value),
            State::Flag(true) => f.write_str("on"),
            State::Flag(false) => f.write_str("off"),
        }
    }
}

/// Get the value of an entity from the device data.
pub trait Field: Copy {
    /// The device data.
    type Data;

    /// Get the value.
    fn value(self, data: &Self::Data) -> State;
}

/// Values available from a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleField {
    /// `charge_state.battery_level`
    BatteryLevel,
    /// `charge_state.battery_range`
    BatteryRange,
    /// `charge_state.charge_amps`
    ChargeAmps,
    /// `charge_state.charge_current_request`
    ChargeCurrentRequest,
    /// `charge_state.minutes_to_full_charge`
    MinutesToFullCharge,
    /// `vehicle_state.odometer`
    Odometer,
    /// `charge_state.charging_state`
    ChargingState,
    /// `charge_state.charge_limit_soc`
    ChargeLimitSoc,
    /// `charge_state.charger_voltage`
    ChargerVoltage,
    /// `charge_state.charge_energy_added`
    ChargeEnergyAdded,
    /// `state`
    State,
    /// `vehicle_state.locked`
    Locked,
    /// Is `charge_state.charging_state` equal to `Charging`?
    IsCharging,
}

impl Field for VehicleField {
    type Data = VehicleData;

    fn value(self, data: &VehicleData) -> State {
        let charge = &data.charge_state;
        match self {
            VehicleField::BatteryLevel => State::Number(f64::from(charge.battery_level)),
            VehicleField::BatteryRange => State::Number(charge.battery_range),
            VehicleField::ChargeAmps => State::Number(f64::from(charge.charge_amps)),
            VehicleField::ChargeCurrentRequest => {
                State::Number(f64::from(charge.charge_current_request))
            }
            VehicleField::MinutesToFullCharge => {
                State::Number(f64::from(charge.minutes_to_full_charge))
            }
            VehicleField::Odometer => State::Number(data.vehicle_state.odometer),
            VehicleField::ChargingState => State::Text(charge.charging_state.to_string()),
            VehicleField::ChargeLimitSoc => State::Number(f64::from(charge.charge_limit_soc)),
            VehicleField::ChargerVoltage => State::Number(f64::from(charge.charger_voltage)),
            VehicleField::ChargeEnergyAdded => State::Number(charge.charge_energy_added),
            VehicleField::State => State::Text(data.state.clone()),
            VehicleField::Locked => State::Flag(data.vehicle_state.locked),
            VehicleField::IsCharging => State::Flag(charge.charging_state.is_charging()),
        }
    }
}

/// Values available from a wall connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallConnectorField {
    /// VIN of the vehicle plugged in.
    Vin,
    /// Power delivered during the session.
    WallConnectorPower,
}

impl Field for WallConnectorField {
    type Data = WallConnectorData;

    fn value(self, data: &WallConnectorData) -> State {
        match self {
            WallConnectorField::Vin => State::Text(data.vin.clone()),
            WallConnectorField::WallConnectorPower => State::Number(data.wall_connector_power),
        }
    }
}

/// What changing an entity does to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// On locks, off unlocks.
    Lock,
    /// On starts charging, off stops charging.
    Charging,
    /// Set the charge limit.
    ChargeLimit,
    /// Set the charging current.
    ChargeAmps,
}

/// Describes one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Description<F> {
    /// Key, unique for the capability.
    pub key: &'static str,
    /// Name shown to the user.
    pub name: &'static str,
    /// Unit of measurement.
    pub unit: Option<&'static str>,
    /// Device class.
    pub device_class: Option<&'static str>,
    /// Icon.
    pub icon: Option<&'static str>,
    /// Number of decimal places to show.
    pub precision: Option<u8>,
    /// What kind of entity this is.
    pub capability: Capability,
    /// Where the value comes from.
    pub field: F,
    /// What changing the entity does.
    pub control: Option<Control>,
}

const fn sensor<F>(
    key: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    icon: &'static str,
    field: F,
) -> Description<F> {
    Description {
        key,
        name,
        unit,
        device_class,
        icon: Some(icon),
        precision: None,
        capability: Capability::Sensor,
        field,
        control: None,
    }
}

/// Every entity of a vehicle.
pub static VEHICLE_ENTITIES: &[Description<VehicleField>] = &[
    sensor(
        "battery_level",
        "Battery level",
        Some("%"),
        Some("battery"),
        "mdi:battery",
        VehicleField::BatteryLevel,
    ),
    Description {
        precision: Some(1),
        ..sensor(
            "battery_range",
            "Battery range",
            Some("km"),
            Some("distance"),
            "mdi:car-electric",
            VehicleField::BatteryRange,
        )
    },
    sensor(
        "charge_amps",
        "Requested charging current",
        Some("A"),
        Some("current"),
        "mdi:flash",
        VehicleField::ChargeAmps,
    ),
    sensor(
        "charge_current",
        "Charging current",
        Some("A"),
        Some("current"),
        "mdi:flash",
        VehicleField::ChargeCurrentRequest,
    ),
    sensor(
        "minutes_to_full_charge",
        "Minutes to full charge",
        Some("min"),
        Some("duration"),
        "mdi:clock-outline",
        VehicleField::MinutesToFullCharge,
    ),
    Description {
        precision: Some(0),
        ..sensor(
            "odometer",
            "Odometer",
            Some("km"),
            Some("distance"),
            "mdi:counter",
            VehicleField::Odometer,
        )
    },
    sensor(
        "charging_state",
        "Charging state",
        None,
        None,
        "mdi:ev-plug-ccs2",
        VehicleField::ChargingState,
    ),
    sensor(
        "charge_limit_soc",
        "Charge limit",
        Some("%"),
        Some("battery"),
        "mdi:battery-charging-80",
        VehicleField::ChargeLimitSoc,
    ),
    sensor(
        "charger_voltage",
        "Charger voltage",
        Some("V"),
        Some("voltage"),
        "mdi:flash",
        VehicleField::ChargerVoltage,
    ),
    Description {
        precision: Some(2),
        ..sensor(
            "charge_energy_added",
            "Energy added",
            Some("kWh"),
            Some("energy"),
            "mdi:battery-plus",
            VehicleField::ChargeEnergyAdded,
        )
    },
    sensor(
        "state",
        "Vehicle state",
        None,
        None,
        "mdi:car-connected",
        VehicleField::State,
    ),
    Description {
        key: "locked",
        name: "Vehicle locked",
        unit: None,
        device_class: Some("lock"),
        icon: None,
        precision: None,
        capability: Capability::BinarySensor {
            on_label: "Locked",
            off_label: "Unlocked",
        },
        field: VehicleField::Locked,
        control: None,
    },
    Description {
        key: "locked",
        name: "Vehicle locked",
        unit: None,
        device_class: Some("switch"),
        icon: Some("mdi:lock"),
        precision: None,
        capability: Capability::Switch,
        field: VehicleField::Locked,
        control: Some(Control::Lock),
    },
    Description {
        key: "charging_state",
        name: "Vehicle charging",
        unit: None,
        device_class: Some("switch"),
        icon: Some("mdi:car-electric"),
        precision: None,
        capability: Capability::Switch,
        field: VehicleField::IsCharging,
        control: Some(Control::Charging),
    },
    Description {
        key: "charge_limit_soc",
        name: "Charge limit",
        unit: Some("%"),
        device_class: Some("battery"),
        icon: Some("mdi:battery"),
        precision: None,
        capability: Capability::Number {
            min: 0.0,
            max: 100.0,
            step: 5.0,
        },
        field: VehicleField::ChargeLimitSoc,
        control: Some(Control::ChargeLimit),
    },
    Description {
        key: "charge_amps",
        name: "Charging current",
        unit: Some("A"),
        device_class: Some("current"),
        icon: Some("mdi:flash"),
        precision: None,
        capability: Capability::Number {
            min: 1.0,
            max: 32.0,
            step: 1.0,
        },
        field: VehicleField::ChargeAmps,
        control: Some(Control::ChargeAmps),
    },
];

/// Every entity of a wall connector.
pub static WALL_CONNECTOR_ENTITIES: &[Description<WallConnectorField>] = &[
    sensor(
        "vin",
        "Connected VIN",
        None,
        None,
        "mdi:car-key",
        WallConnectorField::Vin,
    ),
    sensor(
        "wall_connector_power",
        "Session energy",
        Some("Wh"),
        Some("energy"),
        "mdi:car-electric",
        WallConnectorField::WallConnectorPower,
    ),
];

/// The rendered state of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    /// Unique id, stable across restarts.
    pub unique_id: String,
    /// Name shown to the user.
    pub name: &'static str,
    /// Unit of measurement.
    pub unit: Option<&'static str>,
    /// What kind of entity this is.
    pub capability: Capability,
    /// The value, `None` if there is no data yet.
    pub state: Option<State>,
}

impl Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.capability.platform(), self.unique_id)?;
        match (&self.state, self.unit) {
            (Some(state), Some(unit)) => write!(f, "{state} {unit}"),
            (Some(state), None) => write!(f, "{state}"),
            (None, _) => f.write_str("unknown"),
        }
    }
}

fn round(value: f64, precision: u8) -> f64 {
    let factor = 10f64.powi(i32::from(precision));
    (value * factor).round() / factor
}

/// Render an entity for a device.
#[must_use]
pub fn render<F: Field>(
    device_id: &DeviceId,
    description: &Description<F>,
    data: Option<&F::Data>,
) -> EntityState {
    let state = data
        .map(|data| description.field.value(data))
        .map(|state| match (description.capability, state) {
            (Capability::BinarySensor { on_label, off_label }, State::Flag(on)) => {
                State::Text(if on { on_label } else { off_label }.to_string())
            }
            (_, State::Number(value)) => {
                State::Number(description.precision.map_or(value, |p| round(value, p)))
            }
            (_, state) => state,
        });

    EntityState {
        unique_id: format!("{DOMAIN}_{device_id}_{}", description.key),
        name: description.name,
        unit: description.unit,
        capability: description.capability,
        state,
    }
}

/// Something the user asked an entity to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Turn a switch on.
    TurnOn,
    /// Turn a switch off.
    TurnOff,
    /// Set a number.
    SetValue(f64),
}

/// An entity action could not be done.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity can't be changed.
    #[error("Entity {0} can't be changed")]
    NotControllable(&'static str),

    /// The entity doesn't support this action.
    #[error("Entity {key} doesn't support {action:?}")]
    UnsupportedAction {
        /// The entity.
        key: &'static str,
        /// The action requested.
        action: Action,
    },

    /// The value is outside the allowed range.
    #[error("Value {value} for {key} is not between {min} and {max}")]
    OutOfRange {
        /// The entity.
        key: &'static str,
        /// The value requested.
        value: f64,
        /// Smallest allowed value.
        min: f64,
        /// Largest allowed value.
        max: f64,
    },

    /// The vehicle failed to do it.
    #[error("{0}")]
    Device(#[from] devices::Error),
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn checked_value(description: &Description<VehicleField>, value: f64) -> Result<u8, Error> {
    let (min, max) = match description.capability {
        Capability::Number { min, max, .. } => (min, max),
        _ => (0.0, f64::from(u8::MAX)),
    };

    if !value.is_finite() || value < min || value > max {
        return Err(Error::OutOfRange {
            key: description.key,
            value,
            min,
            max,
        });
    }

    // In range, so this fits.
    Ok(value.round() as u8)
}

/// Change a vehicle entity, then ask the vehicle's coordinator to refresh.
///
/// # Errors
///
/// Returns an error if the entity can't do the action, the value is out of range, or
/// the vehicle command failed.
pub async fn perform(
    vehicle: &Vehicle,
    coordinator: &Handle,
    description: &Description<VehicleField>,
    action: Action,
) -> Result<(), Error> {
    let key = description.key;
    let control = description.control.ok_or(Error::NotControllable(key))?;
    info!("{}: {key} {action:?}", vehicle.vin());

    match (control, action) {
        (Control::Lock, Action::TurnOn) => vehicle.lock_doors().await?,
        (Control::Lock, Action::TurnOff) => vehicle.unlock_doors().await?,
        (Control::Charging, Action::TurnOn) => vehicle.start_charge().await?,
        (Control::Charging, Action::TurnOff) => vehicle.stop_charge().await?,
        (Control::ChargeLimit, Action::SetValue(value)) => {
            let percent = checked_value(description, value)?;
            vehicle.set_charge_limit(percent).await?;
        }
        (Control::ChargeAmps, Action::SetValue(value)) => {
            let amps = checked_value(description, value)?;
            vehicle.set_charge_amps(amps).await?;
        }
        (_, action) => return Err(Error::UnsupportedAction { key, action }),
    }

    coordinator.refresh().await;
    Ok(())
}

/// Find a vehicle entity by capability and key.
#[must_use]
pub fn find_vehicle_entity(
    platform: &str,
    key: &str,
) -> Option<&'static Description<VehicleField>> {
    VEHICLE_ENTITIES
        .iter()
        .find(|description| description.capability.platform() == platform && description.key == key)
}
