//! Services used by the devices.

pub mod persistent_state;
pub mod tesla;
