//! Types shared between the tesla connector library and the backend.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::use_self)]

pub mod datetime;
pub mod lenient;
pub mod vehicle;
pub mod wall_connector;

pub use std::time::Duration;
