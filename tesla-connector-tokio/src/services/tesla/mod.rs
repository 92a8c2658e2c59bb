//! Tesla owner API.

pub mod api;
pub mod token;
