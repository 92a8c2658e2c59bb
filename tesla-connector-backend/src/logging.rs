use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter,
};

fn default_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Default filter, used if `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Error initializing logging: {0}")]
    Init(#[from] TryInitError),
}

fn filter(config: &Config) -> Result<EnvFilter, Error> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.is_empty() => EnvFilter::try_new(env)?,
        _ => EnvFilter::try_new(&config.filter)?,
    };

    // The http client is noisy at debug level.
    Ok(filter
        .add_directive("hyper=error".parse()?)
        .add_directive("reqwest=error".parse()?))
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// If the filter is invalid or a subscriber is already installed.
pub fn init_tracing_subscriber(config: &Config) -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(filter(config)?)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
