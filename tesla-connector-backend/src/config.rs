use envconfig::Envconfig;
use serde::Deserialize;
use serde_yml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tesla_connector_tokio::{
    services::{persistent_state, tesla::api},
    timings::Timings,
};
use thiserror::Error;

use crate::logging;

#[derive(Envconfig)]
pub struct Environment {
    #[envconfig(from = "CONFIG_FILE")]
    pub config_file: PathBuf,

    #[envconfig(from = "SECRETS_FILE")]
    pub secrets_file: Option<PathBuf>,
}

fn load_file(filename: &Path) -> Result<Value, Error> {
    let f = std::fs::File::open(filename).map_err(|e| Error::File(filename.to_path_buf(), e))?;
    let config: Value =
        serde_yml::from_reader(f).map_err(|e| Error::Yaml(filename.to_path_buf(), e))?;

    Ok(config)
}

/// Merge two yaml values, values in `b` win.
///
/// A null in `b` removes the key.
fn merge_yaml(a: Value, b: Value) -> Result<Value, Error> {
    match (a, b) {
        (Value::Mapping(mut a), Value::Mapping(b)) => {
            let mut r = Mapping::new();
            for (k, vb) in b {
                let va = a.remove(&k).unwrap_or(Value::Null);
                if !vb.is_null() {
                    r.insert(k, merge_yaml(va, vb)?);
                }
            }
            for (k, va) in a {
                if !va.is_null() {
                    r.insert(k, va);
                }
            }
            Ok(Value::Mapping(r))
        }
        (Value::Null, b) => Ok(b),
        (a, Value::Null) => Ok(a),
        (a, b) if std::mem::discriminant(&a) == std::mem::discriminant(&b) => Ok(b),
        (a, b) => Err(Error::Merge(
            serde_yml::to_string(&a).unwrap_or_default(),
            serde_yml::to_string(&b).unwrap_or_default(),
        )),
    }
}

impl Environment {
    /// Load the config file, with secrets merged over the top.
    ///
    /// # Errors
    ///
    /// If a file can't be read, parsed or merged.
    pub fn config(&self) -> Result<Config, Error> {
        let config = load_file(&self.config_file)?;

        let config = if let Some(secrets_file) = &self.secrets_file {
            let secrets = load_file(secrets_file)?;
            merge_yaml(config, secrets)?
        } else {
            config
        };

        let config: Config = serde_yml::from_value(config)
            .map_err(|e| Error::Yaml(self.config_file.clone(), e))?;

        Ok(config)
    }

    /// Load the environment from the environment variables.
    ///
    /// # Errors
    ///
    /// If `CONFIG_FILE` is not set.
    pub fn load() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }
}

#[derive(Deserialize)]
pub struct TeslaConfig {
    pub vin: String,
    pub wall_connector_id: Option<String>,
    pub refresh_token: String,
    #[serde(flatten)]
    pub api: api::Config,
}

impl std::fmt::Debug for TeslaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeslaConfig")
            .field("vin", &self.vin)
            .field("wall_connector_id", &self.wall_connector_id)
            .field("refresh_token", &"********")
            .field("api", &self.api)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub tesla: TeslaConfig,
    #[serde(default)]
    pub timings: Timings,
    pub persistent_state: persistent_state::Config,
    #[serde(default)]
    pub logging: logging::Config,
}

/// An error loading the Config
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading the file
    #[error("Error reading file {0}: {1}")]
    File(PathBuf, std::io::Error),

    /// Error parsing the file
    #[error("Error parsing file {0}: {1}")]
    Yaml(PathBuf, serde_yml::Error),

    /// Error merging the files
    #[error("Can't merge {0} with {1}")]
    Merge(String, String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use std::{io::Write, time::Duration};

    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yml::from_str(text).unwrap()
    }

    fn write(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const CONFIG: &str = r"
tesla:
  vin: 5YJ3E1EA7KF000001
  wall_connector_id: '1234'
  refresh_token: null
timings:
  update_interval: '00:02:00'
  command_retries: 5
persistent_state:
  state_path: /var/lib/tesla-connector
";

    const SECRETS: &str = r"
tesla:
  refresh_token: secret-token
";

    #[test]
    fn test_merge_yaml_nested() {
        let merged = merge_yaml(yaml(CONFIG), yaml(SECRETS)).unwrap();
        let tesla = &merged["tesla"];

        assert_eq!(tesla["refresh_token"], yaml("secret-token"));
        assert_eq!(tesla["vin"], yaml("5YJ3E1EA7KF000001"));
        assert_eq!(tesla["wall_connector_id"], yaml("'1234'"));
    }

    #[rstest]
    #[case("a: 1", "a: 2", "a: 2")]
    #[case("a: 1", "b: 2", "{a: 1, b: 2}")]
    #[case("a: 1", "a: null", "{}")]
    #[case("{a: 1, b: 2}", "a: ~", "b: 2")]
    #[case("a: [1, 2]", "a: [3]", "a: [3]")]
    #[case("a: ~", "a: {b: 1}", "a: {b: 1}")]
    fn test_merge_yaml(#[case] a: &str, #[case] b: &str, #[case] expected: &str) {
        assert_eq!(merge_yaml(yaml(a), yaml(b)).unwrap(), yaml(expected));
    }

    #[test]
    fn test_merge_yaml_mismatch() {
        let err = merge_yaml(yaml("a: {b: 1}"), yaml("a: 2")).unwrap_err();
        assert!(matches!(err, Error::Merge(_, _)));
    }

    #[test]
    fn test_config_with_secrets() {
        let config_file = write(CONFIG);
        let secrets_file = write(SECRETS);
        let env = Environment {
            config_file: config_file.path().to_path_buf(),
            secrets_file: Some(secrets_file.path().to_path_buf()),
        };

        let config = env.config().unwrap();

        assert_eq!(config.tesla.vin, "5YJ3E1EA7KF000001");
        assert_eq!(config.tesla.wall_connector_id.as_deref(), Some("1234"));
        assert_eq!(config.tesla.refresh_token, "secret-token");
        assert_eq!(config.tesla.api.client_id, api::Config::default().client_id);
        assert_eq!(config.timings.update_interval, Duration::from_secs(120));
        assert_eq!(config.timings.command_retries, 5);
        assert_eq!(config.timings.command_timeout, Duration::from_secs(10));
        assert_eq!(
            config.persistent_state.state_path,
            PathBuf::from("/var/lib/tesla-connector")
        );
        assert!(!format!("{:?}", config.tesla).contains("secret-token"));
    }

    #[test]
    fn test_config_without_secrets() {
        let config_file = write(CONFIG);
        let env = Environment {
            config_file: config_file.path().to_path_buf(),
            secrets_file: None,
        };

        let err = env.config().unwrap_err();
        assert!(matches!(err, Error::Yaml(_, _)));
    }

    #[test]
    fn test_missing_file() {
        let env = Environment {
            config_file: PathBuf::from("/nonexistent/config.yaml"),
            secrets_file: None,
        };

        let err = env.config().unwrap_err();
        assert!(matches!(err, Error::File(_, _)));
    }
}
