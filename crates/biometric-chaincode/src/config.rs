use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where `deleteBiometricRecord` is dispatched.
///
/// Deployed ledgers route it through the upsert path, so `Upsert` stays the
/// default. `DeleteHandler` is an opt-in deviation that actually removes the
/// key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteRouting {
    #[default]
    Upsert,
    DeleteHandler,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Chaincode settings, loadable from a JSON file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaincodeConfig {
    /// Value of the `module` field on every log line.
    pub module: String,
    pub delete_routing: DeleteRouting,
    pub log_format: LogFormat,
}

impl Default for ChaincodeConfig {
    fn default() -> Self {
        Self {
            module: "biometric-chaincode".to_string(),
            delete_routing: DeleteRouting::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl ChaincodeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: ChaincodeConfig =
            serde_json::from_str(r#"{"delete_routing":"delete_handler"}"#).unwrap();
        assert_eq!(cfg.delete_routing, DeleteRouting::DeleteHandler);
        assert_eq!(cfg.module, "biometric-chaincode");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ChaincodeConfig::from_file("/nonexistent/biometric.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unknown_routing_is_rejected() {
        let res: Result<ChaincodeConfig, _> =
            serde_json::from_str(r#"{"delete_routing":"drop_everything"}"#);
        assert!(res.is_err());
    }
}
