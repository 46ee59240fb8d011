//! Configuration loading
//!
//! `NodeConfig` is read once at startup from a TOML file. Secrets can be
//! kept out of the file and supplied through the environment instead:
//!
//! | Variable                       | Field                |
//! |--------------------------------|----------------------|
//! | `PLANTLINK_BROKER_HOST`        | `broker.host`        |
//! | `PLANTLINK_NETWORK_PASSPHRASE` | `network.passphrase` |
//! | `PLANTLINK_SESSION_USERNAME`   | `session.username`   |
//! | `PLANTLINK_SESSION_PASSWORD`   | `session.password`   |
//!
//! The result is validated before it is handed out.

use std::path::Path;

use log::{debug, info};
use plantlink_core::NodeConfig;

use crate::ConnectorError;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_VAR: &str = "PLANTLINK_CONFIG";

/// Configuration file used when nothing else is given
pub const DEFAULT_CONFIG_PATH: &str = "plantlink.toml";

/// Load, apply environment overrides, validate
pub fn load(path: impl AsRef<Path>) -> Result<NodeConfig, ConnectorError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut config = from_toml_str(&text)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    info!("config: loaded {}", path.display());
    Ok(config)
}

/// Parse TOML text without overrides or validation
pub fn from_toml_str(text: &str) -> Result<NodeConfig, ConnectorError> {
    Ok(toml::from_str(text)?)
}

/// Overwrite secret fields with values found through `lookup`
pub fn apply_overrides(config: &mut NodeConfig, lookup: impl Fn(&str) -> Option<String>) {
    let targets: [(&str, &mut String); 4] = [
        ("PLANTLINK_BROKER_HOST", &mut config.broker.host),
        ("PLANTLINK_NETWORK_PASSPHRASE", &mut config.network.passphrase),
        ("PLANTLINK_SESSION_USERNAME", &mut config.session.username),
        ("PLANTLINK_SESSION_PASSWORD", &mut config.session.password),
    ];

    for (key, field) in targets {
        if let Some(value) = lookup(key) {
            debug!("config: {} set from environment", key);
            *field = value;
        }
    }
}
