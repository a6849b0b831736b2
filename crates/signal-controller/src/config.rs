//! Signal Controller configuration.
//!
//! Configuration is loaded from environment variables; every field has a
//! sensible default so a bare `signal-controller` starts out of the box.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

use thiserror::Error;

/// Default signaling (WebSocket) bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default health/metrics endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default controller instance ID prefix.
pub const DEFAULT_CONTROLLER_ID_PREFIX: &str = "sc";

/// Signal Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signaling server bind address (default: "0.0.0.0:8000").
    pub bind_address: SocketAddr,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: SocketAddr,

    /// Unique identifier for this controller instance.
    pub controller_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a bind address does not
    /// parse as a socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a bind address does not
    /// parse as a socket address.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = parse_addr(vars, "SC_BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;
        let health_bind_address =
            parse_addr(vars, "SC_HEALTH_BIND_ADDRESS", DEFAULT_HEALTH_BIND_ADDRESS)?;

        let controller_id = vars.get("SC_ID").cloned().unwrap_or_else(|| {
            let hostname = vars
                .get("HOSTNAME")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_CONTROLLER_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            health_bind_address,
            controller_id,
        })
    }
}

fn parse_addr(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let raw = vars.get(name).map_or(default, String::as_str);
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("defaults should load");

        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(
            config.health_bind_address.to_string(),
            DEFAULT_HEALTH_BIND_ADDRESS
        );
        assert!(config.controller_id.starts_with("sc-"));
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("SC_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            (
                "SC_HEALTH_BIND_ADDRESS".to_string(),
                "127.0.0.1:9090".to_string(),
            ),
            ("SC_ID".to_string(), "sc-custom-001".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("config should load");
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.health_bind_address.to_string(), "127.0.0.1:9090");
        assert_eq!(config.controller_id, "sc-custom-001");
    }

    #[test]
    fn test_controller_id_includes_hostname() {
        let vars = HashMap::from([("HOSTNAME".to_string(), "node-7".to_string())]);

        let config = Config::from_vars(&vars).expect("config should load");
        assert!(config.controller_id.starts_with("sc-node-7-"));
    }

    #[test]
    fn test_invalid_bind_address_rejected() {
        let vars = HashMap::from([("SC_BIND_ADDRESS".to_string(), "not-an-addr".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { name, .. }) if name == "SC_BIND_ADDRESS")
        );
    }
}
