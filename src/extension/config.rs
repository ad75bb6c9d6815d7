//! Configuration of the expvar extension.

use serde::{Deserialize, Serialize};

use crate::confighttp::{BindError, ServerConfig};

/// Default port of the debug endpoint.
pub const DEFAULT_PORT: u16 = 27777;

/// Expvar extension configuration.
///
/// The server settings are flattened, so in TOML the endpoint sits directly
/// in the extension table:
///
/// ```toml
/// [expvar]
/// endpoint = "0.0.0.0:27777"
///
/// [expvar.auth]
/// authenticator = "bearertokenauth/ops"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::new(format!("0.0.0.0:{}", DEFAULT_PORT)),
        }
    }
}

impl Config {
    /// Creates a config serving on `endpoint` without authentication.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::new(endpoint),
        }
    }

    /// Checks the endpoint shape. Authenticator references are only
    /// resolvable at start time.
    pub fn validate(&self) -> Result<(), BindError> {
        self.server.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let config = Config::default();
        assert_eq!(config.server.endpoint, "0.0.0.0:27777");
        assert!(config.server.auth.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flattened_toml() {
        let config: Config = toml::from_str(
            r#"
            endpoint = "127.0.0.1:9999"

            [auth]
            authenticator = "bearertokenauth"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.endpoint, "127.0.0.1:9999");
        assert_eq!(
            config.server.auth.map(|a| a.authenticator.to_string()),
            Some("bearertokenauth".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_scheme() {
        assert!(Config::with_endpoint("invalid://endpoint").validate().is_err());
    }
}
