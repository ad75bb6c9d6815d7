//! Settings file for the `expvard` binary.
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [expvar]
//! endpoint = "0.0.0.0:27777"
//!
//! [expvar.auth]
//! authenticator = "bearertokenauth/ops"
//!
//! [authenticators."bearertokenauth/ops"]
//! token_file = "/etc/expvard/token"
//! ```
//!
//! Every section is optional.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{BearerTokenAuthenticator, generate_token};
use crate::component::{ComponentId, ComponentIdError};
use crate::confighttp::BindError;
use crate::extension::Config;
use crate::host::ExtensionRegistry;
use crate::logging::LogConfig;

/// Settings file errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid TOML for this schema.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// An authenticator table key is not a valid component ID.
    #[error("invalid authenticator id: {0}")]
    InvalidId(#[from] ComponentIdError),

    /// The expvar endpoint is malformed.
    #[error("invalid expvar endpoint: {0}")]
    Endpoint(#[from] BindError),

    /// An authenticator token could not be loaded.
    #[error("authenticator \"{id}\": {reason}")]
    Token { id: String, reason: String },
}

/// Bearer token authenticator settings.
///
/// With neither field set a random token is generated at startup and logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BearerTokenSettings {
    /// Inline token.
    pub token: Option<String>,
    /// File whose trimmed content is the token.
    pub token_file: Option<PathBuf>,
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logging.
    pub log: LogConfig,
    /// The expvar extension.
    pub expvar: Config,
    /// Bearer token authenticators keyed by component ID.
    pub authenticators: BTreeMap<String, BearerTokenSettings>,
}

impl Settings {
    /// Parses settings from TOML.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads settings from `path`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Loads settings from [`default_path`], or defaults if it does not exist.
    pub fn load_default() -> Result<Self, SettingsError> {
        match default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks everything that can be checked without binding or starting.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.expvar.validate()?;
        for (id, auth) in &self.authenticators {
            id.parse::<ComponentId>()?;
            if auth.token.is_some() && auth.token_file.is_some() {
                return Err(SettingsError::Token {
                    id: id.clone(),
                    reason: "set either token or token_file, not both".into(),
                });
            }
        }
        Ok(())
    }

    /// Builds a host registry holding one bearer token authenticator per
    /// `[authenticators]` entry.
    pub fn build_registry(&self) -> Result<ExtensionRegistry, SettingsError> {
        let mut registry = ExtensionRegistry::new();
        for (key, auth) in &self.authenticators {
            let id: ComponentId = key.parse()?;
            let token = resolve_token(&id, auth)?;
            registry.register_authenticator(id, Arc::new(BearerTokenAuthenticator::new(token)));
        }
        Ok(registry)
    }
}

fn resolve_token(id: &ComponentId, auth: &BearerTokenSettings) -> Result<String, SettingsError> {
    let token_error = |reason: String| SettingsError::Token {
        id: id.to_string(),
        reason,
    };

    let token = match (&auth.token, &auth.token_file) {
        (Some(token), _) => token.trim().to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|e| token_error(format!("failed to read {}: {}", path.display(), e)))?
            .trim()
            .to_string(),
        (None, None) => {
            let token = generate_token();
            tracing::info!("Generated bearer token for {}: {}", id, token);
            return Ok(token);
        }
    };

    if token.is_empty() {
        return Err(token_error("token is empty".into()));
    }
    Ok(token)
}

/// Returns the default settings path (`<config dir>/expvard/config.toml`).
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("expvard").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.expvar.server.endpoint, "0.0.0.0:27777");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_expvar_section_requires_endpoint() {
        assert!(Settings::from_toml("[expvar]\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_authenticator_id() {
        let settings =
            Settings::from_toml("[authenticators.\"not valid\"]\ntoken = \"x\"\n").unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidId(_))
        ));
    }

    #[test]
    fn test_validate_rejects_both_token_sources() {
        let settings = Settings::from_toml(
            "[authenticators.bearertokenauth]\ntoken = \"x\"\ntoken_file = \"/tmp/t\"\n",
        )
        .unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Token { .. })
        ));
    }

    #[test]
    fn test_build_registry_inline_and_generated() {
        let settings = Settings::from_toml(
            r#"
            [authenticators."bearertokenauth/inline"]
            token = "s3cret"

            [authenticators."bearertokenauth/generated"]
            "#,
        )
        .unwrap();

        let registry = settings.build_registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(
            registry
                .authenticator(&"bearertokenauth/generated".parse().unwrap())
                .is_ok()
        );
    }

    #[test]
    fn test_empty_inline_token_is_rejected() {
        let settings =
            Settings::from_toml("[authenticators.bearertokenauth]\ntoken = \"  \"\n").unwrap();
        assert!(matches!(
            settings.build_registry(),
            Err(SettingsError::Token { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        if let Some(path) = default_path() {
            assert!(path.ends_with("expvard/config.toml"));
        }
    }
}
