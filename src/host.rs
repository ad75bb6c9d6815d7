//! The host side of the extension contract: a registry of running
//! extensions that other extensions look authenticators up in.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::component::ComponentId;
use crate::confighttp::ConfigError;

/// An extension as seen through the host registry.
#[derive(Debug, Clone)]
pub enum RegisteredExtension {
    /// An extension that can authenticate server requests.
    ServerAuthenticator(Arc<dyn Authenticator>),
    /// Any other extension; only its kind is known.
    Other {
        /// Human readable kind, used in diagnostics.
        kind: String,
    },
}

/// Supplies shared registries to extensions while they start.
pub trait Host: Send + Sync {
    /// Looks up an extension by ID.
    fn extension(&self, id: &ComponentId) -> Option<RegisteredExtension>;

    /// Resolves `id` to a server authenticator.
    fn authenticator(&self, id: &ComponentId) -> Result<Arc<dyn Authenticator>, ConfigError> {
        match self.extension(id) {
            Some(RegisteredExtension::ServerAuthenticator(authenticator)) => Ok(authenticator),
            Some(RegisteredExtension::Other { .. }) => {
                Err(ConfigError::NotServerAuthenticator(id.clone()))
            }
            None => Err(ConfigError::AuthenticatorNotFound(id.clone())),
        }
    }
}

/// In-memory [`Host`] backed by a map of IDs.
#[derive(Debug, Default, Clone)]
pub struct ExtensionRegistry {
    extensions: HashMap<ComponentId, RegisteredExtension>,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a server authenticator, replacing any previous entry.
    pub fn register_authenticator(&mut self, id: ComponentId, authenticator: Arc<dyn Authenticator>) {
        tracing::debug!("registered authenticator {}", id);
        self.extensions
            .insert(id, RegisteredExtension::ServerAuthenticator(authenticator));
    }

    /// Registers an extension that is not an authenticator.
    pub fn register_other(&mut self, id: ComponentId) {
        let kind = id.kind().to_string();
        self.extensions
            .insert(id, RegisteredExtension::Other { kind });
    }

    /// Returns the registered IDs in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self.extensions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Host for ExtensionRegistry {
    fn extension(&self, id: &ComponentId) -> Option<RegisteredExtension> {
        self.extensions.get(id).cloned()
    }
}
