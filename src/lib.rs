//! expvard
//!
//! An HTTP debug extension that serves expvar-style dumps of published
//! runtime variables, optionally behind bearer token authentication.
//!
//! # Architecture
//!
//! - **Extension Module**: the start/shutdown lifecycle around the server
//! - **Expvar Module**: published variables and the dump handler
//! - **Confighttp Module**: endpoint binding, middleware and server handle
//! - **Host / Auth Modules**: authenticator registry and request checks
//!
//! # Usage
//!
//! ```no_run
//! use expvard::{Context, Extension, ExtensionRegistry, Factory, TelemetrySettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let id = expvard::ComponentId::new(Factory::TYPE)?;
//! let factory = Factory;
//! let mut ext = factory.create(TelemetrySettings::new(&id), factory.create_default_config());
//! ext.start(&Context::background(), &ExtensionRegistry::new()).await?;
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod auth;
pub mod component;
pub mod confighttp;
pub mod context;
pub mod expvar;
pub mod extension;
pub mod host;
pub mod logging;
pub mod settings;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types
pub use auth::{Authenticator, BearerTokenAuthenticator};
pub use component::{ComponentId, Extension, TelemetrySettings};
pub use confighttp::{BindError, ConfigError, ServerConfig};
pub use context::{CancelHandle, Context, ContextError};
pub use extension::{ExpvarExtension, ExtensionError, Factory};
pub use host::{ExtensionRegistry, Host};
pub use settings::Settings;
