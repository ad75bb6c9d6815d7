//! The expvar extension.
//!
//! Serves the process-wide variable dump ([`crate::expvar`]) over HTTP while
//! running. The extension is a two-state machine: stopped (no server handle)
//! and running (server handle present).
//!
//! ```no_run
//! use expvard::{
//!     ComponentId, Context, Extension, ExtensionRegistry, TelemetrySettings,
//!     extension::{Config, ExpvarExtension},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let id = ComponentId::new("expvar")?;
//! let mut ext = ExpvarExtension::new(
//!     Config::with_endpoint("127.0.0.1:27777"),
//!     TelemetrySettings::new(&id),
//! );
//! ext.start(&Context::background(), &ExtensionRegistry::new()).await?;
//! // ...
//! ext.shutdown(&Context::background()).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod factory;

use std::net::SocketAddr;

use thiserror::Error;
use tracing::Instrument;

use crate::component::{Extension, TelemetrySettings};
use crate::confighttp::{BindError, ConfigError, HttpServer, ShutdownError};
use crate::context::{Context, ContextError};
use crate::expvar;
use crate::host::Host;

pub use config::{Config, DEFAULT_PORT};
pub use factory::Factory;

/// Errors from the extension lifecycle.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The configuration could not be resolved against the host.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The endpoint could not be bound.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The start context finished before the server was up.
    #[error("start aborted: {0}")]
    Context(#[from] ContextError),

    /// `start` was called while the server is running.
    #[error("extension is already running")]
    AlreadyRunning,

    /// The server did not stop cleanly.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Serves the variable dump on the configured endpoint.
pub struct ExpvarExtension {
    config: Config,
    telemetry: TelemetrySettings,
    server: Option<HttpServer>,
}

impl ExpvarExtension {
    /// Creates a stopped extension.
    #[must_use]
    pub fn new(config: Config, telemetry: TelemetrySettings) -> Self {
        Self {
            config,
            telemetry,
            server: None,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the server is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// Address the server is bound to, while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(HttpServer::local_addr)
    }

    async fn start_server(&mut self, ctx: &Context, host: &dyn Host) -> Result<(), ExtensionError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        if self.server.is_some() {
            return Err(ExtensionError::AlreadyRunning);
        }

        let router = self.config.server.to_router(host, expvar::router())?;

        let listener = tokio::select! {
            listener = self.config.server.to_listener() => listener?,
            err = ctx.done() => return Err(err.into()),
        };

        let server = HttpServer::serve(listener, router)?;
        tracing::info!(
            "Expvar extension serving on http://{}{}",
            server.local_addr(),
            expvar::DEBUG_VARS_PATH
        );
        self.server = Some(server);
        Ok(())
    }

    async fn stop_server(&mut self, ctx: &Context) -> Result<(), ExtensionError> {
        let Some(server) = self.server.take() else {
            return Ok(());
        };

        let addr = server.local_addr();
        match server.shutdown(ctx).await {
            Ok(()) => {
                tracing::info!("Expvar extension on {} stopped", addr);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Expvar extension on {} stopped uncleanly: {}", addr, e);
                Err(e.into())
            }
        }
    }
}

impl Extension for ExpvarExtension {
    type Error = ExtensionError;

    async fn start(&mut self, ctx: &Context, host: &dyn Host) -> Result<(), ExtensionError> {
        let span = self.telemetry.span.clone();
        self.start_server(ctx, host).instrument(span).await
    }

    async fn shutdown(&mut self, ctx: &Context) -> Result<(), ExtensionError> {
        let span = self.telemetry.span.clone();
        self.stop_server(ctx).instrument(span).await
    }
}
