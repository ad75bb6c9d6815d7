//! HTTP server configuration.
//!
//! Turns a [`ServerConfig`] into the two things an extension needs to serve
//! HTTP: a bound listener ([`ServerConfig::to_listener`]) and a router
//! wrapped in the configured middleware ([`ServerConfig::to_router`]).
//!
//! Resolution happens lazily, at start time, so configuration errors surface
//! from `start` rather than from parsing.

pub mod server;

use std::collections::BTreeMap;
use std::io;

use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    middleware,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::component::ComponentId;
use crate::host::Host;

pub use server::{HttpServer, ShutdownError};

/// Configuration problems found while resolving a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The referenced authenticator is not registered with the host.
    #[error("failed to resolve authenticator \"{0}\": authenticator not found")]
    AuthenticatorNotFound(ComponentId),

    /// The referenced extension exists but cannot authenticate requests.
    #[error("requested authenticator \"{0}\" is not a server authenticator")]
    NotServerAuthenticator(ComponentId),

    /// A configured response header has an invalid name or value.
    #[error("invalid response header {name:?}: {reason}")]
    InvalidResponseHeader { name: String, reason: String },

    /// A configured CORS origin is not a valid header value.
    #[error("invalid CORS origin {0:?}")]
    InvalidCorsOrigin(String),
}

/// Failures turning an endpoint into a listening socket.
#[derive(Debug, Error)]
pub enum BindError {
    /// The endpoint is not a usable `host:port` string.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    Malformed { endpoint: String, reason: String },

    /// The operating system refused the bind.
    #[error("failed to listen on {endpoint}: {source}")]
    Listen {
        endpoint: String,
        #[source]
        source: io::Error,
    },
}

/// Reference to the authenticator guarding a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// ID of an authenticator registered with the host.
    pub authenticator: ComponentId,
}

/// Settings for one HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, as `host:port`. An empty host binds every interface.
    pub endpoint: String,

    /// Authenticator guarding every request. `None` serves unauthenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// Origins allowed by CORS. Empty disables CORS; `*` allows any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_allowed_origins: Vec<String>,

    /// Headers added to every response.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: BTreeMap<String, String>,
}

impl ServerConfig {
    /// Creates a config for `endpoint` with no auth and no extra middleware.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: None,
            cors_allowed_origins: Vec::new(),
            response_headers: BTreeMap::new(),
        }
    }

    /// Checks the endpoint shape without binding anything.
    pub fn validate(&self) -> Result<(), BindError> {
        bind_address(&self.endpoint).map(|_| ())
    }

    /// Binds the configured endpoint.
    pub async fn to_listener(&self) -> Result<TcpListener, BindError> {
        let addr = bind_address(&self.endpoint)?;
        TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| BindError::Listen {
                endpoint: self.endpoint.clone(),
                source,
            })
    }

    /// Wraps `handler` in the configured middleware.
    ///
    /// Layers, innermost first: authentication, response headers, CORS,
    /// request tracing.
    pub fn to_router(&self, host: &dyn Host, handler: Router) -> Result<Router, ConfigError> {
        let mut router = handler;

        if let Some(auth) = &self.auth {
            let authenticator = host.authenticator(&auth.authenticator)?;
            tracing::debug!("requests require authenticator {}", auth.authenticator);
            router = router.layer(middleware::from_fn_with_state(authenticator, require_auth));
        }

        for (name, value) in &self.response_headers {
            let (name, value) = response_header(name, value)?;
            router = router.layer(SetResponseHeaderLayer::overriding(name, value));
        }

        if !self.cors_allowed_origins.is_empty() {
            router = router.layer(cors_layer(&self.cors_allowed_origins)?);
        }

        Ok(router.layer(TraceLayer::new_for_http()))
    }
}

/// Validates `endpoint` and returns the address string to bind.
fn bind_address(endpoint: &str) -> Result<String, BindError> {
    let malformed = |reason: &str| BindError::Malformed {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    if endpoint.trim().is_empty() {
        return Err(malformed("endpoint is empty"));
    }
    if endpoint.contains("://") {
        return Err(malformed("expected host:port without a scheme"));
    }

    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| malformed("missing port"))?;
    if port.parse::<u16>().is_err() {
        return Err(malformed("port must be a number between 0 and 65535"));
    }
    if host.contains(char::is_whitespace) {
        return Err(malformed("host must not contain whitespace"));
    }

    if host.is_empty() {
        Ok(format!("0.0.0.0:{}", port))
    } else {
        Ok(endpoint.to_string())
    }
}

fn response_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidResponseHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::try_from(name).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::try_from(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|_| ConfigError::InvalidCorsOrigin(o.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}
