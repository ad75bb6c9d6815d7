//! Component identifiers and the extension lifecycle contract.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;
use crate::host::Host;

/// Separator between the kind and the name of a component ID.
const NAME_SEPARATOR: char = '/';

/// Error returned when a component ID cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid component id {input:?}: {reason}")]
pub struct ComponentIdError {
    input: String,
    reason: &'static str,
}

/// Identifies a component instance as `kind` or `kind/name`.
///
/// The kind names the implementation (`bearertokenauth`, `expvar`); the
/// optional name tells apart several instances of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId {
    kind: String,
    name: Option<String>,
}

impl ComponentId {
    /// Creates an ID with only a kind.
    pub fn new(kind: impl Into<String>) -> Result<Self, ComponentIdError> {
        let kind = kind.into();
        validate_kind(&kind).map_err(|reason| ComponentIdError {
            input: kind.clone(),
            reason,
        })?;
        Ok(Self { kind, name: None })
    }

    /// Creates an ID with a kind and an instance name.
    pub fn with_name(
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ComponentIdError> {
        let mut id = Self::new(kind)?;
        let name = name.into();
        validate_name(&name).map_err(|reason| ComponentIdError {
            input: format!("{}{}{}", id.kind, NAME_SEPARATOR, name),
            reason,
        })?;
        id.name = Some(name);
        Ok(id)
    }

    /// Returns the component kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the instance name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn validate_kind(kind: &str) -> Result<(), &'static str> {
    let mut chars = kind.chars();
    match chars.next() {
        None => return Err("kind must not be empty"),
        Some(c) if !c.is_ascii_alphabetic() => return Err("kind must start with a letter"),
        Some(_) => {}
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err("kind may only contain letters, digits and underscores");
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name must not be empty");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == NAME_SEPARATOR)
    {
        return Err("name must not contain whitespace or '/'");
    }
    Ok(())
}

impl FromStr for ComponentId {
    type Err = ComponentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(NAME_SEPARATOR) {
            Some((kind, name)) => Self::with_name(kind, name),
            None => Self::new(s),
        }
    }
}

impl TryFrom<String> for ComponentId {
    type Error = ComponentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}{}{}", self.kind, NAME_SEPARATOR, name),
            None => f.write_str(&self.kind),
        }
    }
}

/// Telemetry handed to an extension when it is created.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /// Span that scopes every log line the extension emits.
    pub span: tracing::Span,
}

impl TelemetrySettings {
    /// Creates settings whose span is tagged with the component ID.
    #[must_use]
    pub fn new(id: &ComponentId) -> Self {
        Self {
            span: tracing::info_span!("extension", id = %id),
        }
    }
}

/// Two-phase lifecycle driven by whoever hosts the extension.
///
/// Callers serialize `start` and `shutdown`; both take `&mut self`.
pub trait Extension {
    /// Error reported by either phase.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Acquires resources and begins serving.
    fn start(
        &mut self,
        ctx: &Context,
        host: &dyn Host,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Releases resources. Must succeed when nothing was started.
    fn shutdown(&mut self, ctx: &Context) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
