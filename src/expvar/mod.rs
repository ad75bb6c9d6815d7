//! Published runtime variables and the HTTP handler that dumps them.
//!
//! Variables live in a [`Registry`]. The process-wide registry returned by
//! [`vars`] starts with two built-ins:
//!
//! - `cmdline`: the process arguments
//! - `process`: pid, start time, uptime and (on Linux) thread and memory
//!   figures from `/proc/self/status`
//!
//! Other code publishes its own counters next to them:
//!
//! ```no_run
//! let requests = expvard::expvar::vars().new_int("requests").unwrap();
//! requests.add(1);
//! ```

mod process;
mod var;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use axum::{
    Router,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::any,
};
use thiserror::Error;

pub use process::{ProcStatus, parse_proc_status};
pub use var::{Float, Func, Int, Map, Str, Var};

/// Path the dump is served on.
pub const DEBUG_VARS_PATH: &str = "/debug/vars";

/// Content type of the dump.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Errors from publishing or updating variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
    /// A variable with this name is already published.
    #[error("variable {0:?} is already published")]
    Duplicate(String),

    /// A map entry holds a different kind of variable.
    #[error("map entry {key:?} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl VarError {
    fn type_mismatch(key: &str, expected: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.to_string(),
            expected,
        }
    }
}

/// A named set of published variables.
#[derive(Default)]
pub struct Registry {
    vars: RwLock<BTreeMap<String, Arc<dyn Var>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `var` under `name`. Names are never reused.
    pub fn publish(&self, name: &str, var: Arc<dyn Var>) -> Result<(), VarError> {
        let mut vars = self.vars.write().unwrap_or_else(PoisonError::into_inner);
        if vars.contains_key(name) {
            return Err(VarError::Duplicate(name.to_string()));
        }
        vars.insert(name.to_string(), var);
        Ok(())
    }

    /// Returns the variable published under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Var>> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns the published names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Calls `f` for each variable in name order.
    ///
    /// Works on a snapshot, so `f` may publish new variables.
    pub fn for_each(&self, mut f: impl FnMut(&str, &dyn Var)) {
        for (name, var) in self.snapshot() {
            f(&name, var.as_ref());
        }
    }

    /// Publishes a new [`Int`] under `name`.
    pub fn new_int(&self, name: &str) -> Result<Arc<Int>, VarError> {
        let v = Arc::new(Int::default());
        self.publish(name, Arc::clone(&v) as Arc<dyn Var>)?;
        Ok(v)
    }

    /// Publishes a new [`Float`] under `name`.
    pub fn new_float(&self, name: &str) -> Result<Arc<Float>, VarError> {
        let v = Arc::new(Float::default());
        self.publish(name, Arc::clone(&v) as Arc<dyn Var>)?;
        Ok(v)
    }

    /// Publishes a new [`Str`] under `name`.
    pub fn new_str(&self, name: &str) -> Result<Arc<Str>, VarError> {
        let v = Arc::new(Str::default());
        self.publish(name, Arc::clone(&v) as Arc<dyn Var>)?;
        Ok(v)
    }

    /// Publishes a new [`Map`] under `name`.
    pub fn new_map(&self, name: &str) -> Result<Arc<Map>, VarError> {
        let v = Arc::new(Map::default());
        self.publish(name, Arc::clone(&v) as Arc<dyn Var>)?;
        Ok(v)
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Var>)> {
        self.vars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }
}

static VARS: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();
    if let Err(e) = process::publish_builtins(&registry) {
        tracing::warn!("failed to publish built-in variables: {}", e);
    }
    registry
});

/// Returns the process-wide registry.
pub fn vars() -> &'static Registry {
    &VARS
}

/// Renders every variable as one JSON object, one entry per line.
#[must_use]
pub fn render(registry: &Registry) -> String {
    let mut out = String::from("{\n");
    let mut first = true;
    registry.for_each(|name, var| {
        if !first {
            out.push_str(",\n");
        }
        first = false;
        // Serializing a str or a Value cannot fail.
        let key = serde_json::to_string(name).unwrap_or_default();
        let value = serde_json::to_string(&var.value()).unwrap_or_else(|_| "null".into());
        out.push_str(&key);
        out.push_str(": ");
        out.push_str(&value);
    });
    out.push_str("\n}\n");
    out
}

async fn dump() -> impl IntoResponse {
    ([(CONTENT_TYPE, CONTENT_TYPE_JSON)], render(vars()))
}

/// Router serving the dump at [`DEBUG_VARS_PATH`] and on every other path,
/// for every method.
pub fn router() -> Router {
    Router::new()
        .route(DEBUG_VARS_PATH, any(dump))
        .fallback(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    #[test]
    fn test_publish_rejects_duplicates() {
        let registry = Registry::new();
        registry.new_int("hits").unwrap();
        assert_eq!(
            registry.new_str("hits").unwrap_err(),
            VarError::Duplicate("hits".into())
        );
    }

    #[test]
    fn test_get_returns_published_var() {
        let registry = Registry::new();
        let hits = registry.new_int("hits").unwrap();
        hits.add(5);
        assert_eq!(registry.get("hits").map(|v| v.value()), Some(json!(5)));
        assert!(registry.get("misses").is_none());
    }

    #[test]
    fn test_render_empty_registry() {
        assert_eq!(render(&Registry::new()), "{\n\n}\n");
    }

    #[test]
    fn test_render_sorted_and_parseable() {
        let registry = Registry::new();
        registry.new_str("zeta").unwrap().set("last");
        registry.new_int("alpha").unwrap().set(1);
        registry.new_map("mid").unwrap().add("k", 2).unwrap();

        let out = render(&registry);
        assert_eq!(
            out,
            "{\n\"alpha\": 1,\n\"mid\": {\"k\":2},\n\"zeta\": \"last\"\n}\n"
        );

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, json!({"alpha": 1, "mid": {"k": 2}, "zeta": "last"}));
    }

    #[test]
    fn test_render_escapes_names() {
        let registry = Registry::new();
        registry.new_int("quote\"d").unwrap();
        let parsed: Value = serde_json::from_str(&render(&registry)).unwrap();
        assert_eq!(parsed["quote\"d"], json!(0));
    }

    #[test]
    fn test_global_registry_has_builtins() {
        let names = vars().names();
        assert!(names.contains(&"cmdline".to_string()));
        assert!(names.contains(&"process".to_string()));
    }

    #[test]
    fn test_for_each_allows_publishing() {
        let registry = Registry::new();
        registry.new_int("a").unwrap();
        registry.for_each(|name, _| {
            let _ = registry.new_int(&format!("{}_copy", name));
        });
        assert_eq!(registry.names(), vec!["a", "a_copy"]);
    }
}
