//! Published variable kinds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map as JsonMap, Value};

use super::VarError;

/// A value that can be rendered into the debug dump.
pub trait Var: Send + Sync {
    /// Current value as JSON.
    fn value(&self) -> Value;
}

/// A 64-bit integer counter.
#[derive(Debug, Default)]
pub struct Int(AtomicI64);

impl Int {
    /// Adds `delta` to the counter.
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Overwrites the counter.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Reads the counter.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Var for Int {
    fn value(&self) -> Value {
        Value::from(self.get())
    }
}

/// A 64-bit float, stored as raw bits.
#[derive(Debug, Default)]
pub struct Float(AtomicU64);

impl Float {
    /// Adds `delta` to the value.
    pub fn add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Overwrites the value.
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Reads the value.
    #[must_use]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl Var for Float {
    // NaN and infinities have no JSON form and render as null.
    fn value(&self) -> Value {
        serde_json::Number::from_f64(self.get()).map_or(Value::Null, Value::Number)
    }
}

/// A string value.
#[derive(Debug, Default)]
pub struct Str(RwLock<String>);

impl Str {
    /// Overwrites the string.
    pub fn set(&self, value: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }

    /// Reads the string.
    #[must_use]
    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Var for Str {
    fn value(&self) -> Value {
        Value::String(self.get())
    }
}

/// A value computed each time the dump is rendered.
pub struct Func(Box<dyn Fn() -> Value + Send + Sync>);

impl Func {
    /// Wraps `f`.
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Func(..)")
    }
}

impl Var for Func {
    fn value(&self) -> Value {
        (self.0)()
    }
}

/// Entry of a [`Map`]; numeric entries stay typed so `add` can update them.
#[derive(Clone)]
enum Entry {
    Int(Arc<Int>),
    Float(Arc<Float>),
    Var(Arc<dyn Var>),
}

impl Entry {
    fn var(&self) -> Arc<dyn Var> {
        match self {
            Entry::Int(v) => Arc::clone(v) as Arc<dyn Var>,
            Entry::Float(v) => Arc::clone(v) as Arc<dyn Var>,
            Entry::Var(v) => Arc::clone(v),
        }
    }
}

/// A string-keyed collection of variables, rendered as a JSON object with
/// sorted keys.
#[derive(Default)]
pub struct Map {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map").field("keys", &self.keys()).finish()
    }
}

impl Map {
    /// Adds `delta` to the integer at `key`, creating it if absent.
    pub fn add(&self, key: &str, delta: i64) -> Result<(), VarError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(Entry::Int(v)) => v.add(delta),
            Some(_) => return Err(VarError::type_mismatch(key, "int")),
            None => {
                let v = Arc::new(Int::default());
                v.add(delta);
                entries.insert(key.to_string(), Entry::Int(v));
            }
        }
        Ok(())
    }

    /// Adds `delta` to the float at `key`, creating it if absent.
    pub fn add_float(&self, key: &str, delta: f64) -> Result<(), VarError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(Entry::Float(v)) => v.add(delta),
            Some(_) => return Err(VarError::type_mismatch(key, "float")),
            None => {
                let v = Arc::new(Float::default());
                v.add(delta);
                entries.insert(key.to_string(), Entry::Float(v));
            }
        }
        Ok(())
    }

    /// Stores `var` at `key`, replacing any previous entry.
    pub fn set(&self, key: &str, var: Arc<dyn Var>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Entry::Var(var));
    }

    /// Returns the variable at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn Var>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Entry::var)
    }

    /// Removes `key`.
    pub fn delete(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Returns the keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Calls `f` for each entry in key order.
    ///
    /// The map is snapshotted first, so `f` may modify it.
    pub fn for_each(&self, mut f: impl FnMut(&str, &dyn Var)) {
        for (key, var) in self.snapshot() {
            f(&key, var.as_ref());
        }
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Var>)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, e)| (k.clone(), e.var()))
            .collect()
    }
}

impl Var for Map {
    fn value(&self) -> Value {
        let mut object = JsonMap::new();
        for (key, var) in self.snapshot() {
            object.insert(key, var.value());
        }
        Value::Object(object)
    }
}
