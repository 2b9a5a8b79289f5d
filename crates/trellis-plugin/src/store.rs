//! Application-wide mutable state shared by an entire instance tree.
//!
//! A [`Store`] lives for the whole process. Every instance merged into a
//! tree ends up reading and writing the same map, and every request's
//! context carries a handle to it. Single operations are atomic per key;
//! read-modify-write sequences spanning several calls are not serialized.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use trellis_core::error::AppError;
use trellis_core::result::AppResult;

/// Shared key/value bag, cloned by reference.
#[derive(Clone, Default)]
pub struct Store {
    /// Entries shared by every clone of this store.
    entries: Arc<DashMap<String, Value>>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the value under `key` as an integer.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(|entry| entry.value().as_i64())
    }

    /// Returns the value under `key` as a string.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .and_then(|entry| entry.value().as_str().map(str::to_string))
    }

    /// Sets `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Inserts `key` only when it is absent. Returns whether it was inserted.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let mut inserted = false;
        self.entries.entry(key.into()).or_insert_with(|| {
            inserted = true;
            value.into()
        });
        inserted
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Mutates the value under `key` in place.
    pub fn update<F>(&self, key: &str, f: F) -> AppResult<()>
    where
        F: FnOnce(&mut Value),
    {
        let mut entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| AppError::context(format!("Store has no key '{key}'")))?;
        f(entry.value_mut());
        Ok(())
    }

    /// Adds `delta` to the integer under `key` and returns the new value.
    pub fn increment(&self, key: &str, delta: i64) -> AppResult<i64> {
        let mut entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| AppError::context(format!("Store has no key '{key}'")))?;
        let current = entry.value().as_i64().ok_or_else(|| {
            AppError::context(format!("Store key '{key}' does not hold an integer"))
        })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            AppError::context(format!("Store key '{key}' overflows adding {delta} to {current}"))
        })?;
        *entry.value_mut() = Value::from(next);
        Ok(next)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry of `other` whose key is absent here.
    ///
    /// Existing keys win. Returns the number of entries copied.
    pub fn absorb(&self, other: &Store) -> usize {
        if self.same_as(other) {
            return 0;
        }

        let copied = other
            .entries
            .iter()
            .filter(|entry| self.seed(entry.key().clone(), entry.value().clone()))
            .count();

        if copied > 0 {
            debug!(copied, "Store absorbed entries from merged instance");
        }
        copied
    }

    /// Returns whether both handles point at the same underlying map.
    pub fn same_as(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.entries.len())
            .finish()
    }
}
