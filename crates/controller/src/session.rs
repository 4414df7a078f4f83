//! Per-request session storage seam.
//!
//! Session persistence belongs to the host. A host hands a session to the site by putting a
//! [`SessionHandle`] into the request extensions; requests without one get a fresh
//! [`MemorySession`] that lives as long as the request.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Key/value session storage owned by the host framework.
///
/// Methods take `&self`: a session is shared by the request and everything dispatched for it,
/// so implementations use interior mutability.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn insert(&self, key: &str, value: Value);

    fn remove(&self, key: &str) -> Option<Value>;

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Flush pending changes to the backing storage.
    fn save(&self) {}
}

/// Request extension carrying the host session.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<dyn SessionStore>);

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionHandle")
    }
}

/// An in-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySession {
    inner: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut HashMap<String, Value>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.with(|map| map.get(key).cloned())
    }

    fn insert(&self, key: &str, value: Value) {
        self.with(|map| map.insert(key.to_string(), value));
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.with(|map| map.remove(key))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.with(|map| map.contains_key(key))
    }
}
