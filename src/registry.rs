//! Process-wide backend registry

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{PlugfsError, Result};

/// Name-to-backend table consulted at database-open time.
///
/// A process-wide instance backs the FFI adapter ([`BackendRegistry::global`]),
/// but the type is plain and can be instantiated directly where test
/// isolation matters. Absence of a name means the engine's built-in
/// filesystem handling applies; no default backend lives here.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, Arc<dyn Backend>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry the FFI adapter consults
    pub fn global() -> &'static BackendRegistry {
        static GLOBAL: OnceLock<BackendRegistry> = OnceLock::new();
        GLOBAL.get_or_init(BackendRegistry::new)
    }

    /// Store `backend` under `name`. Names are unique per registry.
    pub fn register(&self, name: &str, backend: Arc<dyn Backend>) -> Result<()> {
        let mut backends = self.backends.write();
        if backends.contains_key(name) {
            return Err(PlugfsError::DuplicateName(name.to_owned()));
        }
        backends.insert(name.to_owned(), backend);
        debug!(name, "registered backend");
        Ok(())
    }

    /// Fetch the backend registered under `name`
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Backend>> {
        self.backends
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PlugfsError::UnknownBackend(name.to_owned()))
    }

    /// Remove `name`. Removing an absent name is a no-op.
    pub fn unregister(&self, name: &str) {
        if self.backends.write().remove(name).is_some() {
            debug!(name, "unregistered backend");
        }
    }

    /// Is `name` currently registered?
    pub fn contains(&self, name: &str) -> bool {
        self.backends.read().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBackend;

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = BackendRegistry::new();
        registry.register("mem", Arc::new(MemBackend::new())).unwrap();

        let err = registry
            .register("mem", Arc::new(MemBackend::new()))
            .unwrap_err();
        assert!(matches!(err, PlugfsError::DuplicateName(name) if name == "mem"));
    }

    #[test]
    fn lookup_of_absent_name_fails() {
        let registry = BackendRegistry::new();
        let err = registry.lookup("nowhere").unwrap_err();
        assert!(matches!(err, PlugfsError::UnknownBackend(name) if name == "nowhere"));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = BackendRegistry::new();
        registry.register("mem", Arc::new(MemBackend::new())).unwrap();

        registry.unregister("mem");
        assert!(!registry.contains("mem"));
        registry.unregister("mem");

        // The freed name is available again.
        registry.register("mem", Arc::new(MemBackend::new())).unwrap();
    }
}
