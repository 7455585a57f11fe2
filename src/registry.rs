//! Client registry
//!
//! The authoritative set of active sessions, keyed by `ClientId`.
//! Reads (`lookup`, `snapshot`, `count`) share the lock; writes (`insert`,
//! `delete`) take it exclusively. No method awaits, so the lock is never
//! held across connection I/O.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::client::ClientHandle;
use crate::types::{ClientId, DisplayName};

/// One registered session
#[derive(Debug, Clone)]
struct Entry {
    handle: ClientHandle,
    name: DisplayName,
}

/// Concurrency-safe map from connection handle to display name
#[derive(Debug, Default)]
pub struct Registry {
    clients: RwLock<HashMap<ClientId, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClientId, Entry>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClientId, Entry>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or overwrite the entry for `handle`
    pub fn insert(&self, handle: ClientHandle, name: DisplayName) {
        let id = handle.id();
        self.write().insert(id, Entry { handle, name });
    }

    /// Display name for `id`, or None if it is not registered
    pub fn lookup(&self, id: &ClientId) -> Option<DisplayName> {
        self.read().get(id).map(|entry| entry.name.clone())
    }

    /// Remove the entry for `id`, returning its name if it was present
    pub fn delete(&self, id: &ClientId) -> Option<DisplayName> {
        self.write().remove(id).map(|entry| entry.name)
    }

    /// Point-in-time list of registered handles
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        self.read()
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Number of registered sessions (diagnostics only)
    pub fn count(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn handle() -> ClientHandle {
        ClientHandle::new(Box::new(tokio::io::sink()), None, CancellationToken::new())
    }

    fn name(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    #[test]
    fn test_lookup_returns_latest_insert() {
        let registry = Registry::new();
        let h = handle();

        assert!(registry.lookup(&h.id()).is_none());

        registry.insert(h.clone(), name("first"));
        registry.insert(h.clone(), name("second"));

        assert_eq!(registry.lookup(&h.id()), Some(name("second")));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_delete_removes_entry() {
        let registry = Registry::new();
        let h = handle();
        registry.insert(h.clone(), name("alice"));

        assert_eq!(registry.delete(&h.id()), Some(name("alice")));
        assert!(registry.lookup(&h.id()).is_none());
        assert_eq!(registry.count(), 0);

        // Deleting again is a no-op
        assert!(registry.delete(&h.id()).is_none());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let registry = Registry::new();
        let a = handle();
        let b = handle();
        let c = handle();
        registry.insert(a.clone(), name("a"));
        registry.insert(b.clone(), name("b"));
        registry.insert(c.clone(), name("c"));
        registry.delete(&b.id());

        let mut ids: Vec<ClientId> = registry.snapshot().iter().map(|h| h.id()).collect();
        ids.sort_by_key(|id| id.0);
        let mut expected = vec![a.id(), c.id()];
        expected.sort_by_key(|id| id.0);

        assert_eq!(ids, expected);
    }

    #[test]
    fn test_duplicate_names_allowed() {
        let registry = Registry::new();
        let a = handle();
        let b = handle();
        registry.insert(a.clone(), name("twin"));
        registry.insert(b.clone(), name("twin"));

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.lookup(&a.id()), registry.lookup(&b.id()));
    }

    #[test]
    fn test_concurrent_mutation_and_snapshot() {
        let registry = Arc::new(Registry::new());
        let mut threads = Vec::new();

        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            threads.push(std::thread::spawn(move || {
                for i in 0..200 {
                    let h = handle();
                    registry.insert(h.clone(), name(&format!("c{i}")));
                    let _ = registry.snapshot();
                    registry.delete(&h.id());
                }
            }));
        }
        for _ in 0..2 {
            let registry = Arc::clone(&registry);
            threads.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = registry.snapshot();
                    assert!(snapshot.len() <= 4);
                }
            }));
        }

        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.count(), 0);
    }
}
