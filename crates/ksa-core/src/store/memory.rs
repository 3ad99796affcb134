//! In-process store backed by a swappable snapshot pointer

use std::sync::{Arc, RwLock};

use super::{CredentialMap, CredentialStore};
use crate::error::StoreError;
use crate::types::CredentialEntry;

/// Store that keeps the mapping in memory.
///
/// Readers clone the current `Arc` and look up against that snapshot; the
/// writer builds a new map and swaps the pointer, so the lock is only held
/// for the pointer copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: RwLock<Arc<CredentialMap>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries(entries: CredentialMap) -> Self {
        Self {
            current: RwLock::new(Arc::new(entries)),
        }
    }

    fn load(&self) -> Result<Arc<CredentialMap>, StoreError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| StoreError::Poisoned)
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, identity: &str) -> Result<Option<CredentialEntry>, StoreError> {
        Ok(self.load()?.get(identity).cloned())
    }

    fn replace_all(&self, entries: CredentialMap) -> Result<(), StoreError> {
        let next = Arc::new(entries);
        let mut guard = self.current.write().map_err(|_| StoreError::Poisoned)?;
        *guard = next;
        Ok(())
    }

    fn snapshot(&self) -> Result<CredentialMap, StoreError> {
        Ok(self.load()?.as_ref().clone())
    }
}
