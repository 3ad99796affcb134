//! Credential cache store
//!
//! The store maps [`IdentityKey`]s to [`CredentialEntry`]s. It has exactly
//! one writer (the sync loop) which only ever replaces the whole mapping, and
//! any number of readers doing point lookups. Implementations must make
//! [`CredentialStore::replace_all`] atomic: a reader sees either the complete
//! old mapping or the complete new one, never a mix and never an empty
//! intermediate state.

mod file;
mod memory;

pub use file::{default_cache_path, FileStore};
pub use memory::MemoryStore;

use std::borrow::Borrow;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::types::{CredentialEntry, IdentityKey};

/// Full cache contents
pub type CredentialMap = BTreeMap<IdentityKey, CredentialEntry>;

/// Storage backend for the credential cache
pub trait CredentialStore: Send + Sync {
    /// Look up the entry cached for `identity`
    fn get(&self, identity: &str) -> Result<Option<CredentialEntry>, StoreError>;

    /// Atomically replace the whole mapping with `entries`
    fn replace_all(&self, entries: CredentialMap) -> Result<(), StoreError>;

    /// Copy of the current mapping
    fn snapshot(&self) -> Result<CredentialMap, StoreError>;
}

impl Borrow<str> for IdentityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
