//! ksa-core: Credential model, cache store and login lookup
//!
//! This crate holds everything shared between the sync daemon, the login
//! hook and tests: the credential data model, per-record decoding, the
//! cache store abstraction with its file and in-memory implementations,
//! the authentication lookup, and configuration.

pub mod config;
pub mod decode;
pub mod error;
pub mod lookup;
pub mod store;
pub mod types;

pub use decode::{decode_record, identity_key, DecodedCredential};
pub use error::{ConfigError, DecodeError, KsaError, SourceError, StoreError};
pub use lookup::{authenticate, Decision};
pub use store::{CredentialMap, CredentialStore, FileStore, MemoryStore};
pub use types::{CredentialEntry, CredentialRecord, IdentityKey};
