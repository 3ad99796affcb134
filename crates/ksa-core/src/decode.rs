//! Credential record decoding
//!
//! Turns a raw [`CredentialRecord`] into the identity key it is cached under
//! and the [`CredentialEntry`] stored for it. Decoding is per record: a
//! malformed record yields a [`DecodeError`] describing why it was skipped and
//! never affects its neighbours in the batch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::DecodeError;
use crate::types::{CredentialEntry, CredentialRecord, IdentityKey};

/// Optional override for the identity key
pub const FIELD_USER: &str = "user";
/// Login password
pub const FIELD_PASS: &str = "pass";
/// Key material
pub const FIELD_KEY: &str = "key";
/// Bare backend service name
pub const FIELD_SERVICE: &str = "service";

/// A successfully decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCredential {
    /// Key the entry is cached under
    pub identity: IdentityKey,
    /// Cache value
    pub entry: CredentialEntry,
}

/// Compute the identity key for a record.
///
/// The override wins when it is present and non-empty; otherwise the key is
/// `{namespace}-{name}`.
pub fn identity_key(namespace: &str, name: &str, override_user: Option<&str>) -> IdentityKey {
    match override_user {
        Some(user) if !user.is_empty() => IdentityKey::new(user),
        _ => IdentityKey::new(format!("{}-{}", namespace, name)),
    }
}

/// Decode a record into its identity key and cache entry
pub fn decode_record(record: &CredentialRecord) -> Result<DecodedCredential, DecodeError> {
    let override_user = optional_field(record, FIELD_USER)?;
    let password = required_field(record, FIELD_PASS)?;
    let key = required_field(record, FIELD_KEY)?;
    let service = required_field(record, FIELD_SERVICE)?;

    Ok(DecodedCredential {
        identity: identity_key(&record.namespace, &record.name, override_user.as_deref()),
        entry: CredentialEntry::new(password, key, &service, &record.namespace),
    })
}

fn required_field(record: &CredentialRecord, field: &'static str) -> Result<String, DecodeError> {
    optional_field(record, field)?.ok_or(DecodeError::MissingField(field))
}

fn optional_field(
    record: &CredentialRecord,
    field: &'static str,
) -> Result<Option<String>, DecodeError> {
    match record.field(field) {
        Some(encoded) => decode_value(encoded, field).map(Some),
        None => Ok(None),
    }
}

fn decode_value(encoded: &str, field: &'static str) -> Result<String, DecodeError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| DecodeError::InvalidBase64(field))?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(field))
}
