//! Password check entry point

use std::io::{self, Read};

use ksa_core::config::AuthConfig;
use ksa_core::{authenticate, Decision, FileStore};

/// Longest secret accepted on stdin, terminator excluded
pub const MAX_SECRET_LEN: usize = 4096;

/// Longest terminator stripped after the secret (`\r\n`)
const MAX_TERMINATOR_LEN: usize = 2;

/// Read the presented secret from `reader`.
///
/// `pam_exec` terminates the token with a NUL byte; a trailing newline is
/// accepted for interactive use. Nothing else is stripped. Input longer than
/// [`MAX_SECRET_LEN`] is an error, never a truncated secret.
pub fn read_secret<R: Read>(reader: R) -> io::Result<String> {
    let limit = MAX_SECRET_LEN + MAX_TERMINATOR_LEN;

    // One byte past the limit tells overlong input apart from input at the limit
    let mut buf = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut buf)?;
    if buf.len() > limit {
        return Err(secret_too_long());
    }

    if buf.last() == Some(&0) {
        buf.pop();
    } else if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    if buf.len() > MAX_SECRET_LEN {
        return Err(secret_too_long());
    }

    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn secret_too_long() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("secret exceeds {} bytes", MAX_SECRET_LEN),
    )
}

/// Check a login against the cache configured in `config`
pub fn check_login(config: &AuthConfig, identity: &str, secret: &str) -> Decision {
    let store = FileStore::new(&config.cache_path);
    authenticate(&store, identity, secret)
}

/// `NAME=value` line handed to the host stack for an accepted login
pub fn env_assignment(config: &AuthConfig, decision: &Decision) -> Option<String> {
    decision
        .service_target()
        .map(|service| format!("{}={}", config.service_env_var, service))
}
