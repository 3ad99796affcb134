//! ksa-auth: Login hook for the host authentication stack
//!
//! The binary is invoked once per login attempt and only reads the local
//! credential cache written by `ksa-sync`:
//!
//! - `ksa-auth check` runs under `pam_exec` with `expose_authtok`. The user
//!   comes from `PAM_USER`, the password from stdin. On success it prints
//!   `K8S_SERVICE=<target>` for the stack to place in the session
//!   environment and exits 0; anything else exits non-zero.
//! - `ksa-auth keys <user>` serves sshd's `AuthorizedKeysCommand`, printing
//!   the public key cached for the user.

pub mod check;
pub mod keys;

pub use check::{check_login, env_assignment, read_secret};
pub use keys::{authorized_keys, KeyLookupError};
