//! Credential resolution seam
//!
//! Storage and decryption live outside the runtime; nodes only see resolved
//! key/value pairs.

mod resolver;

pub use resolver::{get_credential_param, CredentialData, CredentialResolver};

#[cfg(test)]
pub use resolver::mock;
