//! Credential resolver implementations

mod env_resolver;
mod in_memory;

pub use env_resolver::{EnvCredentialResolver, EnvMapping};
pub use in_memory::InMemoryCredentialResolver;
