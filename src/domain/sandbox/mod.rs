//! Code-execution gateway seam
//!
//! User snippets run as the body of an implicitly async function. The
//! gateway sees only the injected bindings and the modules the limits allow.

mod descriptor;
mod error;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

pub use descriptor::{
    module_root, SandboxDescriptor, SandboxLimits, DEFAULT_BUILTIN_MODULES,
    DEFAULT_EXTERNAL_MODULES, DENIED_MODULES,
};
pub use error::SandboxError;

/// Executes untrusted code against a set of bindings
#[async_trait]
pub trait CodeSandbox: Send + Sync + Debug {
    /// Run `code` and return whatever it returns, as JSON
    async fn execute(
        &self,
        code: &str,
        descriptor: SandboxDescriptor,
        limits: &SandboxLimits,
    ) -> Result<Value, SandboxError>;
}
