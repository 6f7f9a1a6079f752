//! Sandboxed JavaScript execution

mod boa_sandbox;
mod builtins;
mod modules;

pub use boa_sandbox::{BoaSandbox, BoaSandboxOptions};
