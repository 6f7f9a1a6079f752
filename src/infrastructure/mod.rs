//! Infrastructure layer - concrete sandbox, transport and node implementations

pub mod credentials;
pub mod http;
pub mod llm;
pub mod logging;
pub mod nodes;
pub mod runner;
pub mod sandbox;
pub mod streaming;
pub mod variables;
