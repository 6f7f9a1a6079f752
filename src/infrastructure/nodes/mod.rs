//! Node executors
//!
//! Every node kind is built from the same [`NodeServices`] and dispatched
//! through the closed [`AgentflowNode`] enum.

pub mod condition;
pub mod custom_function;
pub mod direct_reply;
pub mod execute_flow;
pub mod http;
pub mod llm;
pub mod registry;
pub mod services;
pub mod start;

pub use condition::ConditionNode;
pub use custom_function::CustomFunctionNode;
pub use direct_reply::DirectReplyNode;
pub use execute_flow::ExecuteFlowNode;
pub use http::HttpNode;
pub use llm::LlmNode;
pub use registry::{AgentflowNode, NodeRegistry};
pub use services::{NodeServices, RuntimeSettings};
pub use start::StartNode;
