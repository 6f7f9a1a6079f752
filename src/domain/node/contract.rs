use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use super::{validate_inputs, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope, RunOptions};
use crate::domain::llm::ChatModel;

/// Delegate constructed by [`FlowNode::init`]
#[derive(Debug, Clone)]
pub enum NodeInstance {
    /// The node needs nothing beyond its configuration
    Stateless,
    ChatModel(Arc<dyn ChatModel>),
}

/// Contract every executable node implements
#[async_trait]
pub trait FlowNode: Send + Sync + Debug {
    fn kind(&self) -> NodeKind;

    fn description(&self) -> &'static str;

    /// Ordered list of configurable inputs
    fn declare_inputs(&self) -> Vec<NodeInputParam>;

    /// Validate configuration before any I/O
    fn validate(&self, data: &NodeData) -> Result<(), NodeError> {
        validate_inputs(&self.declare_inputs(), data)
    }

    /// Build the node's stateful delegate; must not read flow state
    async fn init(&self, _data: &NodeData, _options: &RunOptions) -> Result<NodeInstance, NodeError> {
        Ok(NodeInstance::Stateless)
    }

    /// Execute once for the given input
    ///
    /// Recoverable failures come back as an envelope with `error` set; an
    /// `Err` is fatal to the run.
    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError>;
}
