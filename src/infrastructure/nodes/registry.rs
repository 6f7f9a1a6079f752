//! Closed set of node executors and their lookup by wire name

use async_trait::async_trait;

use super::condition::ConditionNode;
use super::custom_function::CustomFunctionNode;
use super::direct_reply::DirectReplyNode;
use super::execute_flow::ExecuteFlowNode;
use super::http::HttpNode;
use super::llm::LlmNode;
use super::services::NodeServices;
use super::start::StartNode;
use crate::domain::node::{
    FlowNode, NodeData, NodeError, NodeInputParam, NodeInstance, NodeKind, NodeOutputEnvelope,
    RunOptions,
};

/// One executor per [`NodeKind`]
#[derive(Debug, Clone)]
pub enum AgentflowNode {
    Start(StartNode),
    Condition(ConditionNode),
    CustomFunction(CustomFunctionNode),
    ExecuteFlow(ExecuteFlowNode),
    Http(HttpNode),
    Llm(LlmNode),
    DirectReply(DirectReplyNode),
}

impl AgentflowNode {
    pub fn new(kind: NodeKind, services: NodeServices) -> Self {
        match kind {
            NodeKind::Start => Self::Start(StartNode::new(services)),
            NodeKind::Condition => Self::Condition(ConditionNode::new(services)),
            NodeKind::CustomFunction => Self::CustomFunction(CustomFunctionNode::new(services)),
            NodeKind::ExecuteFlow => Self::ExecuteFlow(ExecuteFlowNode::new(services)),
            NodeKind::Http => Self::Http(HttpNode::new(services)),
            NodeKind::Llm => Self::Llm(LlmNode::new(services)),
            NodeKind::DirectReply => Self::DirectReply(DirectReplyNode::new(services)),
        }
    }

    fn inner(&self) -> &dyn FlowNode {
        match self {
            Self::Start(node) => node,
            Self::Condition(node) => node,
            Self::CustomFunction(node) => node,
            Self::ExecuteFlow(node) => node,
            Self::Http(node) => node,
            Self::Llm(node) => node,
            Self::DirectReply(node) => node,
        }
    }
}

#[async_trait]
impl FlowNode for AgentflowNode {
    fn kind(&self) -> NodeKind {
        self.inner().kind()
    }

    fn description(&self) -> &'static str {
        self.inner().description()
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        self.inner().declare_inputs()
    }

    fn validate(&self, data: &NodeData) -> Result<(), NodeError> {
        self.inner().validate(data)
    }

    async fn init(&self, data: &NodeData, options: &RunOptions) -> Result<NodeInstance, NodeError> {
        self.inner().init(data, options).await
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        self.inner().run(data, input, options).await
    }
}

/// Builds node executors from shared services
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    services: NodeServices,
}

impl NodeRegistry {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &NodeServices {
        &self.services
    }

    pub fn node(&self, kind: NodeKind) -> AgentflowNode {
        AgentflowNode::new(kind, self.services.clone())
    }

    /// Resolve the executor for a node by its `name`
    pub fn resolve(&self, data: &NodeData) -> Result<AgentflowNode, NodeError> {
        let kind = data
            .name
            .parse::<NodeKind>()
            .map_err(NodeError::configuration)?;
        Ok(self.node(kind))
    }

    /// Every node kind, in declaration order
    pub fn all(&self) -> Vec<AgentflowNode> {
        NodeKind::ALL.into_iter().map(|kind| self.node(kind)).collect()
    }

    /// Check a node's configuration without running it
    pub fn validate(&self, data: &NodeData) -> Result<(), NodeError> {
        self.resolve(data)?.validate(data)
    }
}
