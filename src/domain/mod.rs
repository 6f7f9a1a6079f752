//! Domain layer - node contract, flow state and collaborator seams

pub mod condition;
pub mod credentials;
pub mod error;
pub mod http;
pub mod llm;
pub mod message;
pub mod moderation;
pub mod node;
pub mod sandbox;
pub mod state;
pub mod streaming;
pub mod variable;

pub use condition::{ConditionClause, ConditionOperation, ConditionSet, ConditionType, EvaluatedConditions};
pub use credentials::{get_credential_param, CredentialData, CredentialResolver};
pub use error::DomainError;
pub use http::{HttpError, HttpRequestSpec, HttpResponse, HttpTransport};
pub use llm::{ChatModel, ChatModelConfig, ChatModelFactory, TokenStream};
pub use message::{ChatMessage, MessageRole};
pub use moderation::{InputModeration, ModerationVerdict, SimplePromptModeration};
pub use node::{
    FlowNode, NodeData, NodeError, NodeInputParam, NodeInstance, NodeKind, NodeOutputEnvelope,
    NodeRunError, RunOptions,
};
pub use sandbox::{CodeSandbox, SandboxDescriptor, SandboxError, SandboxLimits};
pub use state::{apply_state_updates, FlowState, StateUpdateDirective};
pub use streaming::{StreamEvent, StreamSink};
pub use variable::{FlowContext, FlowVariable, VariableResolver, VariableSet, VariableStore};
