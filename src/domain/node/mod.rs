//! Node contract shared by every executable node kind

mod contract;
mod data;
mod envelope;
mod error;
mod input;
mod kind;
mod options;

pub use contract::{FlowNode, NodeInstance};
pub use data::NodeData;
pub use envelope::{NodeOutputEnvelope, NodeRunError};
pub use error::NodeError;
pub use input::{input_or_default, validate_inputs, InputType, NodeInputParam};
pub use kind::NodeKind;
pub use options::{AgentflowRuntime, RunOptions};
