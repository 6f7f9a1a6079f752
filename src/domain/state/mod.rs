//! Flow state and declared state mutations

mod directive;
mod flow_state;

pub use directive::{apply_state_updates, StateUpdateDirective};
pub use flow_state::FlowState;
