//! Variable resolution layer
//!
//! Configured node fields may reference values from outside the node:
//! - `$vars.<name>` - project variables from the variable store
//! - `$flow.<path>` - the per-run flow context
//! - `$<nodeId>` - a prior node's output found in chat history
//! - `{{ output }}` - the current node's output inside state directives
//!
//! [`VariableToken`] is the parsed form; [`VariableResolver`] is the single
//! place tokens are turned back into values.

mod flow_context;
mod path;
mod resolver;
mod store;
mod token;

pub use flow_context::FlowContext;
pub use path::{get_nested_field, value_to_output_string, value_to_string};
pub use resolver::VariableResolver;
pub use store::{build_variable_set, FlowVariable, VariableSet, VariableStore};
pub use token::{parse_template, TemplatePart, VariableToken};
