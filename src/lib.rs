//! Agentflow runtime
//!
//! Executes agentflow nodes against a shared flow state:
//! - Start, Condition, Custom Function, Execute Flow, HTTP, LLM and Direct Reply nodes
//! - `$vars` / `$flow` / node-output variable resolution
//! - Sandboxed JavaScript execution with module allow-lists
//! - Token streaming to chat clients

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::{CredentialResolver, VariableStore};
use infrastructure::{
    http::ReqwestTransport,
    llm::OpenAiChatModelFactory,
    nodes::{NodeRegistry, NodeServices},
    runner::FlowRunner,
    sandbox::BoaSandbox,
};

/// Wire the production collaborators into a flow runner
pub fn create_runner(
    config: &AppConfig,
    credentials: Arc<dyn CredentialResolver>,
    variables: Arc<dyn VariableStore>,
) -> FlowRunner {
    let http = Arc::new(ReqwestTransport::with_timeout(std::time::Duration::from_secs(
        config.http.timeout_secs,
    )));
    let sandbox = Arc::new(BoaSandbox::new(config.sandbox.boa_options()));
    let chat_models = Arc::new(OpenAiChatModelFactory::new(http.clone()));

    let services = NodeServices::new(sandbox, http, credentials, variables, chat_models)
        .with_settings(config.runtime_settings());

    FlowRunner::with_config(NodeRegistry::new(services), config.runner_config())
}
