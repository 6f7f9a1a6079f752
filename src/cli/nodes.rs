//! Nodes command - lists node types

use std::sync::Arc;

use clap::Args;
use serde_json::json;

use crate::domain::node::NodeKind;
use crate::domain::FlowNode;
use crate::infrastructure::credentials::InMemoryCredentialResolver;
use crate::infrastructure::nodes::NodeRegistry;
use crate::infrastructure::variables::InMemoryVariableStore;

#[derive(Args, Debug)]
pub struct NodesArgs {
    /// Print each node's declared inputs as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: NodesArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();
    let runner = crate::create_runner(
        &config,
        Arc::new(InMemoryCredentialResolver::new()),
        Arc::new(InMemoryVariableStore::new()),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&describe(runner.registry()))?);
        return Ok(());
    }

    for node in runner.registry().all() {
        let kind = node.kind();
        println!("{:<26} {:<16} {}", kind.name(), kind.label(), node.description());
    }

    Ok(())
}

pub fn describe(registry: &NodeRegistry) -> serde_json::Value {
    let nodes: Vec<_> = NodeKind::ALL
        .into_iter()
        .map(|kind| {
            let node = registry.node(kind);
            json!({
                "name": kind.name(),
                "label": kind.label(),
                "description": node.description(),
                "inputs": node.declare_inputs(),
            })
        })
        .collect();

    json!(nodes)
}
