//! Check command - validates a flow definition

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::info;

use crate::infrastructure::credentials::InMemoryCredentialResolver;
use crate::infrastructure::variables::InMemoryVariableStore;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the flow definition JSON
    #[arg(short, long)]
    pub flow: PathBuf,
}

pub async fn run(args: CheckArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();
    let flow = super::read_flow(&args.flow)?;

    let runner = crate::create_runner(
        &config,
        Arc::new(InMemoryCredentialResolver::new()),
        Arc::new(InMemoryVariableStore::new()),
    );
    runner.validate(&flow)?;

    info!(flow_id = %flow.id, nodes = flow.nodes.len(), "Flow definition is valid");
    println!("{}: {} node(s) OK", flow.id, flow.nodes.len());

    Ok(())
}
