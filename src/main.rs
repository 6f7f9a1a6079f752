use agentflow_runtime::cli::{self, Cli, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cli::run::run(args).await,
        Command::Check(args) => cli::check::run(args).await,
        Command::Nodes(args) => cli::nodes::run(args).await,
    }
}
