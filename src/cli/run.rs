//! Run command - executes a flow definition once

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use futures::StreamExt;
use serde_json::Value;
use tracing::{error, info};

use crate::domain::{CredentialResolver, StreamSink, VariableStore};
use crate::infrastructure::credentials::{EnvCredentialResolver, InMemoryCredentialResolver};
use crate::infrastructure::runner::FlowRunRequest;
use crate::infrastructure::streaming::ChannelStreamer;
use crate::infrastructure::variables::InMemoryVariableStore;

const STREAM_BUFFER: usize = 64;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the flow definition JSON
    #[arg(short, long)]
    pub flow: PathBuf,

    /// The user question fed to the first node
    #[arg(short, long, default_value = "")]
    pub input: String,

    /// Reuse an existing chat id
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Session id, defaults to the chat id
    #[arg(long)]
    pub session_id: Option<String>,

    /// JSON file with project variables, `{ "<name>": <value> }`
    #[arg(long)]
    pub vars: Option<PathBuf>,

    /// JSON file with credentials, `{ "<id>": { "<field>": "<value>" } }`;
    /// environment credentials are used when absent
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Override config JSON, e.g. `{"vars": {"name": "value"}}`
    #[arg(long)]
    pub override_config: Option<String>,

    /// Server hosting sub-flows for Execute Flow nodes
    #[arg(long)]
    pub base_url: Option<String>,

    /// Echo streamed events to stderr as server-sent events
    #[arg(long)]
    pub stream: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();
    let flow = super::read_flow(&args.flow)?;

    let variables: Arc<dyn VariableStore> = match &args.vars {
        Some(path) => Arc::new(InMemoryVariableStore::from_value(&super::read_json(path)?)?),
        None => Arc::new(InMemoryVariableStore::new()),
    };
    let credentials: Arc<dyn CredentialResolver> = match &args.credentials {
        Some(path) => Arc::new(InMemoryCredentialResolver::from_value(&super::read_json(path)?)?),
        None => Arc::new(EnvCredentialResolver::new().with_defaults()),
    };

    let runner = crate::create_runner(&config, credentials, variables);
    let request = build_request(&args)?;

    let (streamer, printer) = if args.stream {
        let (streamer, mut frames) = ChannelStreamer::channel(STREAM_BUFFER);
        let printer = tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                eprint!("{}", frame.to_sse_string());
            }
        });
        (Some(Arc::new(streamer) as Arc<dyn StreamSink>), Some(printer))
    } else {
        (None, None)
    };

    let result = runner.run(&flow, request, streamer).await;

    // runner dropped its sink clones; the channel closes once the printer drains it
    if let Some(printer) = printer {
        printer.await.context("Stream printer failed")?;
    }

    let result = result.inspect_err(|e| error!(flow_id = %flow.id, error = %e, "Flow run failed"))?;
    info!(
        flow_id = %result.chatflow_id,
        chat_id = %result.chat_id,
        duration_ms = result.duration_ms,
        "Flow completed"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

fn build_request(args: &RunArgs) -> anyhow::Result<FlowRunRequest> {
    let mut request = FlowRunRequest::new(args.input.clone());

    if let Some(chat_id) = &args.chat_id {
        request = request.with_chat_id(chat_id.clone());
    }
    request.session_id = args.session_id.clone();

    if let Some(raw) = &args.override_config {
        let override_config: Value =
            serde_json::from_str(raw).context("--override-config must be valid JSON")?;
        request = request.with_override_config(override_config);
    }

    if let Some(base_url) = &args.base_url {
        request = request.with_base_url(base_url.clone());
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_build_request_from_args() {
        let cli = TestCli::parse_from([
            "agentflow",
            "--flow",
            "flow.json",
            "-i",
            "hello",
            "--chat-id",
            "chat-9",
            "--override-config",
            r#"{"vars":{"tone":"dry"}}"#,
            "--base-url",
            "http://localhost:3000",
        ]);

        let request = build_request(&cli.args).unwrap();

        assert_eq!(request.question, "hello");
        assert_eq!(request.chat_id.as_deref(), Some("chat-9"));
        assert!(request.session_id.is_none());
        assert_eq!(request.override_config, Some(json!({"vars": {"tone": "dry"}})));
        assert_eq!(request.base_url.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_build_request_rejects_bad_override() {
        let cli = TestCli::parse_from([
            "agentflow",
            "--flow",
            "flow.json",
            "--override-config",
            "{nope",
        ]);
        assert!(build_request(&cli.args).is_err());
    }
}
