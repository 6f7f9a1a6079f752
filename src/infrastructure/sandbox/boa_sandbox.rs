//! JavaScript sandbox backed by the boa interpreter
//!
//! Each execution gets a fresh context with no filesystem, process or network
//! access. Boa is synchronous and cannot be interrupted, so every script runs
//! on its own thread while the caller awaits with a wall-clock timeout. A
//! semaphore caps how many of those threads exist at once; a script that
//! outlives its timeout keeps its slot until boa's loop or recursion limit
//! stops it.

use async_trait::async_trait;
use boa_engine::{Context, JsError, Source};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, warn};

use super::builtins::{self, CONSOLE_PRELUDE};
use super::modules::require_prelude;
use crate::domain::sandbox::{CodeSandbox, SandboxDescriptor, SandboxError, SandboxLimits};

static BINDING_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

/// Interpreter limits that back the wall-clock timeout
#[derive(Debug, Clone)]
pub struct BoaSandboxOptions {
    /// Max iterations of any single loop
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    /// Max user code size in bytes
    pub max_code_length: usize,
    /// Interpreter threads alive at once, including timed-out ones
    pub max_concurrent_scripts: usize,
}

impl Default for BoaSandboxOptions {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 50_000_000,
            recursion_limit: 512,
            max_code_length: 1_000_000,
            max_concurrent_scripts: 16,
        }
    }
}

/// [`CodeSandbox`] implementation running user code in boa
#[derive(Debug, Clone)]
pub struct BoaSandbox {
    options: BoaSandboxOptions,
    slots: Arc<Semaphore>,
}

impl Default for BoaSandbox {
    fn default() -> Self {
        Self::new(BoaSandboxOptions::default())
    }
}

/// Settled state of the user function's promise, as serialized by the script
#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    done: bool,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    module: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScriptReport {
    result: ScriptOutcome,
    #[serde(default)]
    logs: Vec<String>,
}

const RESULT_SCRIPT: &str = r#"
(function () {
    try {
        return JSON.stringify({ result: __result, logs: __console_logs });
    } catch (e) {
        return JSON.stringify({
            result: { done: true, ok: false, name: 'TypeError', message: 'Return value is not serializable: ' + e.message },
            logs: __console_logs
        });
    }
})();
"#;

impl BoaSandbox {
    pub fn new(options: BoaSandboxOptions) -> Self {
        let slots = Arc::new(Semaphore::new(options.max_concurrent_scripts.max(1)));
        Self { options, slots }
    }

    /// Wait for a free slot, then run the script on a dedicated thread
    async fn spawn_script(&self, script: String, timeout_ms: u64) -> Result<Value, SandboxError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SandboxError::internal(format!("Sandbox is shut down: {}", e)))?;

        let sandbox = self.clone();
        let (tx, rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("agentflow-sandbox".to_string())
            .spawn(move || {
                let result = sandbox.run_script(&script, timeout_ms);
                drop(permit);
                // receiver is gone when the caller already timed out
                let _ = tx.send(result);
            })
            .map_err(|e| SandboxError::internal(format!("Failed to start sandbox thread: {}", e)))?;

        rx.await
            .map_err(|_| SandboxError::internal("Sandbox thread exited without a result"))?
    }

    /// Assemble prelude, bindings, lockdown and the wrapped user code
    fn build_script(
        &self,
        code: &str,
        descriptor: &SandboxDescriptor,
        limits: &SandboxLimits,
    ) -> Result<String, SandboxError> {
        let mut script = String::with_capacity(code.len() + 4096);
        script.push_str(CONSOLE_PRELUDE);
        script.push_str(&require_prelude(limits));

        for (name, value) in descriptor.bindings() {
            if !BINDING_NAME_PATTERN.is_match(&name) {
                warn!(binding = %name, "Skipping sandbox binding with an invalid identifier");
                continue;
            }
            script.push_str(&format!("var {} = {};\n", name, json_literal(&value)?));
        }

        script.push_str(&builtins::lockdown_script());
        script.push_str(
            "var __result = { done: false };\n(async function () {\n",
        );
        script.push_str(code);
        script.push_str(
            r#"
})().then(
    function (value) {
        __result = { done: true, ok: true, value: value === undefined ? null : value };
    },
    function (err) {
        var isObject = err !== null && typeof err === 'object';
        __result = {
            done: true,
            ok: false,
            name: isObject && err.name ? String(err.name) : 'Error',
            message: isObject && err.message !== undefined ? String(err.message) : String(err),
            module: isObject && err.module ? String(err.module) : null
        };
    }
);
"#,
        );

        Ok(script)
    }

    fn run_script(&self, script: &str, timeout_ms: u64) -> Result<Value, SandboxError> {
        let started = Instant::now();
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.options.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.options.recursion_limit);

        builtins::register_all(&mut context)
            .map_err(|e| SandboxError::internal(format!("Failed to register builtins: {}", e)))?;

        context
            .eval(Source::from_bytes(script))
            .map_err(|e| classify_js_error(&e, timeout_ms))?;

        context.run_jobs();

        let report = context
            .eval(Source::from_bytes(RESULT_SCRIPT))
            .map_err(|e| classify_js_error(&e, timeout_ms))?;

        let report = report
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .ok_or_else(|| SandboxError::internal("Sandbox result was not a string"))?;

        let report: ScriptReport = serde_json::from_str(&report)
            .map_err(|e| SandboxError::internal(format!("Failed to parse sandbox result: {}", e)))?;

        for line in &report.logs {
            debug!(target: "agentflow::sandbox", "{}", line);
        }

        if started.elapsed() > Duration::from_millis(timeout_ms) {
            return Err(SandboxError::timeout(timeout_ms));
        }

        outcome_to_result(report.result, timeout_ms)
    }
}

#[async_trait]
impl CodeSandbox for BoaSandbox {
    async fn execute(
        &self,
        code: &str,
        descriptor: SandboxDescriptor,
        limits: &SandboxLimits,
    ) -> Result<Value, SandboxError> {
        if code.len() > self.options.max_code_length {
            return Err(SandboxError::internal(format!(
                "Code exceeds maximum length of {} bytes",
                self.options.max_code_length
            )));
        }

        let script = self.build_script(code, &descriptor, limits)?;
        let timeout_ms = limits.timeout_ms;

        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.spawn_script(script, timeout_ms),
        )
        .await
        {
            Err(_) => {
                warn!(timeout_ms, "Sandbox script timed out");
                Err(SandboxError::timeout(timeout_ms))
            }
            Ok(result) => result,
        }
    }
}

/// Double-encode so the JSON arrives as a string literal, then parse in-script
fn json_literal(value: &Value) -> Result<String, SandboxError> {
    let json = serde_json::to_string(value)
        .map_err(|e| SandboxError::internal(format!("Failed to serialize binding: {}", e)))?;
    let literal = serde_json::to_string(&json)
        .map_err(|e| SandboxError::internal(format!("Failed to serialize binding: {}", e)))?;
    Ok(format!("JSON.parse({})", literal))
}

fn classify_js_error(err: &JsError, timeout_ms: u64) -> SandboxError {
    let message = err.to_string();

    if is_limit_message(&message) {
        return SandboxError::timeout(timeout_ms);
    }

    if message.starts_with("SyntaxError") {
        return SandboxError::syntax(message);
    }

    SandboxError::runtime(message)
}

fn is_limit_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("loop iteration limit") || lowered.contains("recursion limit")
}

fn outcome_to_result(outcome: ScriptOutcome, timeout_ms: u64) -> Result<Value, SandboxError> {
    // a promise that never settles would hang until the timeout
    if !outcome.done {
        return Err(SandboxError::timeout(timeout_ms));
    }

    if outcome.ok {
        return Ok(outcome.value);
    }

    let name = outcome.name.unwrap_or_else(|| "Error".to_string());
    let message = outcome.message.unwrap_or_default();

    if is_limit_message(&message) {
        return Err(SandboxError::timeout(timeout_ms));
    }

    Err(match name.as_str() {
        "ModuleNotAllowedError" => SandboxError::disallowed_module(outcome.module.unwrap_or_default()),
        "ModuleUnavailableError" => SandboxError::module_unavailable(outcome.module.unwrap_or_default()),
        "SyntaxError" => SandboxError::syntax(format!("{}: {}", name, message)),
        _ => SandboxError::runtime(format!("{}: {}", name, message)),
    })
}
