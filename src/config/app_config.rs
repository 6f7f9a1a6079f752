use serde::Deserialize;
use std::time::Duration;

use crate::domain::sandbox::{SandboxLimits, DEFAULT_BUILTIN_MODULES, DEFAULT_EXTERNAL_MODULES};
use crate::infrastructure::nodes::RuntimeSettings;
use crate::infrastructure::runner::FlowRunnerConfig;
use crate::infrastructure::sandbox::BoaSandboxOptions;

/// Comma-separated builtin modules added to the sandbox allow-list
pub const BUILTIN_DEP_ENV: &str = "TOOL_FUNCTION_BUILTIN_DEP";
/// Comma-separated external modules added to the sandbox allow-list
pub const EXTERNAL_DEP_ENV: &str = "TOOL_FUNCTION_EXTERNAL_DEP";
pub const DEBUG_ENV: &str = "DEBUG";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub sandbox: SandboxConfig,
    pub http: HttpConfig,
    pub runtime: RuntimeConfig,
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub timeout_ms: u64,
    pub builtin_modules: Vec<String>,
    pub external_modules: Vec<String>,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    pub max_code_length: usize,
    pub max_concurrent_scripts: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Server hosting sub-flows when neither node nor request names one
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub moderation_delay_ms: u64,
    pub max_nodes: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        let options = BoaSandboxOptions::default();

        Self {
            timeout_ms: limits.timeout_ms,
            builtin_modules: DEFAULT_BUILTIN_MODULES.iter().map(|m| m.to_string()).collect(),
            external_modules: DEFAULT_EXTERNAL_MODULES.iter().map(|m| m.to_string()).collect(),
            loop_iteration_limit: options.loop_iteration_limit,
            recursion_limit: options.recursion_limit,
            max_code_length: options.max_code_length,
            max_concurrent_scripts: options.max_concurrent_scripts,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            base_url: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            moderation_delay_ms: 500,
            max_nodes: FlowRunnerConfig::default().max_nodes,
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> SandboxLimits {
        SandboxLimits {
            timeout_ms: self.timeout_ms,
            allowed_builtin_modules: self.builtin_modules.clone(),
            allowed_external_modules: self.external_modules.clone(),
        }
    }

    pub fn boa_options(&self) -> BoaSandboxOptions {
        BoaSandboxOptions {
            loop_iteration_limit: self.loop_iteration_limit,
            recursion_limit: self.recursion_limit,
            max_code_length: self.max_code_length,
            max_concurrent_scripts: self.max_concurrent_scripts,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: Self = config.try_deserialize()?;
        app_config.apply_legacy_env(|name| std::env::var(name).ok());

        Ok(app_config)
    }

    /// Fold the legacy `TOOL_FUNCTION_*` and `DEBUG` knobs into the config
    pub fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(extra) = lookup(BUILTIN_DEP_ENV) {
            merge_module_list(&mut self.sandbox.builtin_modules, &extra);
        }

        if let Some(extra) = lookup(EXTERNAL_DEP_ENV) {
            merge_module_list(&mut self.sandbox.external_modules, &extra);
        }

        if let Some(flag) = lookup(DEBUG_ENV) {
            if matches!(flag.trim().to_ascii_lowercase().as_str(), "true" | "1") {
                self.debug = true;
            }
        }

        if self.debug {
            self.logging.level = "debug".to_string();
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            sandbox_limits: self.sandbox.limits(),
            http_timeout: Duration::from_secs(self.http.timeout_secs),
            default_base_url: self.http.base_url.clone().filter(|u| !u.trim().is_empty()),
            moderation_delay: Duration::from_millis(self.runtime.moderation_delay_ms),
        }
    }

    pub fn runner_config(&self) -> FlowRunnerConfig {
        FlowRunnerConfig {
            max_nodes: self.runtime.max_nodes,
        }
    }
}

fn merge_module_list(modules: &mut Vec<String>, extra: &str) {
    for module in extra.split(',').map(str::trim).filter(|m| !m.is_empty()) {
        if !modules.iter().any(|m| m == module) {
            modules.push(module.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sandbox.limits(), SandboxLimits::default());
        assert_eq!(config.http.timeout_secs, 60);

        let settings = config.runtime_settings();
        assert_eq!(settings.moderation_delay, Duration::from_millis(500));
        assert!(settings.default_base_url.is_none());
    }

    #[test]
    fn test_legacy_module_lists_are_merged() {
        let mut config = AppConfig::default();
        config.apply_legacy_env(lookup(&[
            (BUILTIN_DEP_ENV, "os, crypto ,"),
            (EXTERNAL_DEP_ENV, "dayjs"),
        ]));

        let limits = config.sandbox.limits();
        assert!(limits.is_module_allowed("os"));
        assert!(limits.is_module_allowed("dayjs"));
        assert_eq!(
            limits
                .allowed_builtin_modules
                .iter()
                .filter(|m| m.as_str() == "crypto")
                .count(),
            1
        );
        assert!(!limits.is_module_allowed("fs"));
    }

    #[test]
    fn test_debug_flag_raises_log_level() {
        let mut config = AppConfig::default();
        config.apply_legacy_env(lookup(&[(DEBUG_ENV, "TRUE")]));
        assert!(config.debug);
        assert_eq!(config.logging.level, "debug");

        let mut config = AppConfig::default();
        config.apply_legacy_env(lookup(&[(DEBUG_ENV, "no")]));
        assert!(!config.debug);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "sandbox": {"timeout_ms": 2000},
            "http": {"base_url": "http://localhost:3000"}
        }))
        .unwrap();

        assert_eq!(config.sandbox.timeout_ms, 2000);
        assert_eq!(config.sandbox.recursion_limit, 512);
        assert_eq!(config.sandbox.max_concurrent_scripts, 16);
        assert_eq!(
            config.runtime_settings().default_base_url.as_deref(),
            Some("http://localhost:3000")
        );
    }
}
