//! Bindings and limits for one sandboxed execution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Modules that can never be required, whatever the allow-lists say
pub const DENIED_MODULES: &[&str] = &[
    "fs",
    "child_process",
    "process",
    "util",
    "worker_threads",
    "vm",
    "cluster",
    "module",
    "v8",
];

/// Builtin modules allowed when no override is configured
pub const DEFAULT_BUILTIN_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "crypto",
    "events",
    "http",
    "https",
    "net",
    "path",
    "querystring",
    "timers",
    "url",
    "zlib",
];

/// External modules the host makes available out of the box
pub const DEFAULT_EXTERNAL_MODULES: &[&str] =
    &["axios", "cheerio", "lodash", "moment", "node-fetch", "uuid", "zod"];

/// Hard limits and module allow-lists for a single execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxLimits {
    pub timeout_ms: u64,
    pub allowed_builtin_modules: Vec<String>,
    pub allowed_external_modules: Vec<String>,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            allowed_builtin_modules: DEFAULT_BUILTIN_MODULES.iter().map(|m| m.to_string()).collect(),
            allowed_external_modules: DEFAULT_EXTERNAL_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl SandboxLimits {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Check a `require()` target against the deny-list and both allow-lists
    ///
    /// Subpaths (`lodash/fp`) and `node:` prefixes are checked by their root module.
    pub fn is_module_allowed(&self, module: &str) -> bool {
        let root = module_root(module);
        if DENIED_MODULES.contains(&root) {
            return false;
        }

        self.allowed_builtin_modules
            .iter()
            .chain(self.allowed_external_modules.iter())
            .any(|m| module_root(m) == root)
    }
}

/// Root package name of a module specifier
pub fn module_root(module: &str) -> &str {
    let module = module.strip_prefix("node:").unwrap_or(module);

    if module.starts_with('@') {
        // scoped packages keep their scope: @scope/name
        let mut split = module.splitn(3, '/');
        let scope = split.next().unwrap_or_default();
        return match split.next() {
            Some(name) => &module[..scope.len() + 1 + name.len()],
            None => module,
        };
    }

    module.split('/').next().unwrap_or(module)
}

/// Injected bindings for one sandboxed execution
///
/// Every execution gets `$vars`, `$flow` and `$input`; each declared input
/// variable is additionally bound as `$<name>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SandboxDescriptor {
    pub vars: Value,
    pub flow: Value,
    pub input: Value,
    pub variables: Map<String, Value>,
}

impl SandboxDescriptor {
    pub fn new(vars: Value, flow: Value, input: impl Into<Value>) -> Self {
        Self {
            vars,
            flow,
            input: input.into(),
            variables: Map::new(),
        }
    }

    /// Bind a declared variable; a leading `$` in the name is optional
    pub fn with_variable(mut self, name: &str, value: Value) -> Self {
        let name = name.strip_prefix('$').unwrap_or(name);
        self.variables.insert(name.to_string(), value);
        self
    }

    /// All global bindings as `(identifier, value)` pairs
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = vec![
            ("$vars".to_string(), self.vars.clone()),
            ("$flow".to_string(), self.flow.clone()),
            ("$input".to_string(), self.input.clone()),
        ];

        bindings.extend(
            self.variables
                .iter()
                .map(|(name, value)| (format!("${}", name), value.clone())),
        );

        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_root() {
        assert_eq!(module_root("lodash"), "lodash");
        assert_eq!(module_root("lodash/fp"), "lodash");
        assert_eq!(module_root("node:crypto"), "crypto");
        assert_eq!(module_root("@aws-sdk/client-s3/dist"), "@aws-sdk/client-s3");
    }

    #[test]
    fn test_module_allow_lists() {
        let limits = SandboxLimits::default();

        assert!(limits.is_module_allowed("crypto"));
        assert!(limits.is_module_allowed("node:path"));
        assert!(limits.is_module_allowed("lodash/fp"));
        assert!(!limits.is_module_allowed("fs"));
        assert!(!limits.is_module_allowed("left-pad"));
    }

    #[test]
    fn test_denied_modules_win_over_allow_list() {
        let mut limits = SandboxLimits::default();
        limits.allowed_builtin_modules.push("fs".to_string());
        limits.allowed_builtin_modules.push("child_process".to_string());

        assert!(!limits.is_module_allowed("fs"));
        assert!(!limits.is_module_allowed("child_process"));
    }

    #[test]
    fn test_bindings() {
        let descriptor = SandboxDescriptor::new(json!({"k": 1}), json!({"chatId": "c"}), "hi")
            .with_variable("name", json!("Ada"))
            .with_variable("$count", json!(2));

        let bindings = descriptor.bindings();
        let names: Vec<_> = bindings.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(names, vec!["$vars", "$flow", "$input", "$count", "$name"]);
        assert_eq!(bindings[2].1, json!("hi"));
    }
}
