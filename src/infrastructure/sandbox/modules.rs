//! `require()` for user code: allow-list enforcement and host module shims

use std::collections::BTreeSet;

use crate::domain::sandbox::{module_root, SandboxLimits};

const MODULE_SHIMS: &str = r#"
var __shims = {};
__shims.crypto = {
    randomUUID: function () { return __host.randomUUID(); },
    createHash: function (algorithm) {
        var data = '';
        return {
            update: function (chunk) { data += String(chunk); return this; },
            digest: function (encoding) { return __host.hash(algorithm, data, encoding || 'hex'); }
        };
    }
};
__shims.uuid = { v4: function () { return __host.randomUUID(); } };
__shims.path = {
    sep: '/',
    join: function () {
        var parts = [];
        for (var i = 0; i < arguments.length; i++) {
            if (arguments[i]) { parts.push(String(arguments[i])); }
        }
        return parts.join('/').replace(/\/+/g, '/');
    },
    basename: function (p, ext) {
        var base = String(p).replace(/\/+$/, '').split('/').pop();
        if (ext && base.slice(-ext.length) === ext) { base = base.slice(0, -ext.length); }
        return base;
    },
    dirname: function (p) {
        var parts = String(p).replace(/\/+$/, '').split('/');
        parts.pop();
        return parts.length === 0 ? '.' : (parts.join('/') || '/');
    },
    extname: function (p) {
        var base = String(p).split('/').pop();
        var idx = base.lastIndexOf('.');
        return idx > 0 ? base.slice(idx) : '';
    }
};
__shims.querystring = {
    stringify: function (obj) {
        return Object.keys(obj || {}).map(function (k) {
            return encodeURIComponent(k) + '=' + encodeURIComponent(String(obj[k]));
        }).join('&');
    },
    parse: function (str) {
        var out = {};
        String(str || '').split('&').forEach(function (pair) {
            if (!pair) { return; }
            var idx = pair.indexOf('=');
            var k = idx < 0 ? pair : pair.slice(0, idx);
            var v = idx < 0 ? '' : pair.slice(idx + 1);
            out[decodeURIComponent(k)] = decodeURIComponent(v.replace(/\+/g, ' '));
        });
        return out;
    }
};
__shims.assert = (function () {
    function fail(message) {
        var err = new Error(message || 'Assertion failed');
        err.name = 'AssertionError';
        throw err;
    }
    function assert(value, message) { if (!value) { fail(message); } }
    assert.ok = assert;
    assert.equal = function (a, b, m) { if (a != b) { fail(m || (a + ' == ' + b)); } };
    assert.strictEqual = function (a, b, m) { if (a !== b) { fail(m || (a + ' === ' + b)); } };
    assert.notStrictEqual = function (a, b, m) { if (a === b) { fail(m || (a + ' !== ' + b)); } };
    assert.deepStrictEqual = function (a, b, m) {
        if (JSON.stringify(a) !== JSON.stringify(b)) { fail(m || 'Values are not deeply equal'); }
    };
    return assert;
})();
"#;

/// Build the script that defines `require` for one execution
pub fn require_prelude(limits: &SandboxLimits) -> String {
    let allowed: BTreeSet<&str> = limits
        .allowed_builtin_modules
        .iter()
        .chain(limits.allowed_external_modules.iter())
        .map(|m| module_root(m))
        .filter(|root| limits.is_module_allowed(root))
        .collect();

    let allowed_json = serde_json::to_string(&allowed).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"{shims}
var require = (function (allowed) {{
    var allowedSet = {{}};
    allowed.forEach(function (m) {{ allowedSet[m] = true; }});
    function moduleRoot(name) {{
        var spec = String(name);
        if (spec.indexOf('node:') === 0) {{ spec = spec.slice(5); }}
        var parts = spec.split('/');
        return spec.charAt(0) === '@' && parts.length > 1 ? parts[0] + '/' + parts[1] : parts[0];
    }}
    function moduleError(name, kind, message) {{
        var err = new Error(message);
        err.name = kind;
        err.module = String(name);
        return err;
    }}
    return function require(name) {{
        var root = moduleRoot(name);
        if (!allowedSet[root]) {{
            throw moduleError(name, 'ModuleNotAllowedError', "Module '" + name + "' is not allowed");
        }}
        if (Object.prototype.hasOwnProperty.call(__shims, root)) {{
            return __shims[root];
        }}
        throw moduleError(name, 'ModuleUnavailableError', "Module '" + name + "' is not available");
    }};
}})({allowed});
"#,
        shims = MODULE_SHIMS,
        allowed = allowed_json,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_excludes_denied_modules() {
        let mut limits = SandboxLimits::default();
        limits.allowed_builtin_modules.push("fs".to_string());

        let prelude = require_prelude(&limits);

        assert!(prelude.contains("\"crypto\""));
        assert!(prelude.contains("\"lodash\""));
        assert!(!prelude.contains("\"fs\""));
    }

    #[test]
    fn test_prelude_normalizes_allow_list_entries() {
        let limits = SandboxLimits {
            allowed_builtin_modules: vec!["node:path".to_string(), "node:fs".to_string()],
            allowed_external_modules: vec!["lodash/fp".to_string()],
            ..Default::default()
        };

        let prelude = require_prelude(&limits);

        assert!(prelude.contains(r#"["lodash","path"]"#));
        assert!(!prelude.contains("\"fs\""));
    }
}
