//! Native functions registered into every sandbox context

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction};
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

/// Globals removed before user code runs
pub const HIDDEN_GLOBALS: &[&str] = &[
    "process",
    "fs",
    "child_process",
    "util",
    "eval",
    "Function",
    "Reflect",
    "Proxy",
    "WebAssembly",
    "Symbol",
];

/// Register `btoa`, `atob` and the `__host` helpers used by module shims
pub fn register_all(context: &mut Context) -> JsResult<()> {
    register_base64(context)?;
    register_host(context)?;
    Ok(())
}

fn register_base64(context: &mut Context) -> JsResult<()> {
    let btoa = FunctionObjectBuilder::new(context.realm(), NativeFunction::from_fn_ptr(base64_btoa))
        .name(js_string!("btoa"))
        .length(1)
        .constructor(false)
        .build();
    let atob = FunctionObjectBuilder::new(context.realm(), NativeFunction::from_fn_ptr(base64_atob))
        .name(js_string!("atob"))
        .length(1)
        .constructor(false)
        .build();

    context.register_global_property(js_string!("btoa"), btoa, Attribute::all())?;
    context.register_global_property(js_string!("atob"), atob, Attribute::all())?;
    Ok(())
}

fn register_host(context: &mut Context) -> JsResult<()> {
    let mut initializer = ObjectInitializer::new(context);
    initializer
        .function(NativeFunction::from_fn_ptr(host_hash), js_string!("hash"), 3)
        .function(
            NativeFunction::from_fn_ptr(host_random_uuid),
            js_string!("randomUUID"),
            0,
        );
    let host = initializer.build();

    context.register_global_property(js_string!("__host"), host, Attribute::all())?;
    Ok(())
}

/// JavaScript that captures `console` output into `__console_logs`
pub const CONSOLE_PRELUDE: &str = r#"
var __console_logs = [];
var console = (function () {
    function write() {
        var parts = [];
        for (var i = 0; i < arguments.length; i++) {
            var arg = arguments[i];
            parts.push(typeof arg === 'object' && arg !== null ? JSON.stringify(arg) : String(arg));
        }
        __console_logs.push(parts.join(' '));
    }
    return { log: write, info: write, warn: write, error: write, debug: write };
})();
"#;

/// Replaces `constructor` on every function prototype, so code strings cannot
/// be compiled through `(function () {}).constructor` or its async and
/// generator variants once `Function` itself is gone
const CONSTRUCTOR_LOCKDOWN: &str = r#"
(function () {
    function blocked() {
        throw new EvalError('Dynamic code evaluation is not allowed');
    }
    var samples = [
        function () {},
        async function () {},
        function* () {},
        async function* () {}
    ];
    for (var i = 0; i < samples.length; i++) {
        Object.defineProperty(Object.getPrototypeOf(samples[i]), 'constructor', {
            value: blocked,
            writable: false,
            enumerable: false,
            configurable: false
        });
    }
})();
"#;

/// JavaScript that blocks dynamic code compilation and strips the hidden globals
pub fn lockdown_script() -> String {
    let mut script = String::from(CONSTRUCTOR_LOCKDOWN);
    for name in HIDDEN_GLOBALS {
        script.push_str(&format!(
            "try {{ delete globalThis['{0}']; }} catch (e) {{}}\n\
             if (typeof globalThis['{0}'] !== 'undefined') {{ globalThis['{0}'] = undefined; }}\n",
            name
        ));
    }
    script
}

fn base64_btoa(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let input = js_arg_to_string(args.first());
    Ok(JsValue::from(JsString::from(
        BASE64_STANDARD.encode(input.as_bytes()).as_str(),
    )))
}

fn base64_atob(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let input = js_arg_to_string(args.first());
    let decoded = BASE64_STANDARD
        .decode(input.as_bytes())
        .map_err(|_| JsNativeError::typ().with_message("Invalid base64 input"))?;
    let text = String::from_utf8(decoded)
        .map_err(|_| JsNativeError::typ().with_message("Invalid UTF-8 string"))?;
    Ok(JsValue::from(JsString::from(text.as_str())))
}

fn host_hash(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let algorithm = js_arg_to_string(args.first()).to_lowercase();
    let data = js_arg_to_string(args.get(1));
    let encoding = js_arg_to_string(args.get(2));

    let digest: Vec<u8> = match algorithm.as_str() {
        "sha256" => Sha256::digest(data.as_bytes()).to_vec(),
        "sha512" => Sha512::digest(data.as_bytes()).to_vec(),
        other => {
            return Err(JsNativeError::typ()
                .with_message(format!("Digest method not supported: {}", other))
                .into());
        }
    };

    let encoded = match encoding.as_str() {
        "" | "hex" => hex::encode(digest),
        "base64" => BASE64_STANDARD.encode(digest),
        other => {
            return Err(JsNativeError::typ()
                .with_message(format!("Unsupported digest encoding: {}", other))
                .into());
        }
    };

    Ok(JsValue::from(JsString::from(encoded.as_str())))
}

fn host_random_uuid(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let id = Uuid::new_v4().to_string();
    Ok(JsValue::from(JsString::from(id.as_str())))
}

fn js_arg_to_string(arg: Option<&JsValue>) -> String {
    arg.and_then(|v| v.as_string())
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default()
}
