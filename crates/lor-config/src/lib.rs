//! lor-config
//!
//! Layered YAML configuration for the relay daemon.
//!
//! - `load_layered_yaml*` merges documents in order (later overrides earlier),
//!   refuses secret-looking literals and computes a stable hash of the result.
//! - [`RelayConfig`] is the typed view the daemon consumes. Every key has a
//!   default, so an empty document is a valid config.
//! - [`secrets`] resolves values (RPC URL, API keys) from the environment by the
//!   variable NAMES stored in YAML.

pub mod relay;
pub mod secrets;

pub use relay::{
    ChainConfig, Commitment, HistoryConfig, OrderDefaults, RelayConfig, ServerConfig,
    SubmissionConfig, VenueConfig,
};
pub use secrets::{resolve_secrets, resolve_secrets_with, ResolvedSecrets};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Leaf string prefixes that indicate a credential pasted into YAML instead of
/// an env var name.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN", // PEM private keys
    "sk-",        // generic API secret keys
    "ghp_",       // GitHub PAT
    "xoxb-",      // Slack bot token
];

/// URL query fragments that carry RPC provider credentials.
const SECRET_URL_MARKERS: &[&str] = &["api-key=", "api_key=", "apikey=", "token="];

/// Length of a 64-byte ed25519 keypair encoded as base58.
const BASE58_KEYPAIR_LEN: std::ops::RangeInclusive<usize> = 86..=88;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view over the merged document.
    pub fn relay(&self) -> Result<RelayConfig> {
        RelayConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        // An empty document parses to null; treat it as "no overrides".
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaves(v, "", &mut leaves);

    for (ptr, leaf) in leaves {
        if let Some(s) = leaf.as_str() {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }

    // A keypair pasted as a JSON byte array shows up as a 64-element array of
    // small integers rather than as a string leaf.
    let mut arrays = Vec::new();
    collect_arrays(v, "", &mut arrays);
    for (ptr, arr) in arrays {
        if looks_like_keypair_bytes(arr) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn collect_leaves<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaves(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaves(vv, &next, out);
            }
        }
        leaf => {
            let p = if prefix.is_empty() { "/" } else { prefix };
            out.push((p.to_string(), leaf));
        }
    }
}

fn collect_arrays<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a [Value])>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_arrays(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            out.push((prefix.to_string(), arr.as_slice()));
            for (i, vv) in arr.iter().enumerate() {
                collect_arrays(vv, &format!("{}/{}", prefix, i), out);
            }
        }
        _ => {}
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    if SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) {
        return true;
    }
    if t.starts_with("http") {
        let lower = t.to_ascii_lowercase();
        return SECRET_URL_MARKERS.iter().any(|m| lower.contains(m));
    }
    BASE58_KEYPAIR_LEN.contains(&t.len()) && t.chars().all(is_base58_char)
}

fn looks_like_keypair_bytes(arr: &[Value]) -> bool {
    arr.len() == 64
        && arr
            .iter()
            .all(|v| v.as_u64().map(|n| n <= 255).unwrap_or(false))
}

fn is_base58_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l')
}
