//! Runtime secret resolution.
//!
//! # Contract
//! - YAML stores only env var NAMES (`chain.rpc_url_env`, `venue.api_key_env`).
//! - The daemon calls [`resolve_secrets`] once at startup and hands the result
//!   to client constructors. Nothing else reads these variables.
//! - `Debug` output redacts values; errors name the variable, never the value.

use anyhow::{bail, Result};

use crate::RelayConfig;

/// Secrets resolved for one daemon instance. **Values are redacted in `Debug`.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Full JSON-RPC URL. Providers commonly embed an API key in it.
    pub rpc_url: String,
    /// Optional venue API key, sent as `x-api-key`.
    pub venue_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("rpc_url", &"<REDACTED>")
            .field(
                "venue_api_key",
                &self.venue_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Read a named environment variable; blank counts as unset.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_secrets(cfg: &RelayConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, resolve_env)
}

/// Resolve secrets through an arbitrary lookup (tests pass a closure over a map).
///
/// # Errors
/// `SECRETS_MISSING` naming the variable when the RPC URL is unset, and
/// `SECRETS_INVALID` when it is not an http(s) URL.
pub fn resolve_secrets_with<F>(cfg: &RelayConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let rpc_var = cfg.chain.rpc_url_env.trim();
    let Some(rpc_url) = lookup(rpc_var).filter(|v| !v.trim().is_empty()) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (chain rpc url) is not set or empty",
            rpc_var
        );
    };

    let rpc_url = rpc_url.trim().to_string();
    if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
        bail!(
            "SECRETS_INVALID: env var '{}' must hold an http(s) url",
            rpc_var
        );
    }

    let venue_api_key = cfg
        .venue
        .api_key_env
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .and_then(|name| lookup(name))
        .filter(|v| !v.trim().is_empty());

    Ok(ResolvedSecrets {
        rpc_url,
        venue_api_key,
    })
}
