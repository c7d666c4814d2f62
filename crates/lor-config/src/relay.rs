//! Typed relay configuration.
//!
//! Built from the merged config JSON. Unknown keys are rejected so a typo in
//! YAML fails at boot instead of silently falling back to a default.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound the venue accepts for a history page.
pub const MAX_HISTORY_TAKE: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub venue: VenueConfig,
    pub submission: SubmissionConfig,
    pub history: HistoryConfig,
    pub orders: OrderDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Commitment level a submission must reach before it counts as confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// Whether a status reported by the node satisfies this level.
    pub fn is_satisfied_by(&self, reported: &str) -> bool {
        let rank = |s: &str| match s {
            "processed" => 0,
            "confirmed" => 1,
            "finalized" => 2,
            _ => -1,
        };
        rank(reported) >= rank(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// NAME of the env var holding the RPC URL (the URL may embed a key).
    pub rpc_url_env: String,
    pub commitment: Commitment,
    pub rpc_timeout_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url_env: "SOLANA_RPC_ENDPOINT".to_string(),
            commitment: Commitment::Confirmed,
            rpc_timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VenueConfig {
    pub base_url: String,
    pub http_timeout_ms: u64,
    /// NAME of an optional env var holding a venue API key.
    pub api_key_env: Option<String>,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jup.ag/api/limit/v1".to_string(),
            http_timeout_ms: 8_000,
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmissionConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: u32,
    pub confirm_poll_ms: u64,
    /// How long a signed transaction is polled before blockhash expiry is
    /// checked. An unconfirmed transaction is rebuilt only once its
    /// blockhash has expired.
    pub attempt_confirm_timeout_ms: u64,
    /// Whole-request budget; exceeding it yields ConfirmationTimeout.
    pub request_timeout_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
            multiplier: 2,
            confirm_poll_ms: 500,
            attempt_confirm_timeout_ms: 12_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub default_take: u32,
    pub max_take: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_take: 20,
            max_take: MAX_HISTORY_TAKE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderDefaults {
    pub default_in_amount: u64,
    pub default_out_amount: u64,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            default_in_amount: 100_000,
            default_out_amount: 100_000,
        }
    }
}

impl RelayConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: RelayConfig =
            serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: relay config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.submission;
        if s.max_attempts == 0 {
            bail!("CONFIG_INVALID: submission.max_attempts must be >= 1");
        }
        if s.multiplier == 0 {
            bail!("CONFIG_INVALID: submission.multiplier must be >= 1");
        }
        if s.initial_backoff_ms > s.max_backoff_ms {
            bail!("CONFIG_INVALID: submission.initial_backoff_ms exceeds max_backoff_ms");
        }
        if s.confirm_poll_ms == 0 {
            bail!("CONFIG_INVALID: submission.confirm_poll_ms must be > 0");
        }
        if s.request_timeout_ms == 0 || s.attempt_confirm_timeout_ms == 0 {
            bail!("CONFIG_INVALID: submission timeouts must be > 0");
        }

        let h = &self.history;
        if h.max_take == 0 || h.max_take > MAX_HISTORY_TAKE {
            bail!(
                "CONFIG_INVALID: history.max_take must lie in [1, {}]",
                MAX_HISTORY_TAKE
            );
        }
        if h.default_take == 0 || h.default_take > h.max_take {
            bail!("CONFIG_INVALID: history.default_take must lie in [1, history.max_take]");
        }

        let o = &self.orders;
        if o.default_in_amount == 0 || o.default_out_amount == 0 {
            bail!("CONFIG_INVALID: orders.default_*_amount must be positive");
        }

        if self.venue.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID: venue.base_url is empty");
        }
        if self.chain.rpc_url_env.trim().is_empty() {
            bail!("CONFIG_INVALID: chain.rpc_url_env is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg = RelayConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg, RelayConfig::default());
        assert_eq!(cfg.history.default_take, 20);
        assert_eq!(cfg.submission.request_timeout_ms, 30_000);
        assert_eq!(cfg.orders.default_in_amount, 100_000);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = RelayConfig::from_json(&json!({"submission": {"max_attempt": 3}}))
            .unwrap_err();
        assert!(format!("{err:#}").contains("max_attempt"));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = RelayConfig::from_json(&json!({"submission": {"max_attempts": 0}}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("max_attempts"));
    }

    #[test]
    fn max_take_above_venue_limit_is_rejected() {
        assert!(RelayConfig::from_json(&json!({"history": {"max_take": 101}})).is_err());
        assert!(
            RelayConfig::from_json(&json!({"history": {"default_take": 50, "max_take": 40}}))
                .is_err()
        );
    }

    #[test]
    fn commitment_ordering() {
        assert!(Commitment::Confirmed.is_satisfied_by("finalized"));
        assert!(Commitment::Confirmed.is_satisfied_by("confirmed"));
        assert!(!Commitment::Confirmed.is_satisfied_by("processed"));
        assert!(!Commitment::Finalized.is_satisfied_by("bogus"));
    }
}
