//! Request validation.
//!
//! Turns raw JSON bodies into typed commands. Nothing here touches the
//! network, so a rejected request never reaches a collaborator.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use lor_chain::{
    keypair_from_base58, keypair_from_bytes, parse_pubkey, KeyError, Keypair, Pubkey, Signer,
};
use lor_config::{HistoryConfig, OrderDefaults};
use serde_json::{Map, Value};

use crate::error::RelayError;

/// The owner's signing key, shared between a handler and its submission task.
/// Debug output shows the public key only.
#[derive(Clone)]
pub struct OwnerKey(Arc<Keypair>);

impl OwnerKey {
    pub fn new(keypair: Keypair) -> Self {
        Self(Arc::new(keypair))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.0.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.0
    }
}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerKey")
            .field("pubkey", &self.pubkey())
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub owner: OwnerKey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub expired_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCommand {
    pub wallet: Pubkey,
    pub take: u32,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancelCommand {
    pub owner: OwnerKey,
    pub order_pubkey: Pubkey,
}

/// Validates request bodies against the configured defaults and bounds.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    orders: OrderDefaults,
    history: HistoryConfig,
}

impl RequestValidator {
    pub fn new(orders: OrderDefaults, history: HistoryConfig) -> Self {
        Self { orders, history }
    }

    pub fn create_order(&self, body: &Value) -> Result<CreateOrderCommand, RelayError> {
        self.create_order_at(body, Utc::now().timestamp())
    }

    /// `now` is unix seconds, used to reject an `expiredAt` in the past.
    pub fn create_order_at(
        &self,
        body: &Value,
        now: i64,
    ) -> Result<CreateOrderCommand, RelayError> {
        let obj = as_object(body)?;
        let owner = signing_owner(obj)?;
        let input_mint = address_field(obj, "inputTokenAddress")?;
        let output_mint = address_field(obj, "outputTokenAddress")?;
        if input_mint == output_mint {
            return Err(RelayError::invalid_address(
                "inputTokenAddress and outputTokenAddress must differ",
            ));
        }
        let in_amount = amount_field(obj, "inAmount", self.orders.default_in_amount)?;
        let out_amount = amount_field(obj, "outAmount", self.orders.default_out_amount)?;
        let expired_at = expiry_field(obj, now)?;

        Ok(CreateOrderCommand {
            owner,
            input_mint,
            output_mint,
            in_amount,
            out_amount,
            expired_at,
        })
    }

    pub fn order_history(&self, body: &Value) -> Result<HistoryCommand, RelayError> {
        let obj = as_object(body)?;
        let wallet = match obj.get("owner") {
            None | Some(Value::Null) => return Err(RelayError::validation("owner is required")),
            Some(Value::String(s)) => parse_address(s, "owner")?,
            Some(Value::Object(owner)) => public_key(owner)?,
            Some(_) => {
                return Err(RelayError::validation(
                    "owner must be an object with publicKey",
                ))
            }
        };

        let take = match obj.get("take") {
            None | Some(Value::Null) => self.history.default_take,
            Some(v) => {
                let take = v
                    .as_u64()
                    .ok_or_else(|| RelayError::validation("take must be a positive integer"))?;
                if take < 1 || take > u64::from(self.history.max_take) {
                    return Err(RelayError::validation(format!(
                        "take must be between 1 and {}",
                        self.history.max_take
                    )));
                }
                // Bounded by max_take above.
                take as u32
            }
        };

        let cursor = match obj.get("lastCursor") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                return Err(RelayError::validation(
                    "lastCursor must be a string or a number",
                ))
            }
        };

        Ok(HistoryCommand {
            wallet,
            take,
            cursor,
        })
    }

    pub fn cancel_order(&self, body: &Value) -> Result<CancelCommand, RelayError> {
        let obj = as_object(body)?;
        let owner = signing_owner(obj)?;
        let order_pubkey = address_field(obj, "orderPublicKey")?;
        Ok(CancelCommand {
            owner,
            order_pubkey,
        })
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, RelayError> {
    body.as_object()
        .ok_or_else(|| RelayError::validation("request body must be a JSON object"))
}

fn parse_address(s: &str, field: &str) -> Result<Pubkey, RelayError> {
    parse_pubkey(s).map_err(|_| RelayError::invalid_address(format!("{field} is not a valid address")))
}

fn address_field(obj: &Map<String, Value>, field: &str) -> Result<Pubkey, RelayError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(RelayError::validation(format!("{field} is required"))),
        Some(Value::String(s)) => parse_address(s, field),
        Some(_) => Err(RelayError::invalid_address(format!(
            "{field} must be a base58 string"
        ))),
    }
}

fn public_key(owner: &Map<String, Value>) -> Result<Pubkey, RelayError> {
    match owner.get("publicKey") {
        None | Some(Value::Null) => Err(RelayError::validation("owner.publicKey is required")),
        Some(Value::String(s)) => parse_address(s, "owner.publicKey"),
        Some(_) => Err(RelayError::invalid_address(
            "owner.publicKey must be a base58 string",
        )),
    }
}

/// Owner object with both halves: `publicKey` and a `secretKey` that is
/// either a 64-element byte array or its base58 form.
fn signing_owner(obj: &Map<String, Value>) -> Result<OwnerKey, RelayError> {
    let owner = match obj.get("owner") {
        None | Some(Value::Null) => return Err(RelayError::validation("owner is required")),
        Some(Value::Object(owner)) => owner,
        Some(_) => {
            return Err(RelayError::validation(
                "owner must be an object with publicKey and secretKey",
            ))
        }
    };
    let address = public_key(owner)?;

    let keypair = match owner.get("secretKey") {
        None | Some(Value::Null) => {
            return Err(RelayError::validation("owner.secretKey is required"))
        }
        Some(Value::Array(items)) => {
            let bytes = items
                .iter()
                .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| RelayError::validation("owner.secretKey must contain bytes"))?;
            keypair_from_bytes(&bytes)
        }
        Some(Value::String(s)) => keypair_from_base58(s),
        Some(_) => {
            return Err(RelayError::validation(
                "owner.secretKey must be a byte array or base58 string",
            ))
        }
    }
    .map_err(|e| match e {
        KeyError::WrongLength(_) => RelayError::validation("owner.secretKey must be 64 bytes"),
        KeyError::InvalidBase58 => RelayError::validation("owner.secretKey is not valid base58"),
        KeyError::Mismatch | KeyError::InvalidAddress => {
            RelayError::validation("owner.secretKey is not a consistent keypair")
        }
    })?;

    if keypair.pubkey() != address {
        return Err(RelayError::validation(
            "owner keypair does not match publicKey",
        ));
    }
    Ok(OwnerKey::new(keypair))
}

fn amount_field(obj: &Map<String, Value>, field: &str, default: u64) -> Result<u64, RelayError> {
    let amount = match obj.get(field) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            RelayError::invalid_amount(format!("{field} must be a positive integer"))
        })?,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RelayError::invalid_amount(format!(
                    "{field} must be a positive integer"
                )));
            }
            s.parse::<u64>()
                .map_err(|_| RelayError::invalid_amount(format!("{field} is too large")))?
        }
        Some(_) => {
            return Err(RelayError::invalid_amount(format!(
                "{field} must be a positive integer"
            )))
        }
    };
    if amount == 0 {
        return Err(RelayError::invalid_amount(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(amount)
}

fn expiry_field(obj: &Map<String, Value>, now: i64) -> Result<Option<i64>, RelayError> {
    match obj.get("expiredAt") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let at = v
                .as_i64()
                .ok_or_else(|| RelayError::validation("expiredAt must be unix seconds"))?;
            if at <= now {
                return Err(RelayError::validation("expiredAt must be in the future"));
            }
            Ok(Some(at))
        }
    }
}
