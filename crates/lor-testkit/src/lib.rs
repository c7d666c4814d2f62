//! lor-testkit
//!
//! In-memory collaborators for exercising the relay without a network:
//! a [`FakeVenue`] and a [`FakeChain`] sharing one [`Ledger`], so an order
//! created through the pipeline shows up in open orders and history, and a
//! confirmed cancel removes it.

mod fake_chain;
mod fake_venue;
mod ledger;

use std::sync::Arc;

use lor_chain::{keypair_from_seed, Keypair, Pubkey, Signer};
use serde_json::{json, Value};

pub use fake_chain::{FakeChain, SendOutcome, DEFAULT_BLOCKHASH_TTL};
pub use fake_venue::{FakeVenue, VenueCall};
pub use ledger::{Ledger, FAKE_PROGRAM};

/// A fake venue and a fake chain over the same ledger.
#[derive(Debug, Clone)]
pub struct Sim {
    pub ledger: Ledger,
    pub venue: Arc<FakeVenue>,
    pub chain: Arc<FakeChain>,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    pub fn new() -> Self {
        let ledger = Ledger::new();
        Self {
            venue: Arc::new(FakeVenue::new(ledger.clone())),
            chain: Arc::new(FakeChain::new(ledger.clone())),
            ledger,
        }
    }

    /// Calls made to either collaborator.
    pub fn total_calls(&self) -> u32 {
        self.venue.total_calls() + self.chain.total_calls()
    }
}

/// Deterministic owner keypair.
pub fn owner(seed: u8) -> Keypair {
    keypair_from_seed(&[seed; 32]).expect("32-byte seed")
}

/// Deterministic mint / order address.
pub fn address(fill: u8) -> Pubkey {
    Pubkey::new_from_array([fill; 32])
}

/// Owner as a client sends it: public key plus the 64-byte secret.
pub fn owner_json(kp: &Keypair) -> Value {
    json!({
        "publicKey": kp.pubkey().to_string(),
        "secretKey": kp.to_bytes().to_vec(),
    })
}

pub fn create_order_body(kp: &Keypair, input_mint: Pubkey, output_mint: Pubkey) -> Value {
    json!({
        "owner": owner_json(kp),
        "inputTokenAddress": input_mint.to_string(),
        "outputTokenAddress": output_mint.to_string(),
    })
}

pub fn cancel_order_body(kp: &Keypair, order: Pubkey) -> Value {
    json!({
        "owner": owner_json(kp),
        "orderPublicKey": order.to_string(),
    })
}
