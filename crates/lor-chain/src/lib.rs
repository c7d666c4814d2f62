//! lor-chain
//!
//! Chain-side plumbing the relay needs and nothing more:
//!
//! - SDK key and transaction types, re-exported so the other crates do not
//!   depend on the SDK directly.
//! - Key parsing for the formats clients send (base58 addresses, 64-byte
//!   keypairs as arrays or base58).
//! - [`TransactionExt`]: place the owner's signature into a transaction
//!   built by the venue and move it over the wire as base64.
//! - [`ChainRpc`] / [`HttpChainRpc`]: the JSON-RPC calls used to submit and
//!   confirm transactions.
//!
//! No instruction encoding lives here; the venue builds transactions.

mod keys;
pub mod rpc;
mod tx;

pub use solana_sdk::hash::Hash;
pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::{Keypair, Signature, Signer};
pub use solana_sdk::transaction::VersionedTransaction;

pub use keys::{
    keypair_from_base58, keypair_from_bytes, keypair_from_seed, parse_pubkey, pubkey_str, KeyError,
};
pub use rpc::{ChainRpc, HttpChainRpc, RpcError, SignatureStatus};
pub use tx::{transaction_from_base64, TransactionExt, TxError};
