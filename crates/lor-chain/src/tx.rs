//! Owner signing and the base64 wire form of venue-built transactions.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("transaction is not valid base64")]
    Base64,
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("{0} is not a required signer of this transaction")]
    NotASigner(Pubkey),
}

/// Decode a base64 wire transaction as the venue returns it.
///
/// Trailing bytes and a signature count that disagrees with the message
/// header are rejected, so whatever is signed later is exactly what the
/// venue sent.
pub fn transaction_from_base64(encoded: &str) -> Result<VersionedTransaction, TxError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| TxError::Base64)?;
    let tx: VersionedTransaction =
        bincode::deserialize(&bytes).map_err(|e| TxError::Malformed(e.to_string()))?;
    let consumed =
        bincode::serialized_size(&tx).map_err(|e| TxError::Malformed(e.to_string()))?;
    if consumed != bytes.len() as u64 {
        return Err(TxError::Malformed(format!(
            "{} trailing bytes",
            bytes.len() as u64 - consumed.min(bytes.len() as u64)
        )));
    }
    tx.sanitize()
        .map_err(|e| TxError::Malformed(e.to_string()))?;
    let required = usize::from(tx.message.header().num_required_signatures);
    if tx.signatures.len() != required {
        return Err(TxError::Malformed(format!(
            "{} signatures for {required} required signers",
            tx.signatures.len()
        )));
    }
    Ok(tx)
}

/// What the relay does with a venue-built transaction.
pub trait TransactionExt {
    /// Accounts that must sign, in signature order.
    fn required_signers(&self) -> &[Pubkey];

    /// Put `signer`'s signature in its slot. Other slots are left alone.
    fn sign_as(&mut self, signer: &Keypair) -> Result<(), TxError>;

    /// `key`'s slot holds a valid signature over the message.
    fn is_signed_by(&self, key: &Pubkey) -> bool;

    /// Every required slot holds a valid signature.
    fn is_fully_signed(&self) -> bool;

    /// The first signature, which is the transaction id once signed.
    fn txid(&self) -> Option<String>;

    fn to_base64(&self) -> Result<String, TxError>;
}

impl TransactionExt for VersionedTransaction {
    fn required_signers(&self) -> &[Pubkey] {
        let keys = self.message.static_account_keys();
        let n = usize::from(self.message.header().num_required_signatures).min(keys.len());
        &keys[..n]
    }

    fn sign_as(&mut self, signer: &Keypair) -> Result<(), TxError> {
        let key = signer.pubkey();
        let slot = self
            .required_signers()
            .iter()
            .position(|k| *k == key)
            .ok_or(TxError::NotASigner(key))?;
        if self.signatures.len() <= slot {
            self.signatures.resize(slot + 1, Signature::default());
        }
        self.signatures[slot] = signer.sign_message(&self.message.serialize());
        Ok(())
    }

    fn is_signed_by(&self, key: &Pubkey) -> bool {
        let Some(slot) = self.required_signers().iter().position(|k| k == key) else {
            return false;
        };
        self.signatures
            .get(slot)
            .map(|sig| sig.verify(key.as_ref(), &self.message.serialize()))
            .unwrap_or(false)
    }

    fn is_fully_signed(&self) -> bool {
        let required = self.required_signers();
        self.signatures.len() == required.len()
            && !required.is_empty()
            && self.verify_with_results().into_iter().all(|ok| ok)
    }

    fn txid(&self) -> Option<String> {
        self.signatures
            .first()
            .filter(|sig| **sig != Signature::default())
            .map(Signature::to_string)
    }

    fn to_base64(&self) -> Result<String, TxError> {
        let bytes = bincode::serialize(self).map_err(|e| TxError::Malformed(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }
}
