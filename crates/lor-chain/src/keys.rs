//! Keys in the shapes clients send them.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("not a valid address")]
    InvalidAddress,
    #[error("keypair must be 64 bytes, got {0}")]
    WrongLength(usize),
    #[error("keypair is not valid base58")]
    InvalidBase58,
    /// The public half does not belong to the secret half.
    #[error("keypair halves do not match")]
    Mismatch,
}

/// Parse a base58 address, ignoring surrounding whitespace.
pub fn parse_pubkey(s: &str) -> Result<Pubkey, KeyError> {
    s.trim().parse().map_err(|_| KeyError::InvalidAddress)
}

/// Keypair from a 32-byte ed25519 seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> Result<Keypair, KeyError> {
    solana_sdk::signer::keypair::keypair_from_seed(seed).map_err(|_| KeyError::WrongLength(32))
}

/// Keypair from the standard 64-byte encoding: secret seed then public key.
///
/// The public half is checked against the key derived from the seed, so a
/// spliced pair is rejected rather than signing as someone else.
pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, KeyError> {
    let (seed, public) = match bytes.len() {
        64 => bytes.split_at(32),
        n => return Err(KeyError::WrongLength(n)),
    };
    let seed: &[u8; 32] = seed
        .try_into()
        .map_err(|_| KeyError::WrongLength(bytes.len()))?;
    let keypair = keypair_from_seed(seed)?;
    if keypair.pubkey().as_ref() != public {
        return Err(KeyError::Mismatch);
    }
    Ok(keypair)
}

/// Keypair from the base58 form of the 64-byte encoding.
pub fn keypair_from_base58(s: &str) -> Result<Keypair, KeyError> {
    let bytes = bs58::decode(s.trim())
        .into_vec()
        .map_err(|_| KeyError::InvalidBase58)?;
    keypair_from_bytes(&bytes)
}

/// Serde adapter writing a [`Pubkey`] as its base58 string.
///
/// Use with `#[serde(with = "lor_chain::pubkey_str")]`.
pub mod pubkey_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(b: u8) -> Keypair {
        keypair_from_seed(&[b; 32]).unwrap()
    }

    #[test]
    fn sixty_four_bytes_round_trip_through_to_bytes() {
        let kp = seeded(42);
        let parsed = keypair_from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(parsed.pubkey(), kp.pubkey());
    }

    #[test]
    fn spliced_halves_are_rejected() {
        let mut bytes = seeded(1).to_bytes();
        bytes[32..].copy_from_slice(seeded(2).pubkey().as_ref());
        assert_eq!(keypair_from_bytes(&bytes).unwrap_err(), KeyError::Mismatch);
        assert_eq!(keypair_from_bytes(&[0u8; 12]).unwrap_err(), KeyError::WrongLength(12));
    }

    #[test]
    fn base58_keypair_and_address_parse() {
        let kp = seeded(9);
        let encoded = bs58::encode(kp.to_bytes()).into_string();
        assert_eq!(keypair_from_base58(&encoded).unwrap().pubkey(), kp.pubkey());
        assert_eq!(keypair_from_base58("0OIl").unwrap_err(), KeyError::InvalidBase58);

        let text = format!("  {}\n", kp.pubkey());
        assert_eq!(parse_pubkey(&text).unwrap(), kp.pubkey());
        assert_eq!(parse_pubkey("not-an-address").unwrap_err(), KeyError::InvalidAddress);
    }

    #[test]
    fn pubkey_serializes_as_base58_string() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Holder {
            #[serde(with = "pubkey_str")]
            key: Pubkey,
        }
        let key = Pubkey::new_from_array([7u8; 32]);
        let json = serde_json::to_value(Holder { key }).unwrap();
        assert_eq!(json["key"], serde_json::json!(key.to_string()));
        let back: Holder = serde_json::from_value(json).unwrap();
        assert_eq!(back.key, key);
    }
}
