use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HASH_SIZE: usize = 32;
pub const VKEY_SIZE: usize = 32;
/// Cardano-style payment/stake credential: blake2b-224 of the verification key.
pub const KEY_HASH_SIZE: usize = 28;

type Blake2b256 = Blake2b<U32>;
type Blake2b224 = Blake2b<U28>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {got}")]
    BadLength { expected: usize, got: usize },
}

macro_rules! fixed_bytes_type {
    ($name:ident, $size:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; $size]);

        impl $name {
            pub const SIZE: usize = $size;

            pub fn zero() -> Self {
                Self([0u8; $size])
            }

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
                if bytes.len() != $size {
                    return Err(CryptoError::BadLength {
                        expected: $size,
                        got: bytes.len(),
                    });
                }
                let mut out = [0u8; $size];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
                let bytes = hex::decode(s)?;
                Self::from_bytes(&bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = CryptoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CryptoError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_hex(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }
    };
}

fixed_bytes_type!(Hash, HASH_SIZE);
fixed_bytes_type!(VerificationKey, VKEY_SIZE);
fixed_bytes_type!(KeyHash, KEY_HASH_SIZE);

impl Hash {
    /// SHA-256 used for `input_hash`/`result_hash` (hex-encoded on-chain and in storage).
    pub fn sha256(data: &[u8]) -> Self {
        use sha2::Sha256;
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        Self::from_bytes(&digest).expect("sha256 output is 32 bytes")
    }

    /// blake2b-256, used for the registry asset_name derivation (§4.4).
    pub fn blake2b_256(data: &[u8]) -> Self {
        let mut hasher = Blake2b256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        Self::from_bytes(&digest).expect("blake2b-256 output is 32 bytes")
    }
}

impl VerificationKey {
    /// Cardano payment credential: blake2b-224 of the raw verification key bytes.
    pub fn to_key_hash(&self) -> KeyHash {
        let mut hasher = Blake2b224::new();
        hasher.update(self.0);
        let digest = hasher.finalize();
        KeyHash::from_bytes(&digest).expect("blake2b-224 output is 28 bytes")
    }
}

/// A Cardano-style address split into its payment and optional stake credential,
/// the shape the on-chain script consumes and the shape the Codec encodes/decodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    pub payment_key_hash: KeyHash,
    pub stake_key_hash: Option<KeyHash>,
}

impl AddressComponents {
    pub fn new(payment_key_hash: KeyHash, stake_key_hash: Option<KeyHash>) -> Self {
        Self {
            payment_key_hash,
            stake_key_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_roundtrip() {
        let h = Hash::sha256(b"hello world");
        let hex = h.to_hex();
        assert_eq!(hex.len(), 64);
        let back = Hash::from_hex(&hex).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn vkey_to_key_hash_is_deterministic() {
        let vkey = VerificationKey::from_bytes(&[7u8; VKEY_SIZE]).unwrap();
        let a = vkey.to_key_hash();
        let b = vkey.to_key_hash();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), KEY_HASH_SIZE);
    }

    #[test]
    fn serde_json_roundtrip() {
        let h = Hash::blake2b_256(b"asset");
        let json = serde_json::to_string(&h).unwrap();
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
