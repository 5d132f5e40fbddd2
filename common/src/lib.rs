pub mod config;
pub mod crypto;
pub mod network;
pub mod serializer;
pub mod time;

pub use crypto::{AddressComponents, CryptoError, Hash, KeyHash, VerificationKey};
pub use network::Network;
pub use serializer::{Reader, ReaderError, Serializer, Writer};
