//! Cryptographic helpers for the xledger gateway.
//!
//! - **Ed25519** key pairs owned by the escrow contract bootstrap
//! - Hex codec for persisted key material

pub mod codec;
pub mod error;
pub mod keys;

pub use codec::{private_from_hex, private_to_hex, public_from_hex, public_to_hex};
pub use error::CryptoError;
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
