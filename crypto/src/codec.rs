//! Hex codec for persisted key material.

use xledger_types::{PrivateKey, PublicKey};

use crate::CryptoError;

pub fn public_to_hex(key: &PublicKey) -> String {
    hex::encode(key.0)
}

pub fn private_to_hex(key: &PrivateKey) -> String {
    hex::encode(key.0)
}

pub fn public_from_hex(s: &str) -> Result<PublicKey, CryptoError> {
    decode_32(s).map(PublicKey)
}

pub fn private_from_hex(s: &str) -> Result<PrivateKey, CryptoError> {
    decode_32(s).map(PrivateKey)
}

fn decode_32(s: &str) -> Result<[u8; 32], CryptoError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        expected: 32,
        actual: len,
    })
}
