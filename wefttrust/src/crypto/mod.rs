// Cryptographic primitives: ephemeral key agreement, secret derivation,
// AEAD, MAC, and identity-signature verification.

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod mac;
pub mod signing;

use sha2::{Digest, Sha256};

/// SHA-256 over a long-term public key, used for key pinning in the
/// handshake payload.
pub fn public_key_hash(public_key: &[u8]) -> [u8; 32] {
    Sha256::digest(public_key).into()
}
