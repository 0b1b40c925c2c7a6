// AES-256-GCM authenticated encryption with the tag carried as a separate
// wire field.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, WeftTrustError};

/// Length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// An AES-256-GCM key bound to one direction of one session or handshake.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey {
    key: [u8; 32],
}

impl AeadKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext`, returning `(ciphertext, tag)` separately to
    /// match the wire message fields.
    pub fn seal(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| WeftTrustError::DecryptionFailed(format!("aes-gcm init: {e}")))?;
        let mut out = cipher
            .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|e| WeftTrustError::DecryptionFailed(format!("aes-gcm encrypt: {e}")))?;
        let tag_start = out.len() - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&out[tag_start..]);
        out.truncate(tag_start);
        Ok((out, tag))
    }

    /// Decrypt and authenticate `(ciphertext, tag)`.
    ///
    /// Any failure here is an authentication-tag failure: the ciphertext,
    /// tag, nonce, or associated data did not match what was sealed.
    pub fn open(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| WeftTrustError::DecryptionFailed(format!("aes-gcm init: {e}")))?;
        let mut joined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        joined.extend_from_slice(ciphertext);
        joined.extend_from_slice(tag);
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: &joined, aad })
            .map_err(|_| {
                WeftTrustError::DecryptionFailed("authentication tag verification failed".into())
            })
    }
}
