// Handshake transcript: ordered bytes of every message exchanged so far.

use sha2::{Digest, Sha256};

/// Running transcript over the byte-exact wire encoding of each protocol
/// message, in exchange order.
///
/// Kept as the accumulated bytes rather than a streaming hasher so that an
/// in-flight handshake can be serialized and resumed on another process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    bytes: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a transcript from previously serialized bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Append one encoded message to the transcript.
    pub fn append(&mut self, message_bytes: &[u8]) {
        self.bytes.extend_from_slice(message_bytes);
    }

    /// SHA-256 over the transcript so far.
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(&self.bytes).into()
    }

    /// SHA-256 over the transcript so far followed by `extra` — the digest a
    /// handshake signature is computed over (transcript || payload prefix).
    pub fn hash_with(&self, extra: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hasher.update(extra);
        hasher.finalize().into()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
