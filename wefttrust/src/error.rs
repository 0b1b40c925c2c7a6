// WeftTrust error types

use thiserror::Error;

/// Top-level error type for the WeftTrust crate.
///
/// Every failure is permanent within this crate: nothing here is retried or
/// silently recovered. Restarting a handshake (with a fresh session id) is a
/// decision for the connection-management layer above.
#[derive(Debug, Error)]
pub enum WeftTrustError {
    // ── Negotiation errors ──────────────────────────────────────────────
    #[error("no protocol mode supported by both parties")]
    NoCommonMode,

    #[error("hello message too large: {size} bytes, limit {limit}")]
    HelloTooLarge { size: usize, limit: usize },

    // ── Handshake errors ────────────────────────────────────────────────
    #[error("invalid handshake message: {0}")]
    InvalidHandshakeMessage(String),

    #[error("peer pinned a different long-term public key: expected hash {expected:02x?}, got {actual:02x?}")]
    WrongPublicKeyHash {
        expected: [u8; 32],
        actual: [u8; 32],
    },

    #[error("invalid peer certificate: {0}")]
    InvalidPeerCertificate(String),

    #[error("invalid handshake step {step} for {operation}")]
    InvalidState {
        step: &'static str,
        operation: &'static str,
    },

    #[error("signing callback failed: {0}")]
    Signing(String),

    // ── Session errors ──────────────────────────────────────────────────
    #[error("message authentication code mismatch")]
    InvalidMac,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("message too large: {size} bytes, negotiated limit {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("session sequence counter exhausted; session must be renegotiated")]
    SessionExhausted,

    // ── Generic ─────────────────────────────────────────────────────────
    #[error("wire codec error: {0}")]
    Codec(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("detail record error: {0}")]
    Serialization(String),
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, WeftTrustError>;
