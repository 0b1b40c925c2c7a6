// Established sessions: the terminal artifact of a successful handshake.

pub mod authenticated;
pub mod encrypted;

pub use authenticated::AuthenticatedSession;
pub use encrypted::AuthenticatedEncryptionSession;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::SessionSecrets;
use crate::error::{Result, WeftTrustError};
use crate::protocol::messages::ProtocolMode;

/// Which side of the handshake this session belongs to; selects which of
/// the per-direction secrets is outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Initiator,
    Responder,
}

/// An established session, in whichever mode was negotiated.
///
/// Configuration (role, mode, limits, secrets) is fixed at construction;
/// the only mutable state is the outbound sequence counter. Not internally
/// thread-safe: one session belongs to one logical connection.
pub enum Session {
    Authenticated(AuthenticatedSession),
    AuthenticatedEncryption(AuthenticatedEncryptionSession),
}

impl Session {
    pub(crate) fn new(
        role: Role,
        mode: ProtocolMode,
        session_id: String,
        max_message_size: u64,
        secrets: SessionSecrets,
    ) -> Self {
        match mode {
            ProtocolMode::AuthenticationOnly => Session::Authenticated(
                AuthenticatedSession::new(role, session_id, max_message_size, secrets),
            ),
            ProtocolMode::AuthenticatedEncryption => Session::AuthenticatedEncryption(
                AuthenticatedEncryptionSession::new(role, session_id, max_message_size, secrets),
            ),
        }
    }

    pub fn mode(&self) -> ProtocolMode {
        match self {
            Session::Authenticated(_) => ProtocolMode::AuthenticationOnly,
            Session::AuthenticatedEncryption(_) => ProtocolMode::AuthenticatedEncryption,
        }
    }
}

/// AEAD nonce for one data message: the direction IV with the sequence
/// number XORed into its trailing eight bytes (so each sequence gets a
/// unique nonce under a fixed IV).
pub(crate) fn sequence_nonce(iv: &[u8; 12], sequence_number: u64) -> [u8; 12] {
    let mut nonce = *iv;
    for (n, s) in nonce[4..].iter_mut().zip(sequence_number.to_be_bytes()) {
        *n ^= s;
    }
    nonce
}

/// Advance an outbound sequence counter. `u64::MAX` is the exhaustion
/// sentinel and is never emitted; reaching it means the session must be
/// renegotiated.
pub(crate) fn next_sequence(counter: &mut u64) -> Result<u64> {
    if *counter >= u64::MAX - 1 {
        return Err(WeftTrustError::SessionExhausted);
    }
    *counter += 1;
    Ok(*counter)
}

/// Reject a payload above the negotiated limit. Runs before any MAC or AEAD
/// work so oversized frames are cheap to drop.
pub(crate) fn check_size(size: usize, limit: u64) -> Result<()> {
    if size as u64 > limit {
        return Err(WeftTrustError::MessageTooLarge {
            size,
            limit: limit as usize,
        });
    }
    Ok(())
}

/// Reject an inbound header whose counter has reached the exhaustion point.
pub(crate) fn check_inbound_sequence(sequence_number: u64) -> Result<()> {
    if sequence_number == u64::MAX {
        return Err(WeftTrustError::SessionExhausted);
    }
    Ok(())
}
