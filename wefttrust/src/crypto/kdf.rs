// Secret derivation: handshake secrets from the ephemeral shared secret,
// session secrets from the handshake secrets plus the final transcript.
//
//   handshake:  HKDF-Extract(salt = H(hello transcript), ikm = X25519 DH)
//   session:    HKDF-Extract(salt = H(full transcript),  ikm = hs keys)
//
// Labeled expands produce one key and one IV per direction, so the two
// directions never share cipher state.

use std::fmt;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, WeftTrustError};

/// Per-direction symmetric material protecting the two handshake messages.
/// Discarded as soon as the session secrets are derived.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct HandshakeSecrets {
    pub initiator_key: [u8; 32],
    pub responder_key: [u8; 32],
    pub initiator_iv: [u8; 12],
    pub responder_iv: [u8; 12],
}

/// Per-direction symmetric material for the established session; the only
/// secrets a terminal `Session` retains.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SessionSecrets {
    pub initiator_key: [u8; 32],
    pub responder_key: [u8; 32],
    pub initiator_iv: [u8; 12],
    pub responder_iv: [u8; 12],
}

// Key material must never end up in logs.
impl fmt::Debug for HandshakeSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandshakeSecrets(..)")
    }
}

impl fmt::Debug for SessionSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecrets(..)")
    }
}

/// Derive the handshake secrets from the ephemeral shared secret, salted
/// with the transcript hash over both Hello messages.
pub fn derive_handshake_secrets(
    shared_secret: &[u8; 32],
    transcript_hash: &[u8; 32],
) -> Result<HandshakeSecrets> {
    let hk = Hkdf::<Sha256>::new(Some(transcript_hash), shared_secret);

    let mut secrets = HandshakeSecrets {
        initiator_key: [0u8; 32],
        responder_key: [0u8; 32],
        initiator_iv: [0u8; 12],
        responder_iv: [0u8; 12],
    };
    expand(&hk, b"weft handshake key initiator", &mut secrets.initiator_key)?;
    expand(&hk, b"weft handshake key responder", &mut secrets.responder_key)?;
    expand(&hk, b"weft handshake iv initiator", &mut secrets.initiator_iv)?;
    expand(&hk, b"weft handshake iv responder", &mut secrets.responder_iv)?;
    Ok(secrets)
}

/// Derive the session secrets once both handshake messages have been
/// validated, salted with the hash of the complete transcript.
pub fn derive_session_secrets(
    handshake_secrets: &HandshakeSecrets,
    final_transcript_hash: &[u8; 32],
) -> Result<SessionSecrets> {
    let mut ikm = [0u8; 64];
    ikm[..32].copy_from_slice(&handshake_secrets.initiator_key);
    ikm[32..].copy_from_slice(&handshake_secrets.responder_key);
    let hk = Hkdf::<Sha256>::new(Some(final_transcript_hash), &ikm);
    ikm.zeroize();

    let mut secrets = SessionSecrets {
        initiator_key: [0u8; 32],
        responder_key: [0u8; 32],
        initiator_iv: [0u8; 12],
        responder_iv: [0u8; 12],
    };
    expand(&hk, b"weft session key initiator", &mut secrets.initiator_key)?;
    expand(&hk, b"weft session key responder", &mut secrets.responder_key)?;
    expand(&hk, b"weft session iv initiator", &mut secrets.initiator_iv)?;
    expand(&hk, b"weft session iv responder", &mut secrets.responder_iv)?;
    Ok(secrets)
}

fn expand(hk: &Hkdf<Sha256>, label: &[u8], out: &mut [u8]) -> Result<()> {
    hk.expand(label, out)
        .map_err(|e| WeftTrustError::KeyDerivation(format!("HKDF expand: {e}")))
}
