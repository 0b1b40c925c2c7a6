// Handshake state machines for both roles.
//
// The machines share the handshake-message construction and checking logic
// below; only the direction of the secrets and the step bookkeeping differ
// between the two roles.

pub mod initiator;
pub mod responder;
pub mod state;

pub use initiator::Initiator;
pub use responder::Responder;
pub use state::{InitiatorStep, ResponderStep};

use serde::{Deserialize, Serialize};

use crate::cert::{validator, CertificateCheckMode};
use crate::crypto::aead::AeadKey;
use crate::crypto::public_key_hash;
use crate::crypto::signing::{verify_transcript_signature, SignFn, SignatureSpec};
use crate::error::{Result, WeftTrustError};
use crate::protocol::messages::{CommonHeader, HandshakePayload};
use crate::protocol::transcript::Transcript;

/// Identity of one logical handshake: the session being established and the
/// peer group it belongs to. Both sides must agree on both values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeIdentity {
    pub session_id: String,
    pub group_id: String,
}

impl HandshakeIdentity {
    pub fn new(session_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            group_id: group_id.into(),
        }
    }
}

/// Build, sign, and seal one handshake payload.
///
/// The signature covers SHA-256(transcript-so-far || payload prefix), so it
/// binds the sender's identity to the byte-exact message sequence. Returns
/// `(ciphertext, tag)` for the wire message; the header bytes are the AEAD
/// associated data.
#[allow(clippy::too_many_arguments)]
pub(crate) fn seal_handshake_payload(
    transcript: &Transcript,
    key: &[u8; 32],
    iv: &[u8; 12],
    header: &CommonHeader,
    our_public_key: &[u8],
    certificate_chain: Option<&str>,
    expected_peer_public_key: &[u8],
    sign: &SignFn<'_>,
) -> Result<(Vec<u8>, [u8; 16])> {
    let peer_key_hash = public_key_hash(expected_peer_public_key);
    let prefix = HandshakePayload::encode_prefix(our_public_key, certificate_chain, &peer_key_hash);
    let signature = sign(&transcript.hash_with(&prefix))?;

    let payload = HandshakePayload {
        public_key: our_public_key.to_vec(),
        certificate_chain: certificate_chain.map(str::to_owned),
        peer_public_key_hash: peer_key_hash,
        signature,
    };
    AeadKey::new(*key).seal(iv, &header.encode(), &payload.encode())
}

/// Open and check a peer's handshake payload: decrypt, key-pinning both
/// ways, transcript signature, then certificate validation per the
/// configured mode.
#[allow(clippy::too_many_arguments)]
pub(crate) fn open_and_check_payload(
    transcript: &Transcript,
    key: &[u8; 32],
    iv: &[u8; 12],
    header: &CommonHeader,
    ciphertext: &[u8],
    auth_tag: &[u8; 16],
    our_public_key: &[u8],
    expected_peer_name: &str,
    expected_peer_public_key: &[u8],
    signature_spec: SignatureSpec,
    certificate_mode: &CertificateCheckMode,
) -> Result<()> {
    let plaintext = AeadKey::new(*key)
        .open(iv, &header.encode(), ciphertext, auth_tag)
        .map_err(|_| {
            WeftTrustError::InvalidHandshakeMessage(
                "handshake payload failed authenticated decryption (corrupted message or \
                 mismatched handshake secrets)"
                    .into(),
            )
        })?;
    let payload = HandshakePayload::decode(&plaintext)
        .map_err(|e| WeftTrustError::InvalidHandshakeMessage(format!("malformed payload: {e}")))?;

    // The sender's claimed identity key must be the one we pinned for it.
    let expected_hash = public_key_hash(expected_peer_public_key);
    let actual_hash = public_key_hash(&payload.public_key);
    if actual_hash != expected_hash {
        return Err(WeftTrustError::WrongPublicKeyHash {
            expected: expected_hash,
            actual: actual_hash,
        });
    }

    // Conversely, the sender must have pinned *our* identity key.
    let our_hash = public_key_hash(our_public_key);
    if payload.peer_public_key_hash != our_hash {
        return Err(WeftTrustError::WrongPublicKeyHash {
            expected: our_hash,
            actual: payload.peer_public_key_hash,
        });
    }

    verify_transcript_signature(
        signature_spec,
        expected_peer_public_key,
        &transcript.hash_with(&payload.prefix_bytes()),
        &payload.signature,
    )?;

    match certificate_mode {
        CertificateCheckMode::NoCertificate => {}
        CertificateCheckMode::CheckCertificate {
            trust_anchors,
            revocation_mode,
            revocation_client,
        } => {
            let chain = payload.certificate_chain.as_deref().ok_or_else(|| {
                WeftTrustError::InvalidPeerCertificate(
                    "certificate required but peer presented no chain".into(),
                )
            })?;
            validator::validate(
                chain,
                expected_peer_name,
                Some(&payload.public_key),
                trust_anchors,
                *revocation_mode,
                revocation_client.as_ref(),
            )?;
        }
    }

    Ok(())
}
