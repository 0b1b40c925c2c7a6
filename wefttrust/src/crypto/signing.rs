// Identity-signature verification and the signing-callback seam.
//
// The state machines never touch a private identity key: they hand the
// transcript digest to an injected callback and get signature bytes back.
// Only verification lives here.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftTrustError};

/// Signature algorithm used for long-term identity keys.
///
/// Both sides must agree on the spec for a given peer out-of-band (it is a
/// property of the peer's published identity, like the key itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureSpec {
    /// Ed25519 over the raw digest bytes; 32-byte public keys.
    Ed25519,
    /// ECDSA P-256 with SHA-256; SEC1-encoded public keys.
    EcdsaP256Sha256,
}

/// Signing callback: takes the exact bytes to sign, returns signature bytes.
///
/// The implementation typically forwards to an external key-custody service;
/// this crate imposes no ordering requirement on it beyond returning a valid
/// signature over the bytes given.
pub type SignFn<'a> = dyn Fn(&[u8]) -> Result<Vec<u8>> + 'a;

/// Verify a transcript signature against a long-term identity public key.
///
/// A malformed key or signature and a failed verification are reported
/// separately so callers can tell "wrong key material" from "corrupted or
/// substituted transcript".
pub fn verify_transcript_signature(
    spec: SignatureSpec,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    match spec {
        SignatureSpec::Ed25519 => {
            use ed25519_dalek::{Signature, Verifier, VerifyingKey};
            let key_bytes: &[u8; 32] = public_key.try_into().map_err(|_| {
                WeftTrustError::InvalidHandshakeMessage(format!(
                    "Ed25519 public key must be 32 bytes, got {}",
                    public_key.len()
                ))
            })?;
            let key = VerifyingKey::from_bytes(key_bytes).map_err(|e| {
                WeftTrustError::InvalidHandshakeMessage(format!("malformed Ed25519 key: {e}"))
            })?;
            let sig = Signature::from_slice(signature).map_err(|e| {
                WeftTrustError::InvalidHandshakeMessage(format!("malformed Ed25519 signature: {e}"))
            })?;
            key.verify(message, &sig).map_err(|_| {
                WeftTrustError::InvalidHandshakeMessage(
                    "transcript signature verification failed (corrupted transcript or wrong key)"
                        .into(),
                )
            })
        }
        SignatureSpec::EcdsaP256Sha256 => {
            use p256::ecdsa::signature::Verifier;
            use p256::ecdsa::{Signature, VerifyingKey};
            let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|e| {
                WeftTrustError::InvalidHandshakeMessage(format!("malformed P-256 key: {e}"))
            })?;
            let sig = Signature::from_slice(signature).map_err(|e| {
                WeftTrustError::InvalidHandshakeMessage(format!("malformed ECDSA signature: {e}"))
            })?;
            key.verify(message, &sig).map_err(|_| {
                WeftTrustError::InvalidHandshakeMessage(
                    "transcript signature verification failed (corrupted transcript or wrong key)"
                        .into(),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn ed25519_sign_verify() {
        use ed25519_dalek::{Signer, SigningKey};
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        let key = SigningKey::from_bytes(&seed);
        let sig = key.sign(b"transcript digest").to_bytes().to_vec();
        verify_transcript_signature(
            SignatureSpec::Ed25519,
            key.verifying_key().as_bytes(),
            b"transcript digest",
            &sig,
        )
        .unwrap();
    }

    #[test]
    fn ed25519_rejects_wrong_message() {
        use ed25519_dalek::{Signer, SigningKey};
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let sig = key.sign(b"signed bytes").to_bytes().to_vec();
        let err = verify_transcript_signature(
            SignatureSpec::Ed25519,
            key.verifying_key().as_bytes(),
            b"other bytes",
            &sig,
        )
        .unwrap_err();
        assert!(matches!(err, WeftTrustError::InvalidHandshakeMessage(_)));
    }

    #[test]
    fn ecdsa_p256_sign_verify() {
        use p256::ecdsa::signature::Signer;
        use p256::ecdsa::{Signature, SigningKey};
        let key = SigningKey::from_slice(&[5u8; 32]).unwrap();
        let sig: Signature = key.sign(b"transcript digest");
        let public = key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        verify_transcript_signature(
            SignatureSpec::EcdsaP256Sha256,
            &public,
            b"transcript digest",
            &sig.to_vec(),
        )
        .unwrap();
    }

    #[test]
    fn malformed_key_is_reported_as_such() {
        let err = verify_transcript_signature(
            SignatureSpec::Ed25519,
            b"short",
            b"message",
            &[0u8; 64],
        )
        .unwrap_err();
        match err {
            WeftTrustError::InvalidHandshakeMessage(reason) => {
                assert!(reason.contains("32 bytes"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
