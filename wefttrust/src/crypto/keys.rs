// Ephemeral X25519 keypair for one handshake attempt.

use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An ephemeral X25519 keypair.
///
/// Generated per handshake, held only until the handshake secrets are
/// derived, and zeroed on drop. Never leaves the state machine that owns it
/// except inside the one detail-record step where the protocol still needs
/// it to resume (see the serialization bridge).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EphemeralKeyPair {
    secret: [u8; 32],
    #[zeroize(skip)]
    public: [u8; 32],
}

impl EphemeralKeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self::from_secret_bytes(secret)
    }

    /// Rebuild from raw secret bytes (detail-record resumption and
    /// deterministic tests).
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let public = *PublicKey::from(&StaticSecret::from(secret)).as_bytes();
        Self { secret, public }
    }

    /// The 32-byte public half.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public
    }

    /// The raw secret bytes; only the serialization bridge reads these.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret
    }

    /// Diffie-Hellman with the peer's ephemeral public key.
    pub fn diffie_hellman(&self, peer_public: &[u8; 32]) -> [u8; 32] {
        let secret = StaticSecret::from(self.secret);
        let shared = secret.diffie_hellman(&PublicKey::from(*peer_public));
        *shared.as_bytes()
    }
}

impl core::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("secret", &"[REDACTED]")
            .field("public", &self.public)
            .finish()
    }
}
