// HMAC-SHA256 message authentication for authentication-only sessions.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, WeftTrustError};

type HmacSha256 = Hmac<Sha256>;

/// Length of the HMAC-SHA256 tag.
pub const MAC_LEN: usize = 32;

/// An HMAC key bound to one direction of one session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MacKey {
    key: [u8; 32],
}

impl MacKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Tag over header bytes followed by the payload.
    pub fn compute(&self, header_bytes: &[u8], payload: &[u8]) -> [u8; MAC_LEN] {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts any key length");
        mac.update(header_bytes);
        mac.update(payload);
        mac.finalize().into_bytes().into()
    }

    /// Constant-time verification of a received tag.
    pub fn verify(&self, header_bytes: &[u8], payload: &[u8], tag: &[u8; MAC_LEN]) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts any key length");
        mac.update(header_bytes);
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| WeftTrustError::InvalidMac)
    }
}
