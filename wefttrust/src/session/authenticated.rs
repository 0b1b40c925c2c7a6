// Authentication-only sessions: cleartext payloads, HMAC-SHA256 tags.

use crate::crypto::kdf::SessionSecrets;
use crate::crypto::mac::{MacKey, MAC_LEN};
use crate::error::Result;
use crate::protocol::messages::{AuthenticatedData, CommonHeader, MessageType};
use crate::protocol::unix_timestamp_ms;
use crate::session::{check_inbound_sequence, check_size, next_sequence, Role};

/// A session in `AuthenticationOnly` mode. Payloads travel in the clear;
/// every message carries an HMAC-SHA256 tag over header bytes followed by
/// the payload.
pub struct AuthenticatedSession {
    pub(crate) role: Role,
    pub(crate) session_id: String,
    pub(crate) max_message_size: u64,
    pub(crate) secrets: SessionSecrets,
    pub(crate) send_sequence: u64,
}

impl AuthenticatedSession {
    pub(crate) fn new(
        role: Role,
        session_id: String,
        max_message_size: u64,
        secrets: SessionSecrets,
    ) -> Self {
        Self {
            role,
            session_id,
            max_message_size,
            secrets,
            send_sequence: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn max_message_size(&self) -> u64 {
        self.max_message_size
    }

    fn outbound_key(&self) -> MacKey {
        match self.role {
            Role::Initiator => MacKey::new(self.secrets.initiator_key),
            Role::Responder => MacKey::new(self.secrets.responder_key),
        }
    }

    fn inbound_key(&self) -> MacKey {
        match self.role {
            Role::Initiator => MacKey::new(self.secrets.responder_key),
            Role::Responder => MacKey::new(self.secrets.initiator_key),
        }
    }

    /// Build an outbound data message: size check, next sequence number,
    /// MAC over header bytes and payload.
    pub fn create_mac(&mut self, payload: &[u8]) -> Result<AuthenticatedData> {
        check_size(payload.len(), self.max_message_size)?;
        let sequence = next_sequence(&mut self.send_sequence)?;
        let header = CommonHeader::new(
            MessageType::AuthenticatedData,
            self.session_id.clone(),
            sequence,
            unix_timestamp_ms(),
        );
        let auth_tag = self.outbound_key().compute(&header.encode(), payload);
        Ok(AuthenticatedData {
            header,
            payload: payload.to_vec(),
            auth_tag,
        })
    }

    /// Check an inbound data message's tag. The size check runs first: an
    /// oversized message is rejected regardless of authenticity.
    pub fn validate_mac(
        &self,
        header: &CommonHeader,
        payload: &[u8],
        auth_tag: &[u8; MAC_LEN],
    ) -> Result<()> {
        check_size(payload.len(), self.max_message_size)?;
        check_inbound_sequence(header.sequence_number)?;
        self.inbound_key().verify(&header.encode(), payload, auth_tag)
    }
}
