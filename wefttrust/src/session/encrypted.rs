// Authenticated-encryption sessions: AES-256-GCM with the header as AAD.

use crate::crypto::aead::{AeadKey, TAG_LEN};
use crate::crypto::kdf::SessionSecrets;
use crate::error::Result;
use crate::protocol::messages::{AuthenticatedEncryptedData, CommonHeader, MessageType};
use crate::protocol::unix_timestamp_ms;
use crate::session::{check_inbound_sequence, check_size, next_sequence, sequence_nonce, Role};

/// A session in `AuthenticatedEncryption` mode. Each direction has its own
/// key and IV; the per-message nonce is the IV XOR the sequence number, so
/// a nonce is never reused within a session.
pub struct AuthenticatedEncryptionSession {
    pub(crate) role: Role,
    pub(crate) session_id: String,
    pub(crate) max_message_size: u64,
    pub(crate) secrets: SessionSecrets,
    pub(crate) send_sequence: u64,
}

impl AuthenticatedEncryptionSession {
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

    fn outbound(&self) -> (AeadKey, [u8; 12]) {
        match self.role {
            Role::Initiator => (
                AeadKey::new(self.secrets.initiator_key),
                self.secrets.initiator_iv,
            ),
            Role::Responder => (
                AeadKey::new(self.secrets.responder_key),
                self.secrets.responder_iv,
            ),
        }
    }

    fn inbound(&self) -> (AeadKey, [u8; 12]) {
        match self.role {
            Role::Initiator => (
                AeadKey::new(self.secrets.responder_key),
                self.secrets.responder_iv,
            ),
            Role::Responder => (
                AeadKey::new(self.secrets.initiator_key),
                self.secrets.initiator_iv,
            ),
        }
    }

    /// Build an outbound data message: size check, next sequence number,
    /// seal under the outbound key with the header bytes as AAD.
    pub fn encrypt_data(&mut self, payload: &[u8]) -> Result<AuthenticatedEncryptedData> {
        check_size(payload.len(), self.max_message_size)?;
        let sequence = next_sequence(&mut self.send_sequence)?;
        let header = CommonHeader::new(
            MessageType::AuthenticatedEncryptedData,
            self.session_id.clone(),
            sequence,
            unix_timestamp_ms(),
        );
        let (key, iv) = self.outbound();
        let nonce = sequence_nonce(&iv, sequence);
        let (encrypted_payload, auth_tag) = key.seal(&nonce, &header.encode(), payload)?;
        Ok(AuthenticatedEncryptedData {
            header,
            encrypted_payload,
            auth_tag,
        })
    }

    /// Open an inbound data message. Size check first (GCM ciphertext length
    /// equals plaintext length); a tag failure surfaces as an
    /// authentication-tag error, never a silent wrong result.
    pub fn decrypt_data(
        &self,
        header: &CommonHeader,
        encrypted_payload: &[u8],
        auth_tag: &[u8; TAG_LEN],
    ) -> Result<Vec<u8>> {
        check_size(encrypted_payload.len(), self.max_message_size)?;
        check_inbound_sequence(header.sequence_number)?;
        let (key, iv) = self.inbound();
        let nonce = sequence_nonce(&iv, header.sequence_number);
        key.open(&nonce, &header.encode(), encrypted_payload, auth_tag)
    }
}
