// Handshake and data messages with their binary wire codec.
//
// Wire format (big-endian):
//   strings        [len:2B][utf8_bytes:lenB]
//   byte fields    [len:4B][bytes:lenB]
//   InitiatorHello [type:1B][session_id][group_id][ephemeral_pk:32B]
//                  [num_modes:1B][mode_tags...][max_message_size:8B]
//   ResponderHello [type:1B][session_id][ephemeral_pk:32B][mode_tag:1B]
//                  [max_message_size:8B]
//   handshake msgs [header][ciphertext][auth_tag:16B]
//   data msgs      [header][payload-or-ciphertext][auth_tag:32B|16B]
//   CommonHeader   [type:1B][version:2B][session_id][sequence:8B][timestamp:8B]
//
// The transcript hash is computed over exactly these encodings, in exchange
// order, which is what binds signatures and derived keys to the byte-exact
// message sequence.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftTrustError};
use crate::protocol::PROTOCOL_VERSION;

// ── Message types ────────────────────────────────────────────────────────

/// Wire discriminator for every protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    InitiatorHello,
    ResponderHello,
    InitiatorHandshake,
    ResponderHandshake,
    AuthenticatedData,
    AuthenticatedEncryptedData,
}

impl MessageType {
    /// Wire tag byte.
    pub fn wire_id(self) -> u8 {
        match self {
            MessageType::InitiatorHello => 0x01,
            MessageType::ResponderHello => 0x02,
            MessageType::InitiatorHandshake => 0x03,
            MessageType::ResponderHandshake => 0x04,
            MessageType::AuthenticatedData => 0x05,
            MessageType::AuthenticatedEncryptedData => 0x06,
        }
    }

    /// Resolve from a wire tag.
    pub fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(MessageType::InitiatorHello),
            0x02 => Some(MessageType::ResponderHello),
            0x03 => Some(MessageType::InitiatorHandshake),
            0x04 => Some(MessageType::ResponderHandshake),
            0x05 => Some(MessageType::AuthenticatedData),
            0x06 => Some(MessageType::AuthenticatedEncryptedData),
            _ => None,
        }
    }
}

// ── Protocol modes ───────────────────────────────────────────────────────

/// Data-protection mode negotiated for the established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMode {
    /// MAC-only: payloads travel in the clear, authenticated with HMAC.
    AuthenticationOnly,
    /// AEAD: payloads are encrypted and authenticated.
    AuthenticatedEncryption,
}

impl ProtocolMode {
    /// Wire tag used during hello negotiation.
    pub fn wire_id(self) -> u8 {
        match self {
            ProtocolMode::AuthenticationOnly => 0x01,
            ProtocolMode::AuthenticatedEncryption => 0x02,
        }
    }

    /// Resolve from a wire tag.
    pub fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(ProtocolMode::AuthenticationOnly),
            0x02 => Some(ProtocolMode::AuthenticatedEncryption),
            _ => None,
        }
    }
}

/// Fixed responder preference order: strongest common mode wins.
const MODE_PREFERENCE: [ProtocolMode; 2] = [
    ProtocolMode::AuthenticatedEncryption,
    ProtocolMode::AuthenticationOnly,
];

/// Select the first mode (by fixed preference) present in both sets, or
/// `None` when the intersection is empty.
pub fn select_mode(ours: &[ProtocolMode], theirs: &[ProtocolMode]) -> Option<ProtocolMode> {
    MODE_PREFERENCE
        .into_iter()
        .find(|m| ours.contains(m) && theirs.contains(m))
}

// ── Common header ────────────────────────────────────────────────────────

/// Per-message header; its encoding is the MAC input prefix / AEAD associated
/// data of every protected message, so sequence and session id are
/// tamper-evident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonHeader {
    pub message_type: MessageType,
    pub protocol_version: u16,
    pub session_id: String,
    pub sequence_number: u64,
    pub timestamp: u64,
}

impl CommonHeader {
    pub fn new(message_type: MessageType, session_id: String, sequence_number: u64, timestamp: u64) -> Self {
        Self {
            message_type,
            protocol_version: PROTOCOL_VERSION,
            session_id,
            sequence_number,
            timestamp,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.session_id.len());
        buf.push(self.message_type.wire_id());
        buf.extend_from_slice(&self.protocol_version.to_be_bytes());
        put_str(&mut buf, &self.session_id);
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        let tag = r.u8()?;
        let message_type = MessageType::from_wire_id(tag)
            .ok_or_else(|| WeftTrustError::Codec(format!("unknown message type 0x{tag:02x}")))?;
        Ok(Self {
            message_type,
            protocol_version: r.u16()?,
            session_id: r.string()?,
            sequence_number: r.u64()?,
            timestamp: r.u64()?,
        })
    }
}

// ── Hello messages ───────────────────────────────────────────────────────

/// Message 1: Initiator -> Responder. Unauthenticated; opens the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorHello {
    pub session_id: String,
    pub group_id: String,
    pub ephemeral_public_key: [u8; 32],
    pub supported_modes: Vec<ProtocolMode>,
    pub max_message_size: u64,
}

impl InitiatorHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.session_id.len() + self.group_id.len());
        buf.push(MessageType::InitiatorHello.wire_id());
        put_str(&mut buf, &self.session_id);
        put_str(&mut buf, &self.group_id);
        buf.extend_from_slice(&self.ephemeral_public_key);
        buf.push(self.supported_modes.len() as u8);
        for mode in &self.supported_modes {
            buf.push(mode.wire_id());
        }
        buf.extend_from_slice(&self.max_message_size.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.expect_tag(MessageType::InitiatorHello)?;
        let session_id = r.string()?;
        let group_id = r.string()?;
        let ephemeral_public_key = r.array::<32>()?;
        let num_modes = r.u8()?;
        let mut supported_modes = Vec::with_capacity(num_modes as usize);
        for _ in 0..num_modes {
            let tag = r.u8()?;
            let mode = ProtocolMode::from_wire_id(tag)
                .ok_or_else(|| WeftTrustError::Codec(format!("unknown protocol mode 0x{tag:02x}")))?;
            supported_modes.push(mode);
        }
        let max_message_size = r.u64()?;
        r.expect_end()?;
        Ok(Self {
            session_id,
            group_id,
            ephemeral_public_key,
            supported_modes,
            max_message_size,
        })
    }
}

/// Message 2: Responder -> Initiator. Carries the selected mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderHello {
    pub session_id: String,
    pub ephemeral_public_key: [u8; 32],
    pub selected_mode: ProtocolMode,
    pub max_message_size: u64,
}

impl ResponderHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.session_id.len());
        buf.push(MessageType::ResponderHello.wire_id());
        put_str(&mut buf, &self.session_id);
        buf.extend_from_slice(&self.ephemeral_public_key);
        buf.push(self.selected_mode.wire_id());
        buf.extend_from_slice(&self.max_message_size.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.expect_tag(MessageType::ResponderHello)?;
        let session_id = r.string()?;
        let ephemeral_public_key = r.array::<32>()?;
        let tag = r.u8()?;
        let selected_mode = ProtocolMode::from_wire_id(tag)
            .ok_or_else(|| WeftTrustError::Codec(format!("unknown protocol mode 0x{tag:02x}")))?;
        let max_message_size = r.u64()?;
        r.expect_end()?;
        Ok(Self {
            session_id,
            ephemeral_public_key,
            selected_mode,
            max_message_size,
        })
    }
}

// ── Handshake messages ───────────────────────────────────────────────────

/// Message 3: Initiator -> Responder. Payload is encrypted under the
/// initiator-direction handshake secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorHandshakeMessage {
    pub header: CommonHeader,
    pub encrypted_payload: Vec<u8>,
    pub auth_tag: [u8; 16],
}

impl InitiatorHandshakeMessage {
    pub fn encode(&self) -> Vec<u8> {
        encode_handshake_message(&self.header, &self.encrypted_payload, &self.auth_tag)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, encrypted_payload, auth_tag) =
            decode_handshake_message(bytes, MessageType::InitiatorHandshake)?;
        Ok(Self {
            header,
            encrypted_payload,
            auth_tag,
        })
    }
}

/// Message 4: Responder -> Initiator. Symmetric to
/// [`InitiatorHandshakeMessage`], encrypted under the responder-direction
/// handshake secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderHandshakeMessage {
    pub header: CommonHeader,
    pub encrypted_payload: Vec<u8>,
    pub auth_tag: [u8; 16],
}

impl ResponderHandshakeMessage {
    pub fn encode(&self) -> Vec<u8> {
        encode_handshake_message(&self.header, &self.encrypted_payload, &self.auth_tag)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, encrypted_payload, auth_tag) =
            decode_handshake_message(bytes, MessageType::ResponderHandshake)?;
        Ok(Self {
            header,
            encrypted_payload,
            auth_tag,
        })
    }
}

fn encode_handshake_message(header: &CommonHeader, ciphertext: &[u8], tag: &[u8; 16]) -> Vec<u8> {
    let mut buf = header.encode();
    put_bytes(&mut buf, ciphertext);
    buf.extend_from_slice(tag);
    buf
}

fn decode_handshake_message(
    bytes: &[u8],
    expected: MessageType,
) -> Result<(CommonHeader, Vec<u8>, [u8; 16])> {
    let mut r = Reader::new(bytes);
    let header = CommonHeader::decode_from(&mut r)?;
    if header.message_type != expected {
        return Err(WeftTrustError::Codec(format!(
            "expected {expected:?}, got {:?}",
            header.message_type
        )));
    }
    let encrypted_payload = r.bytes()?;
    let auth_tag = r.array::<16>()?;
    r.expect_end()?;
    Ok((header, encrypted_payload, auth_tag))
}

// ── Encrypted handshake payload ──────────────────────────────────────────

/// Plaintext content of a handshake message, before encryption.
///
/// The signature covers SHA-256(transcript-so-far || prefix), where the
/// prefix is everything up to but excluding the signature field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePayload {
    /// The sender's long-term identity public key (raw bytes; algorithm is
    /// agreed out-of-band via the signature spec).
    pub public_key: Vec<u8>,
    /// Optional PEM certificate chain proving the identity key.
    pub certificate_chain: Option<String>,
    /// SHA-256 of the long-term public key the sender expects the *peer* to
    /// hold; lets the receiver detect it is not who the sender pinned.
    pub peer_public_key_hash: [u8; 32],
    /// Signature over the transcript hash, produced by the injected signer.
    pub signature: Vec<u8>,
}

impl HandshakePayload {
    /// Encode everything except the signature; these are the signed bytes'
    /// payload contribution.
    pub fn encode_prefix(
        public_key: &[u8],
        certificate_chain: Option<&str>,
        peer_public_key_hash: &[u8; 32],
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + public_key.len());
        put_bytes(&mut buf, public_key);
        match certificate_chain {
            Some(chain) => {
                buf.push(1);
                put_bytes(&mut buf, chain.as_bytes());
            }
            None => buf.push(0),
        }
        buf.extend_from_slice(peer_public_key_hash);
        buf
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Self::encode_prefix(
            &self.public_key,
            self.certificate_chain.as_deref(),
            &self.peer_public_key_hash,
        );
        let len = self.signature.len() as u16;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.signature);
        buf
    }

    /// Re-encode this payload's signed prefix.
    pub fn prefix_bytes(&self) -> Vec<u8> {
        Self::encode_prefix(
            &self.public_key,
            self.certificate_chain.as_deref(),
            &self.peer_public_key_hash,
        )
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let public_key = r.bytes()?;
        let certificate_chain = match r.u8()? {
            0 => None,
            1 => {
                let raw = r.bytes()?;
                let chain = String::from_utf8(raw)
                    .map_err(|_| WeftTrustError::Codec("certificate chain is not UTF-8".into()))?;
                Some(chain)
            }
            flag => {
                return Err(WeftTrustError::Codec(format!(
                    "invalid certificate chain flag 0x{flag:02x}"
                )))
            }
        };
        let peer_public_key_hash = r.array::<32>()?;
        let sig_len = r.u16()? as usize;
        let signature = r.take(sig_len)?.to_vec();
        r.expect_end()?;
        Ok(Self {
            public_key,
            certificate_chain,
            peer_public_key_hash,
            signature,
        })
    }
}

// ── Data messages ────────────────────────────────────────────────────────

/// Post-handshake data frame in authentication-only mode: cleartext payload
/// plus an HMAC-SHA256 tag over header || payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedData {
    pub header: CommonHeader,
    pub payload: Vec<u8>,
    pub auth_tag: [u8; 32],
}

impl AuthenticatedData {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.header.encode();
        put_bytes(&mut buf, &self.payload);
        buf.extend_from_slice(&self.auth_tag);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let header = CommonHeader::decode_from(&mut r)?;
        if header.message_type != MessageType::AuthenticatedData {
            return Err(WeftTrustError::Codec(format!(
                "expected AuthenticatedData, got {:?}",
                header.message_type
            )));
        }
        let payload = r.bytes()?;
        let auth_tag = r.array::<32>()?;
        r.expect_end()?;
        Ok(Self {
            header,
            payload,
            auth_tag,
        })
    }
}

/// Post-handshake data frame in authenticated-encryption mode: AES-256-GCM
/// ciphertext with the header bytes as associated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedEncryptedData {
    pub header: CommonHeader,
    pub encrypted_payload: Vec<u8>,
    pub auth_tag: [u8; 16],
}

impl AuthenticatedEncryptedData {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.header.encode();
        put_bytes(&mut buf, &self.encrypted_payload);
        buf.extend_from_slice(&self.auth_tag);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let header = CommonHeader::decode_from(&mut r)?;
        if header.message_type != MessageType::AuthenticatedEncryptedData {
            return Err(WeftTrustError::Codec(format!(
                "expected AuthenticatedEncryptedData, got {:?}",
                header.message_type
            )));
        }
        let encrypted_payload = r.bytes()?;
        let auth_tag = r.array::<16>()?;
        r.expect_end()?;
        Ok(Self {
            header,
            encrypted_payload,
            auth_tag,
        })
    }
}

// ── Codec helpers ────────────────────────────────────────────────────────

fn put_str(buf: &mut Vec<u8>, s: &str) {
    let len = s.len() as u16;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    let len = bytes.len() as u32;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Bounds-checked big-endian reader over a received message.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(WeftTrustError::Codec("truncated message".into()));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(u64::from_be_bytes(out))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let b = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| WeftTrustError::Codec("string field is not UTF-8".into()))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn expect_tag(&mut self, expected: MessageType) -> Result<()> {
        let tag = self.u8()?;
        if tag != expected.wire_id() {
            return Err(WeftTrustError::Codec(format!(
                "expected {expected:?} (0x{:02x}), got 0x{tag:02x}",
                expected.wire_id()
            )));
        }
        Ok(())
    }

    fn expect_end(&mut self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(WeftTrustError::Codec(format!(
                "{} trailing bytes after message",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}
