// Serialization bridge: transport-neutral detail records for handshake
// machines and sessions, so an external store can persist an in-flight
// handshake and resume it in another process.
//
// Records carry everything a machine needs to continue, including raw
// transcript bytes and any secrets derived so far. The one piece that is
// deliberately not serialized is the certificate check configuration: trust
// anchors and the revocation client are collaborator-owned, so
// `from_detail_record` takes a fresh `CertificateCheckMode`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::cert::CertificateCheckMode;
use crate::crypto::kdf::{HandshakeSecrets, SessionSecrets};
use crate::crypto::keys::EphemeralKeyPair;
use crate::error::{Result, WeftTrustError};
use crate::handshake::{HandshakeIdentity, Initiator, InitiatorStep, Responder, ResponderStep};
use crate::protocol::messages::{
    InitiatorHandshakeMessage, InitiatorHello, ProtocolMode, ResponderHandshakeMessage,
    ResponderHello,
};
use crate::protocol::transcript::Transcript;
use crate::session::{
    AuthenticatedEncryptionSession, AuthenticatedSession, Role, Session,
};

// ── Handshake records ────────────────────────────────────────────────────

/// Detail record of an [`Initiator`] at any step.
///
/// The ephemeral secret appears only while the machine is at `SentHello`;
/// from `ReceivedPeerHello` on it has been consumed and zeroed, and the
/// record carries the derived handshake secrets instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatorHandshakeDetails {
    pub step: InitiatorStep,
    pub identity: HandshakeIdentity,
    pub supported_modes: Vec<ProtocolMode>,
    pub max_message_size: u64,
    pub our_public_key: Vec<u8>,
    pub transcript: Vec<u8>,
    pub ephemeral_secret: Option<[u8; 32]>,
    pub our_hello: Option<InitiatorHello>,
    pub peer_hello: Option<ResponderHello>,
    pub selected_mode: Option<ProtocolMode>,
    pub negotiated_max_message_size: Option<u64>,
    pub handshake_secrets: Option<HandshakeSecrets>,
    pub our_handshake_message: Option<InitiatorHandshakeMessage>,
    pub peer_handshake_message: Option<ResponderHandshakeMessage>,
    pub session_secrets: Option<SessionSecrets>,
}

/// Detail record of a [`Responder`] at any step. The responder's ephemeral
/// never outlives a single call, so no record ever carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderHandshakeDetails {
    pub step: ResponderStep,
    pub identity: HandshakeIdentity,
    pub supported_modes: Vec<ProtocolMode>,
    pub max_message_size: u64,
    pub our_public_key: Vec<u8>,
    pub transcript: Vec<u8>,
    pub peer_hello: Option<InitiatorHello>,
    pub our_hello: Option<ResponderHello>,
    pub selected_mode: Option<ProtocolMode>,
    pub negotiated_max_message_size: Option<u64>,
    pub handshake_secrets: Option<HandshakeSecrets>,
    pub peer_handshake_message: Option<InitiatorHandshakeMessage>,
    pub our_handshake_message: Option<ResponderHandshakeMessage>,
    pub session_secrets: Option<SessionSecrets>,
}

// ── Session records ──────────────────────────────────────────────────────

/// Detail record of an established [`Session`], tagged by variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionDetails {
    Authenticated(AuthenticatedSessionDetails),
    AuthenticatedEncryption(AuthenticatedEncryptionSessionDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedSessionDetails {
    pub role: Role,
    pub session_id: String,
    pub max_message_size: u64,
    pub secrets: SessionSecrets,
    pub send_sequence: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedEncryptionSessionDetails {
    pub role: Role,
    pub session_id: String,
    pub max_message_size: u64,
    pub secrets: SessionSecrets,
    pub send_sequence: u64,
}

// ── JSON convenience ─────────────────────────────────────────────────────

/// Encode any detail record as JSON.
pub fn to_json<R: Serialize>(record: &R) -> Result<String> {
    serde_json::to_string(record).map_err(|e| WeftTrustError::Serialization(e.to_string()))
}

/// Decode a detail record from JSON.
pub fn from_json<R: DeserializeOwned>(json: &str) -> Result<R> {
    serde_json::from_str(json).map_err(|e| WeftTrustError::Serialization(e.to_string()))
}

fn require<T>(value: Option<T>, field: &str, step: &str) -> Result<T> {
    value.ok_or_else(|| {
        WeftTrustError::Serialization(format!("record at step {step} is missing {field}"))
    })
}

// ── Initiator bridge ─────────────────────────────────────────────────────

impl Initiator {
    pub fn to_detail_record(&self) -> InitiatorHandshakeDetails {
        InitiatorHandshakeDetails {
            step: self.step,
            identity: self.identity.clone(),
            supported_modes: self.supported_modes.clone(),
            max_message_size: self.max_message_size,
            our_public_key: self.our_public_key.clone(),
            transcript: self.transcript.as_bytes().to_vec(),
            ephemeral_secret: self.ephemeral.as_ref().map(|e| e.secret_bytes()),
            our_hello: self.our_hello.clone(),
            peer_hello: self.peer_hello.clone(),
            selected_mode: self.selected_mode,
            negotiated_max_message_size: self.negotiated_max_message_size,
            handshake_secrets: self.handshake_secrets.clone(),
            our_handshake_message: self.our_handshake_message.clone(),
            peer_handshake_message: self.peer_handshake_message.clone(),
            session_secrets: self.session_secrets.clone(),
        }
    }

    /// Rebuild a machine from its record. `certificate_mode` is re-injected
    /// by the caller; it is not part of the record.
    pub fn from_detail_record(
        record: InitiatorHandshakeDetails,
        certificate_mode: CertificateCheckMode,
    ) -> Result<Self> {
        let step = record.step;
        let label = step.label();
        if step == InitiatorStep::SentHello {
            require(record.ephemeral_secret.as_ref(), "ephemeral_secret", label)?;
        }
        if step != InitiatorStep::Init {
            require(record.our_hello.as_ref(), "our_hello", label)?;
        }
        if matches!(
            step,
            InitiatorStep::ReceivedPeerHello
                | InitiatorStep::SentHandshakeMessage
                | InitiatorStep::SessionEstablished
        ) {
            require(record.handshake_secrets.as_ref(), "handshake_secrets", label)?;
            require(record.selected_mode.as_ref(), "selected_mode", label)?;
            require(
                record.negotiated_max_message_size.as_ref(),
                "negotiated_max_message_size",
                label,
            )?;
        }
        if matches!(
            step,
            InitiatorStep::SentHandshakeMessage | InitiatorStep::SessionEstablished
        ) {
            require(
                record.our_handshake_message.as_ref(),
                "our_handshake_message",
                label,
            )?;
        }
        if step == InitiatorStep::SessionEstablished {
            require(record.session_secrets.as_ref(), "session_secrets", label)?;
        }

        Ok(Self {
            step,
            identity: record.identity,
            supported_modes: record.supported_modes,
            max_message_size: record.max_message_size,
            our_public_key: record.our_public_key,
            certificate_mode,
            transcript: Transcript::from_bytes(record.transcript),
            ephemeral: record.ephemeral_secret.map(EphemeralKeyPair::from_secret_bytes),
            our_hello: record.our_hello,
            peer_hello: record.peer_hello,
            selected_mode: record.selected_mode,
            negotiated_max_message_size: record.negotiated_max_message_size,
            handshake_secrets: record.handshake_secrets,
            our_handshake_message: record.our_handshake_message,
            peer_handshake_message: record.peer_handshake_message,
            session_secrets: record.session_secrets,
        })
    }
}

// ── Responder bridge ─────────────────────────────────────────────────────

impl Responder {
    pub fn to_detail_record(&self) -> ResponderHandshakeDetails {
        ResponderHandshakeDetails {
            step: self.step,
            identity: self.identity.clone(),
            supported_modes: self.supported_modes.clone(),
            max_message_size: self.max_message_size,
            our_public_key: self.our_public_key.clone(),
            transcript: self.transcript.as_bytes().to_vec(),
            peer_hello: self.peer_hello.clone(),
            our_hello: self.our_hello.clone(),
            selected_mode: self.selected_mode,
            negotiated_max_message_size: self.negotiated_max_message_size,
            handshake_secrets: self.handshake_secrets.clone(),
            peer_handshake_message: self.peer_handshake_message.clone(),
            our_handshake_message: self.our_handshake_message.clone(),
            session_secrets: self.session_secrets.clone(),
        }
    }

    /// Rebuild a machine from its record. `certificate_mode` is re-injected
    /// by the caller; it is not part of the record.
    pub fn from_detail_record(
        record: ResponderHandshakeDetails,
        certificate_mode: CertificateCheckMode,
    ) -> Result<Self> {
        let step = record.step;
        let label = step.label();
        if step != ResponderStep::Init {
            require(record.peer_hello.as_ref(), "peer_hello", label)?;
        }
        if matches!(
            step,
            ResponderStep::SentHello
                | ResponderStep::ReceivedHandshakeMessage
                | ResponderStep::SentHandshakeMessage
                | ResponderStep::SessionEstablished
        ) {
            require(record.our_hello.as_ref(), "our_hello", label)?;
            require(record.handshake_secrets.as_ref(), "handshake_secrets", label)?;
            require(record.selected_mode.as_ref(), "selected_mode", label)?;
            require(
                record.negotiated_max_message_size.as_ref(),
                "negotiated_max_message_size",
                label,
            )?;
        }
        if matches!(
            step,
            ResponderStep::SentHandshakeMessage | ResponderStep::SessionEstablished
        ) {
            require(
                record.our_handshake_message.as_ref(),
                "our_handshake_message",
                label,
            )?;
            require(record.session_secrets.as_ref(), "session_secrets", label)?;
        }

        Ok(Self {
            step,
            identity: record.identity,
            supported_modes: record.supported_modes,
            max_message_size: record.max_message_size,
            our_public_key: record.our_public_key,
            certificate_mode,
            transcript: Transcript::from_bytes(record.transcript),
            peer_hello: record.peer_hello,
            our_hello: record.our_hello,
            selected_mode: record.selected_mode,
            negotiated_max_message_size: record.negotiated_max_message_size,
            handshake_secrets: record.handshake_secrets,
            peer_handshake_message: record.peer_handshake_message,
            our_handshake_message: record.our_handshake_message,
            session_secrets: record.session_secrets,
        })
    }
}

// ── Session bridge ───────────────────────────────────────────────────────

impl Session {
    pub fn to_detail_record(&self) -> SessionDetails {
        match self {
            Session::Authenticated(s) => SessionDetails::Authenticated(AuthenticatedSessionDetails {
                role: s.role,
                session_id: s.session_id.clone(),
                max_message_size: s.max_message_size,
                secrets: s.secrets.clone(),
                send_sequence: s.send_sequence,
            }),
            Session::AuthenticatedEncryption(s) => {
                SessionDetails::AuthenticatedEncryption(AuthenticatedEncryptionSessionDetails {
                    role: s.role,
                    session_id: s.session_id.clone(),
                    max_message_size: s.max_message_size,
                    secrets: s.secrets.clone(),
                    send_sequence: s.send_sequence,
                })
            }
        }
    }

    pub fn from_detail_record(record: SessionDetails) -> Self {
        match record {
            SessionDetails::Authenticated(d) => Session::Authenticated(AuthenticatedSession {
                role: d.role,
                session_id: d.session_id,
                max_message_size: d.max_message_size,
                secrets: d.secrets,
                send_sequence: d.send_sequence,
            }),
            SessionDetails::AuthenticatedEncryption(d) => {
                Session::AuthenticatedEncryption(AuthenticatedEncryptionSession {
                    role: d.role,
                    session_id: d.session_id,
                    max_message_size: d.max_message_size,
                    secrets: d.secrets,
                    send_sequence: d.send_sequence,
                })
            }
        }
    }
}
