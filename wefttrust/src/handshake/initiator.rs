// Initiator side of the four-message handshake.

use tracing::debug;

use crate::cert::CertificateCheckMode;
use crate::crypto::kdf::{
    derive_handshake_secrets, derive_session_secrets, HandshakeSecrets, SessionSecrets,
};
use crate::crypto::keys::EphemeralKeyPair;
use crate::crypto::signing::{SignFn, SignatureSpec};
use crate::error::{Result, WeftTrustError};
use crate::handshake::state::InitiatorStep;
use crate::handshake::{open_and_check_payload, seal_handshake_payload, HandshakeIdentity};
use crate::protocol::messages::{
    CommonHeader, InitiatorHandshakeMessage, InitiatorHello, MessageType, ProtocolMode,
    ResponderHandshakeMessage, ResponderHello,
};
use crate::protocol::transcript::Transcript;
use crate::protocol::{unix_timestamp_ms, MAX_HELLO_MESSAGE_SIZE};
use crate::session::{Role, Session};

/// Initiator handshake state machine.
///
/// Drives the connection-opening side: sends the first Hello, receives the
/// responder's, sends the first authenticated handshake message, validates
/// the responder's. Strictly forward; generators return their cached message
/// when re-invoked, receive/validate calls are no-ops when re-invoked with
/// the message already accepted.
#[derive(Debug)]
pub struct Initiator {
    pub(crate) step: InitiatorStep,
    pub(crate) identity: HandshakeIdentity,
    pub(crate) supported_modes: Vec<ProtocolMode>,
    pub(crate) max_message_size: u64,
    pub(crate) our_public_key: Vec<u8>,
    pub(crate) certificate_mode: CertificateCheckMode,
    pub(crate) transcript: Transcript,
    pub(crate) ephemeral: Option<EphemeralKeyPair>,
    pub(crate) our_hello: Option<InitiatorHello>,
    pub(crate) peer_hello: Option<ResponderHello>,
    pub(crate) selected_mode: Option<ProtocolMode>,
    pub(crate) negotiated_max_message_size: Option<u64>,
    pub(crate) handshake_secrets: Option<HandshakeSecrets>,
    pub(crate) our_handshake_message: Option<InitiatorHandshakeMessage>,
    pub(crate) peer_handshake_message: Option<ResponderHandshakeMessage>,
    pub(crate) session_secrets: Option<SessionSecrets>,
}

impl Initiator {
    pub fn new(
        identity: HandshakeIdentity,
        supported_modes: Vec<ProtocolMode>,
        max_message_size: u64,
        our_public_key: Vec<u8>,
        certificate_mode: CertificateCheckMode,
    ) -> Self {
        Self {
            step: InitiatorStep::Init,
            identity,
            supported_modes,
            max_message_size,
            our_public_key,
            certificate_mode,
            transcript: Transcript::new(),
            ephemeral: None,
            our_hello: None,
            peer_hello: None,
            selected_mode: None,
            negotiated_max_message_size: None,
            handshake_secrets: None,
            our_handshake_message: None,
            peer_handshake_message: None,
            session_secrets: None,
        }
    }

    pub fn step(&self) -> InitiatorStep {
        self.step
    }

    fn invalid_state(&self, operation: &'static str) -> WeftTrustError {
        WeftTrustError::InvalidState {
            step: self.step.label(),
            operation,
        }
    }

    /// Message 1. Generates the ephemeral keypair and opens the transcript.
    pub fn generate_initiator_hello(&mut self) -> Result<InitiatorHello> {
        if self.step != InitiatorStep::Init {
            return self
                .our_hello
                .clone()
                .ok_or_else(|| self.invalid_state("generate_initiator_hello"));
        }

        let ephemeral = EphemeralKeyPair::generate();
        let hello = InitiatorHello {
            session_id: self.identity.session_id.clone(),
            group_id: self.identity.group_id.clone(),
            ephemeral_public_key: ephemeral.public_key_bytes(),
            supported_modes: self.supported_modes.clone(),
            max_message_size: self.max_message_size,
        };
        let encoded = hello.encode();
        if encoded.len() > MAX_HELLO_MESSAGE_SIZE {
            return Err(WeftTrustError::HelloTooLarge {
                size: encoded.len(),
                limit: MAX_HELLO_MESSAGE_SIZE,
            });
        }

        self.transcript.append(&encoded);
        self.ephemeral = Some(ephemeral);
        self.our_hello = Some(hello.clone());
        self.step = InitiatorStep::SentHello;
        debug!(session_id = %self.identity.session_id, "initiator hello generated");
        Ok(hello)
    }

    /// Message 2. Checks the negotiated parameters, advances the transcript,
    /// and derives the handshake secrets (after which the ephemeral secret
    /// is zeroed).
    pub fn receive_responder_hello(&mut self, hello: &ResponderHello) -> Result<()> {
        if self.step != InitiatorStep::SentHello {
            if self.peer_hello.as_ref() == Some(hello) {
                return Ok(());
            }
            return Err(self.invalid_state("receive_responder_hello"));
        }

        if hello.session_id != self.identity.session_id {
            return Err(WeftTrustError::InvalidHandshakeMessage(format!(
                "responder hello for session '{}', expected '{}'",
                hello.session_id, self.identity.session_id
            )));
        }
        if !self.supported_modes.contains(&hello.selected_mode) {
            return Err(WeftTrustError::NoCommonMode);
        }

        self.transcript.append(&hello.encode());

        let ephemeral = self
            .ephemeral
            .take()
            .ok_or_else(|| self.invalid_state("receive_responder_hello"))?;
        let shared = ephemeral.diffie_hellman(&hello.ephemeral_public_key);
        let secrets = derive_handshake_secrets(&shared, &self.transcript.hash())?;
        drop(ephemeral);

        self.negotiated_max_message_size =
            Some(self.max_message_size.min(hello.max_message_size));
        self.selected_mode = Some(hello.selected_mode);
        self.handshake_secrets = Some(secrets);
        self.peer_hello = Some(hello.clone());
        self.step = InitiatorStep::ReceivedPeerHello;
        debug!(
            session_id = %self.identity.session_id,
            mode = ?hello.selected_mode,
            "responder hello accepted"
        );
        Ok(())
    }

    /// The derived handshake secrets; error before both Hellos are in.
    pub fn generate_handshake_secrets(&self) -> Result<&HandshakeSecrets> {
        self.handshake_secrets
            .as_ref()
            .ok_or_else(|| self.invalid_state("generate_handshake_secrets"))
    }

    /// Message 3. Builds the transcript-bound payload, obtains the identity
    /// signature from `sign`, and seals it under the initiator-direction
    /// handshake secret. Idempotent: on re-invocation the cached message is
    /// returned and `sign` is not called again.
    pub fn generate_our_handshake_message(
        &mut self,
        expected_peer_public_key: &[u8],
        our_certificate_chain: Option<String>,
        sign: &SignFn<'_>,
    ) -> Result<InitiatorHandshakeMessage> {
        if self.step != InitiatorStep::ReceivedPeerHello {
            return self
                .our_handshake_message
                .clone()
                .ok_or_else(|| self.invalid_state("generate_our_handshake_message"));
        }

        let secrets = self.generate_handshake_secrets()?;
        let header = CommonHeader::new(
            MessageType::InitiatorHandshake,
            self.identity.session_id.clone(),
            1,
            unix_timestamp_ms(),
        );
        let (encrypted_payload, auth_tag) = seal_handshake_payload(
            &self.transcript,
            &secrets.initiator_key,
            &secrets.initiator_iv,
            &header,
            &self.our_public_key,
            our_certificate_chain.as_deref(),
            expected_peer_public_key,
            sign,
        )?;
        let message = InitiatorHandshakeMessage {
            header,
            encrypted_payload,
            auth_tag,
        };

        self.transcript.append(&message.encode());
        self.our_handshake_message = Some(message.clone());
        self.step = InitiatorStep::SentHandshakeMessage;
        debug!(session_id = %self.identity.session_id, "initiator handshake message generated");
        Ok(message)
    }

    /// Message 4. Decrypts and checks the responder's handshake message,
    /// then derives the session secrets from the complete transcript.
    pub fn validate_peer_handshake_message(
        &mut self,
        message: &ResponderHandshakeMessage,
        expected_peer_name: &str,
        expected_peer_public_key: &[u8],
        signature_spec: SignatureSpec,
    ) -> Result<()> {
        if self.step != InitiatorStep::SentHandshakeMessage {
            if self.peer_handshake_message.as_ref() == Some(message) {
                return Ok(());
            }
            return Err(self.invalid_state("validate_peer_handshake_message"));
        }

        if message.header.session_id != self.identity.session_id {
            return Err(WeftTrustError::InvalidHandshakeMessage(format!(
                "responder handshake message for session '{}', expected '{}'",
                message.header.session_id, self.identity.session_id
            )));
        }

        let secrets = self.generate_handshake_secrets()?;
        open_and_check_payload(
            &self.transcript,
            &secrets.responder_key,
            &secrets.responder_iv,
            &message.header,
            &message.encrypted_payload,
            &message.auth_tag,
            &self.our_public_key,
            expected_peer_name,
            expected_peer_public_key,
            signature_spec,
            &self.certificate_mode,
        )?;

        self.transcript.append(&message.encode());
        let session_secrets =
            derive_session_secrets(self.generate_handshake_secrets()?, &self.transcript.hash())?;
        self.session_secrets = Some(session_secrets);
        self.peer_handshake_message = Some(message.clone());
        self.step = InitiatorStep::SessionEstablished;
        debug!(session_id = %self.identity.session_id, "session established (initiator)");
        Ok(())
    }

    /// Terminal accessor: the established session, in the negotiated mode.
    pub fn session(&self) -> Result<Session> {
        if self.step != InitiatorStep::SessionEstablished {
            return Err(self.invalid_state("session"));
        }
        let mode = self
            .selected_mode
            .ok_or_else(|| self.invalid_state("session"))?;
        let max = self
            .negotiated_max_message_size
            .ok_or_else(|| self.invalid_state("session"))?;
        let secrets = self
            .session_secrets
            .clone()
            .ok_or_else(|| self.invalid_state("session"))?;
        Ok(Session::new(
            Role::Initiator,
            mode,
            self.identity.session_id.clone(),
            max,
            secrets,
        ))
    }
}
