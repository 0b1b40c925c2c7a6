// Responder side of the four-message handshake.

use tracing::debug;

use crate::cert::CertificateCheckMode;
use crate::crypto::kdf::{
    derive_handshake_secrets, derive_session_secrets, HandshakeSecrets, SessionSecrets,
};
use crate::crypto::keys::EphemeralKeyPair;
use crate::crypto::signing::{SignFn, SignatureSpec};
use crate::error::{Result, WeftTrustError};
use crate::handshake::state::ResponderStep;
use crate::handshake::{open_and_check_payload, seal_handshake_payload, HandshakeIdentity};
use crate::protocol::messages::{
    select_mode, CommonHeader, InitiatorHandshakeMessage, InitiatorHello, MessageType,
    ProtocolMode, ResponderHandshakeMessage, ResponderHello,
};
use crate::protocol::transcript::Transcript;
use crate::protocol::{unix_timestamp_ms, MAX_HELLO_MESSAGE_SIZE};
use crate::session::{Role, Session};

/// Responder handshake state machine.
///
/// Mirror of [`crate::handshake::Initiator`] for the accepting side, plus
/// mode negotiation: [`Responder::generate_responder_hello`] computes the
/// mode intersection and fails fast before any key material is generated.
/// The responder's ephemeral keypair never outlives that one call, since
/// both ephemerals are known by the time its Hello is built.
#[derive(Debug)]
pub struct Responder {
    pub(crate) step: ResponderStep,
    pub(crate) identity: HandshakeIdentity,
    pub(crate) supported_modes: Vec<ProtocolMode>,
    pub(crate) max_message_size: u64,
    pub(crate) our_public_key: Vec<u8>,
    pub(crate) certificate_mode: CertificateCheckMode,
    pub(crate) transcript: Transcript,
    pub(crate) peer_hello: Option<InitiatorHello>,
    pub(crate) our_hello: Option<ResponderHello>,
    pub(crate) selected_mode: Option<ProtocolMode>,
    pub(crate) negotiated_max_message_size: Option<u64>,
    pub(crate) handshake_secrets: Option<HandshakeSecrets>,
    pub(crate) peer_handshake_message: Option<InitiatorHandshakeMessage>,
    pub(crate) our_handshake_message: Option<ResponderHandshakeMessage>,
    pub(crate) session_secrets: Option<SessionSecrets>,
}

impl Responder {
    pub fn new(
        identity: HandshakeIdentity,
        supported_modes: Vec<ProtocolMode>,
        max_message_size: u64,
        our_public_key: Vec<u8>,
        certificate_mode: CertificateCheckMode,
    ) -> Self {
        Self {
            step: ResponderStep::Init,
            identity,
            supported_modes,
            max_message_size,
            our_public_key,
            certificate_mode,
            transcript: Transcript::new(),
            peer_hello: None,
            our_hello: None,
            selected_mode: None,
            negotiated_max_message_size: None,
            handshake_secrets: None,
            peer_handshake_message: None,
            our_handshake_message: None,
            session_secrets: None,
        }
    }

    pub fn step(&self) -> ResponderStep {
        self.step
    }

    fn invalid_state(&self, operation: &'static str) -> WeftTrustError {
        WeftTrustError::InvalidState {
            step: self.step.label(),
            operation,
        }
    }

    /// Message 1. Checks the session/group binding and opens the transcript.
    /// Mode selection is deferred to [`Responder::generate_responder_hello`].
    pub fn receive_initiator_hello(&mut self, hello: &InitiatorHello) -> Result<()> {
        if self.step != ResponderStep::Init {
            if self.peer_hello.as_ref() == Some(hello) {
                return Ok(());
            }
            return Err(self.invalid_state("receive_initiator_hello"));
        }

        if hello.session_id != self.identity.session_id {
            return Err(WeftTrustError::InvalidHandshakeMessage(format!(
                "initiator hello for session '{}', expected '{}'",
                hello.session_id, self.identity.session_id
            )));
        }
        if hello.group_id != self.identity.group_id {
            return Err(WeftTrustError::InvalidHandshakeMessage(format!(
                "initiator hello for group '{}', expected '{}'",
                hello.group_id, self.identity.group_id
            )));
        }

        self.transcript.append(&hello.encode());
        self.peer_hello = Some(hello.clone());
        self.step = ResponderStep::ReceivedPeerHello;
        debug!(session_id = %self.identity.session_id, "initiator hello accepted");
        Ok(())
    }

    /// Message 2. Selects the protocol mode (failing with `NoCommonMode`
    /// before any key material is generated), then builds the Hello and
    /// derives the handshake secrets; the ephemeral secret does not outlive
    /// this call.
    pub fn generate_responder_hello(&mut self) -> Result<ResponderHello> {
        if self.step != ResponderStep::ReceivedPeerHello {
            return self
                .our_hello
                .clone()
                .ok_or_else(|| self.invalid_state("generate_responder_hello"));
        }

        let peer_hello = self
            .peer_hello
            .as_ref()
            .ok_or_else(|| self.invalid_state("generate_responder_hello"))?;
        let selected = select_mode(&self.supported_modes, &peer_hello.supported_modes)
            .ok_or(WeftTrustError::NoCommonMode)?;

        let ephemeral = EphemeralKeyPair::generate();
        let hello = ResponderHello {
            session_id: self.identity.session_id.clone(),
            ephemeral_public_key: ephemeral.public_key_bytes(),
            selected_mode: selected,
            max_message_size: self.max_message_size,
        };
        let encoded = hello.encode();
        if encoded.len() > MAX_HELLO_MESSAGE_SIZE {
            return Err(WeftTrustError::HelloTooLarge {
                size: encoded.len(),
                limit: MAX_HELLO_MESSAGE_SIZE,
            });
        }

        let peer_ephemeral = peer_hello.ephemeral_public_key;
        let peer_max = peer_hello.max_message_size;
        self.transcript.append(&encoded);
        let shared = ephemeral.diffie_hellman(&peer_ephemeral);
        let secrets = derive_handshake_secrets(&shared, &self.transcript.hash())?;
        drop(ephemeral);

        self.negotiated_max_message_size = Some(self.max_message_size.min(peer_max));
        self.selected_mode = Some(selected);
        self.handshake_secrets = Some(secrets);
        self.our_hello = Some(hello.clone());
        self.step = ResponderStep::SentHello;
        debug!(
            session_id = %self.identity.session_id,
            mode = ?selected,
            "responder hello generated"
        );
        Ok(hello)
    }

    /// The derived handshake secrets; error before both Hellos are in.
    pub fn generate_handshake_secrets(&self) -> Result<&HandshakeSecrets> {
        self.handshake_secrets
            .as_ref()
            .ok_or_else(|| self.invalid_state("generate_handshake_secrets"))
    }

    /// Message 3. Decrypts and checks the initiator's handshake message.
    /// Session secrets cannot be derived yet; they also cover message 4.
    pub fn validate_peer_handshake_message(
        &mut self,
        message: &InitiatorHandshakeMessage,
        expected_peer_name: &str,
        expected_peer_public_key: &[u8],
        signature_spec: SignatureSpec,
    ) -> Result<()> {
        if self.step != ResponderStep::SentHello {
            if self.peer_handshake_message.as_ref() == Some(message) {
                return Ok(());
            }
            return Err(self.invalid_state("validate_peer_handshake_message"));
        }

        if message.header.session_id != self.identity.session_id {
            return Err(WeftTrustError::InvalidHandshakeMessage(format!(
                "initiator handshake message for session '{}', expected '{}'",
                message.header.session_id, self.identity.session_id
            )));
        }

        let secrets = self.generate_handshake_secrets()?;
        open_and_check_payload(
            &self.transcript,
            &secrets.initiator_key,
            &secrets.initiator_iv,
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
        self.peer_handshake_message = Some(message.clone());
        self.step = ResponderStep::ReceivedHandshakeMessage;
        debug!(session_id = %self.identity.session_id, "initiator handshake message accepted");
        Ok(())
    }

    /// Message 4. Builds and seals the responder's handshake message, then
    /// derives the session secrets from the now-complete transcript.
    pub fn generate_our_handshake_message(
        &mut self,
        expected_peer_public_key: &[u8],
        our_certificate_chain: Option<String>,
        sign: &SignFn<'_>,
    ) -> Result<ResponderHandshakeMessage> {
        if self.step != ResponderStep::ReceivedHandshakeMessage {
            return self
                .our_handshake_message
                .clone()
                .ok_or_else(|| self.invalid_state("generate_our_handshake_message"));
        }

        let secrets = self.generate_handshake_secrets()?;
        let header = CommonHeader::new(
            MessageType::ResponderHandshake,
            self.identity.session_id.clone(),
            1,
            unix_timestamp_ms(),
        );
        let (encrypted_payload, auth_tag) = seal_handshake_payload(
            &self.transcript,
            &secrets.responder_key,
            &secrets.responder_iv,
            &header,
            &self.our_public_key,
            our_certificate_chain.as_deref(),
            expected_peer_public_key,
            sign,
        )?;
        let message = ResponderHandshakeMessage {
            header,
            encrypted_payload,
            auth_tag,
        };

        self.transcript.append(&message.encode());
        let session_secrets =
            derive_session_secrets(self.generate_handshake_secrets()?, &self.transcript.hash())?;
        self.session_secrets = Some(session_secrets);
        self.our_handshake_message = Some(message.clone());
        self.step = ResponderStep::SentHandshakeMessage;
        debug!(session_id = %self.identity.session_id, "responder handshake message generated");
        Ok(message)
    }

    /// Terminal accessor: the established session, in the negotiated mode.
    /// Legal once the responder's handshake message has been generated.
    pub fn session(&mut self) -> Result<Session> {
        match self.step {
            ResponderStep::SentHandshakeMessage | ResponderStep::SessionEstablished => {}
            _ => return Err(self.invalid_state("session")),
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
        if self.step == ResponderStep::SentHandshakeMessage {
            self.step = ResponderStep::SessionEstablished;
            debug!(session_id = %self.identity.session_id, "session established (responder)");
        }
        Ok(Session::new(
            Role::Responder,
            mode,
            self.identity.session_id.clone(),
            max,
            secrets,
        ))
    }
}
