// Handshake step enums, one per role.

use serde::{Deserialize, Serialize};

/// Steps of the initiator state machine, in order. Transitions are strictly
/// forward; a step is never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiatorStep {
    /// Nothing sent yet.
    Init,
    /// InitiatorHello generated and handed to the transport.
    SentHello,
    /// ResponderHello accepted; handshake secrets derived, ephemeral zeroed.
    ReceivedPeerHello,
    /// InitiatorHandshake generated.
    SentHandshakeMessage,
    /// ResponderHandshake validated; session secrets derived.
    SessionEstablished,
}

impl InitiatorStep {
    /// Human-readable label for error messages.
    pub fn label(self) -> &'static str {
        match self {
            InitiatorStep::Init => "Init",
            InitiatorStep::SentHello => "SentHello",
            InitiatorStep::ReceivedPeerHello => "ReceivedPeerHello",
            InitiatorStep::SentHandshakeMessage => "SentHandshakeMessage",
            InitiatorStep::SessionEstablished => "SessionEstablished",
        }
    }
}

/// Steps of the responder state machine, in order. The responder validates
/// the initiator's handshake message before it can send its own, so the two
/// handshake steps appear in the opposite order from the initiator's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderStep {
    /// Nothing received yet.
    Init,
    /// InitiatorHello accepted.
    ReceivedPeerHello,
    /// Mode selected, ResponderHello generated, handshake secrets derived.
    SentHello,
    /// InitiatorHandshake validated.
    ReceivedHandshakeMessage,
    /// ResponderHandshake generated; session secrets derived.
    SentHandshakeMessage,
    /// Terminal accessor called; no further handshake traffic expected.
    SessionEstablished,
}

impl ResponderStep {
    /// Human-readable label for error messages.
    pub fn label(self) -> &'static str {
        match self {
            ResponderStep::Init => "Init",
            ResponderStep::ReceivedPeerHello => "ReceivedPeerHello",
            ResponderStep::SentHello => "SentHello",
            ResponderStep::ReceivedHandshakeMessage => "ReceivedHandshakeMessage",
            ResponderStep::SentHandshakeMessage => "SentHandshakeMessage",
            ResponderStep::SessionEstablished => "SessionEstablished",
        }
    }
}
