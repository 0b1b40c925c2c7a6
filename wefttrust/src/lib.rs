// WeftTrust L4 - Mutual Authentication & Forward-Secret Session Establishment
//
// Crate root: module declarations and public re-exports.

pub mod cert;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod record;
pub mod session;

// Re-export key types at crate root for convenience.
pub use cert::{CertificateCheckMode, RevocationCheckMode, RevocationChecker, RevocationStatus};
pub use crypto::signing::{SignFn, SignatureSpec};
pub use error::{Result, WeftTrustError};
pub use handshake::{HandshakeIdentity, Initiator, InitiatorStep, Responder, ResponderStep};
pub use protocol::messages::ProtocolMode;
pub use record::{InitiatorHandshakeDetails, ResponderHandshakeDetails, SessionDetails};
pub use session::{AuthenticatedEncryptionSession, AuthenticatedSession, Role, Session};
