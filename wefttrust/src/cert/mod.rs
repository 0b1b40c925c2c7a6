// Certificate-based identity checking: configuration and path validator.

pub mod validator;

use std::fmt;
use std::sync::Arc;

/// How an unreachable or positive revocation result affects validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationCheckMode {
    /// Skip revocation checking entirely.
    Off,
    /// An unreachable revocation source passes with a warning; a positive
    /// revocation still fails.
    SoftFail,
    /// An unreachable revocation source fails validation.
    HardFail,
}

/// Result of asking the revocation source about one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    Good,
    Revoked(String),
}

/// Client for whatever revocation source the trust-store provider uses
/// (CRL, OCSP, ...). Supplied by the deployment; this crate only consumes
/// it. `Err(reason)` means the source was unreachable, which is interpreted
/// per [`RevocationCheckMode`].
pub trait RevocationChecker: Send + Sync {
    fn check(
        &self,
        certificate_der: &[u8],
        issuer_der: Option<&[u8]>,
    ) -> std::result::Result<RevocationStatus, String>;
}

/// Whether (and how) a peer must prove its identity key with a certificate.
#[derive(Clone)]
pub enum CertificateCheckMode {
    /// Identity is proven by signature alone; the public key hash is pinned
    /// out-of-band. A peer presenting no chain is fine.
    NoCertificate,
    /// The peer must present a chain anchored in `trust_anchors` (PEM),
    /// subject to revocation checking.
    CheckCertificate {
        trust_anchors: Vec<String>,
        revocation_mode: RevocationCheckMode,
        revocation_client: Arc<dyn RevocationChecker>,
    },
}

impl CertificateCheckMode {
    pub fn requires_certificate(&self) -> bool {
        matches!(self, CertificateCheckMode::CheckCertificate { .. })
    }
}

impl fmt::Debug for CertificateCheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateCheckMode::NoCertificate => f.write_str("NoCertificate"),
            CertificateCheckMode::CheckCertificate {
                trust_anchors,
                revocation_mode,
                ..
            } => f
                .debug_struct("CheckCertificate")
                .field("trust_anchors", &trust_anchors.len())
                .field("revocation_mode", revocation_mode)
                .finish_non_exhaustive(),
        }
    }
}
