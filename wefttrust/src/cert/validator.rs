// X.509 chain validation against a trust-anchor set.
//
// Steps, in order: parse the PEM chain, check the leaf's subject DN and key
// usage, walk the chain leaf-first (validity window + issuer signature),
// terminate at a configured trust anchor, then apply revocation checking per
// the configured mode. Every failure is an `InvalidPeerCertificate` with a
// human-readable cause.

use tracing::warn;
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

use crate::cert::{RevocationCheckMode, RevocationChecker, RevocationStatus};
use crate::error::{Result, WeftTrustError};

fn cert_error(reason: impl Into<String>) -> WeftTrustError {
    WeftTrustError::InvalidPeerCertificate(reason.into())
}

/// Validate a PEM certificate chain (leaf first) for a peer expected to be
/// `expected_distinguished_name`, optionally requiring the leaf's public key
/// to equal `expected_public_key` (raw SubjectPublicKey bytes).
pub fn validate(
    pem_chain: &str,
    expected_distinguished_name: &str,
    expected_public_key: Option<&[u8]>,
    trust_anchors: &[String],
    revocation_mode: RevocationCheckMode,
    revocation_client: &dyn RevocationChecker,
) -> Result<()> {
    let chain_pems = parse_pem_blocks(pem_chain, "certificate chain")?;
    if chain_pems.is_empty() {
        return Err(cert_error("certificate chain is empty"));
    }
    let chain = parse_certificates(&chain_pems)?;

    let anchor_pems = parse_pem_blocks_joined(trust_anchors)?;
    if anchor_pems.is_empty() {
        return Err(cert_error("no trust anchors configured"));
    }
    let anchors = parse_certificates(&anchor_pems)?;

    check_leaf(&chain[0], expected_distinguished_name, expected_public_key)?;
    check_path(&chain_pems, &chain, &anchor_pems, &anchors)?;
    check_revocation(
        &chain_pems,
        revocation_mode,
        revocation_client,
    )?;

    Ok(())
}

fn parse_pem_blocks(pem: &str, what: &str) -> Result<Vec<Pem>> {
    let mut blocks = Vec::new();
    for entry in Pem::iter_from_buffer(pem.as_bytes()) {
        let block = entry.map_err(|e| cert_error(format!("malformed PEM in {what}: {e}")))?;
        blocks.push(block);
    }
    Ok(blocks)
}

fn parse_pem_blocks_joined(anchors: &[String]) -> Result<Vec<Pem>> {
    let mut blocks = Vec::new();
    for anchor in anchors {
        blocks.extend(parse_pem_blocks(anchor, "trust anchors")?);
    }
    Ok(blocks)
}

fn parse_certificates<'a>(pems: &'a [Pem]) -> Result<Vec<X509Certificate<'a>>> {
    let mut certs = Vec::with_capacity(pems.len());
    for (i, pem) in pems.iter().enumerate() {
        let cert = pem
            .parse_x509()
            .map_err(|e| cert_error(format!("entry {i} is not a well-formed X.509 certificate: {e}")))?;
        certs.push(cert);
    }
    Ok(certs)
}

fn check_leaf(
    leaf: &X509Certificate<'_>,
    expected_distinguished_name: &str,
    expected_public_key: Option<&[u8]>,
) -> Result<()> {
    let subject = leaf.subject();
    if subject.iter_common_name().next().is_none() {
        return Err(cert_error(format!(
            "leaf subject '{subject}' is not a valid identity name (no common name)"
        )));
    }
    let subject_dn = subject.to_string();
    if subject_dn != expected_distinguished_name {
        return Err(cert_error(format!(
            "leaf subject '{subject_dn}' does not match expected identity '{expected_distinguished_name}'"
        )));
    }

    if let Some(expected) = expected_public_key {
        let actual = &leaf.public_key().subject_public_key.data;
        if actual.as_ref() != expected {
            return Err(cert_error(
                "leaf certificate public key does not match the peer's identity key",
            ));
        }
    }

    match leaf.key_usage() {
        Ok(Some(usage)) if usage.value.digital_signature() => Ok(()),
        Ok(Some(_)) => Err(cert_error("leaf key usage does not include digital-signature")),
        Ok(None) => Err(cert_error("leaf certificate has no key usage extension")),
        Err(e) => Err(cert_error(format!("malformed key usage extension: {e}"))),
    }
}

/// A certificate may only act as an issuer if it is marked as a CA and its
/// key usage permits certificate signing; otherwise any end-entity
/// certificate could mint chains for arbitrary identities.
fn check_issuer_authority(issuer: &X509Certificate<'_>) -> Result<()> {
    match issuer.basic_constraints() {
        Ok(Some(bc)) if bc.value.ca => {}
        Ok(_) => {
            return Err(cert_error(format!(
                "issuer '{}' is not a CA certificate",
                issuer.subject()
            )))
        }
        Err(e) => {
            return Err(cert_error(format!(
                "malformed basic constraints on issuer '{}': {e}",
                issuer.subject()
            )))
        }
    }
    match issuer.key_usage() {
        Ok(Some(usage)) if usage.value.key_cert_sign() => Ok(()),
        Ok(Some(_)) => Err(cert_error(format!(
            "issuer '{}' key usage does not include certificate signing",
            issuer.subject()
        ))),
        Ok(None) => Err(cert_error(format!(
            "issuer '{}' has no key usage extension",
            issuer.subject()
        ))),
        Err(e) => Err(cert_error(format!(
            "malformed key usage extension on issuer '{}': {e}",
            issuer.subject()
        ))),
    }
}

fn check_path(
    chain_pems: &[Pem],
    chain: &[X509Certificate<'_>],
    anchor_pems: &[Pem],
    anchors: &[X509Certificate<'_>],
) -> Result<()> {
    for (i, cert) in chain.iter().enumerate() {
        if !cert.validity().is_valid() {
            return Err(cert_error(format!(
                "certificate {i} ('{}') is outside its validity period",
                cert.subject()
            )));
        }
        if let Some(issuer) = chain.get(i + 1) {
            if cert.issuer() != issuer.subject() {
                return Err(cert_error(format!(
                    "certificate {i} issuer '{}' does not match next subject '{}'",
                    cert.issuer(),
                    issuer.subject()
                )));
            }
            check_issuer_authority(issuer)?;
            cert.verify_signature(Some(issuer.public_key())).map_err(|_| {
                cert_error(format!(
                    "certificate {i} signature not verifiable by its issuer"
                ))
            })?;
        }
    }

    // The chain's last certificate must be covered by an anchor: either it
    // is itself an anchor, or an anchor issued it.
    let last = chain
        .last()
        .ok_or_else(|| cert_error("certificate chain is empty"))?;
    let last_der = &chain_pems[chain.len() - 1].contents;

    let is_anchor = anchor_pems.iter().any(|a| &a.contents == last_der);
    let issued_by_anchor = anchors.iter().any(|anchor| {
        anchor.subject() == last.issuer()
            && check_issuer_authority(anchor).is_ok()
            && last.verify_signature(Some(anchor.public_key())).is_ok()
    });
    if !is_anchor && !issued_by_anchor {
        return Err(cert_error(format!(
            "chain does not terminate at a configured trust anchor (top subject '{}')",
            last.subject()
        )));
    }
    Ok(())
}

fn check_revocation(
    chain_pems: &[Pem],
    mode: RevocationCheckMode,
    client: &dyn RevocationChecker,
) -> Result<()> {
    if mode == RevocationCheckMode::Off {
        return Ok(());
    }
    for (i, pem) in chain_pems.iter().enumerate() {
        let issuer_der = chain_pems.get(i + 1).map(|p| p.contents.as_slice());
        match client.check(&pem.contents, issuer_der) {
            Ok(RevocationStatus::Good) => {}
            Ok(RevocationStatus::Revoked(reason)) => {
                return Err(cert_error(format!("certificate {i} is revoked: {reason}")));
            }
            Err(unreachable) => match mode {
                RevocationCheckMode::SoftFail => {
                    warn!(
                        certificate = i,
                        reason = %unreachable,
                        "revocation source unreachable, continuing (soft-fail)"
                    );
                }
                RevocationCheckMode::HardFail => {
                    return Err(cert_error(format!(
                        "revocation source unreachable for certificate {i}: {unreachable}"
                    )));
                }
                RevocationCheckMode::Off => unreachable!("revocation disabled"),
            },
        }
    }
    Ok(())
}
