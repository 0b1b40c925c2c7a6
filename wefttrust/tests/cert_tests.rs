// Certificate validation tests against chains minted with rcgen.

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose,
};
use wefttrust::cert::{
    validator, RevocationCheckMode, RevocationChecker, RevocationStatus,
};
use wefttrust::WeftTrustError;

struct AllGood;

impl RevocationChecker for AllGood {
    fn check(&self, _cert: &[u8], _issuer: Option<&[u8]>) -> Result<RevocationStatus, String> {
        Ok(RevocationStatus::Good)
    }
}

struct Unreachable;

impl RevocationChecker for Unreachable {
    fn check(&self, _cert: &[u8], _issuer: Option<&[u8]>) -> Result<RevocationStatus, String> {
        Err("revocation source timed out".into())
    }
}

struct EverythingRevoked;

impl RevocationChecker for EverythingRevoked {
    fn check(&self, _cert: &[u8], _issuer: Option<&[u8]>) -> Result<RevocationStatus, String> {
        Ok(RevocationStatus::Revoked("key compromise".into()))
    }
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
}

fn leaf_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    // rcgen only serializes the extensions block (including the key usage
    // requested below) when something other than key_usages forces it;
    // ExplicitNoCa does, and also emits the CA:FALSE these leaves intend.
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params
}

/// Helper: root -> intermediate -> leaf, returning (chain PEM, root PEM).
fn make_chain(leaf_name: &str) -> (String, String) {
    let root_key = KeyPair::generate().unwrap();
    let root = ca_params("root ca").self_signed(&root_key).unwrap();

    let inter_key = KeyPair::generate().unwrap();
    let inter = ca_params("intermediate ca")
        .signed_by(&inter_key, &root, &root_key)
        .unwrap();

    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params(leaf_name)
        .signed_by(&leaf_key, &inter, &inter_key)
        .unwrap();

    (format!("{}{}", leaf.pem(), inter.pem()), root.pem())
}

fn assert_cert_error(result: wefttrust::Result<()>, expected_fragment: &str) {
    match result.unwrap_err() {
        WeftTrustError::InvalidPeerCertificate(reason) => {
            assert!(
                reason.contains(expected_fragment),
                "reason '{reason}' does not mention '{expected_fragment}'"
            );
        }
        other => panic!("expected InvalidPeerCertificate, got {other:?}"),
    }
}

// ── Path validation ──────────────────────────────────────────────────────

#[test]
fn anchored_chain_validates() {
    let (chain, root) = make_chain("leaf");
    validator::validate(
        &chain,
        "CN=leaf",
        None,
        &[root],
        RevocationCheckMode::Off,
        &AllGood,
    )
    .unwrap();
}

#[test]
fn chain_not_covered_by_the_anchor_fails() {
    let (chain, _) = make_chain("leaf");
    let (_, other_root) = make_chain("leaf");
    let result = validator::validate(
        &chain,
        "CN=leaf",
        None,
        &[other_root],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "trust anchor");
}

#[test]
fn chain_through_a_non_ca_issuer_fails() {
    let root_key = KeyPair::generate().unwrap();
    let root = ca_params("root ca").self_signed(&root_key).unwrap();

    // An ordinary end-entity certificate issued by the root, with CA:FALSE
    // and no keyCertSign.
    let mallory_key = KeyPair::generate().unwrap();
    let mallory = leaf_params("mallory")
        .signed_by(&mallory_key, &root, &root_key)
        .unwrap();

    // A forged leaf signed with that end-entity key.
    let victim_key = KeyPair::generate().unwrap();
    let victim = leaf_params("victim")
        .signed_by(&victim_key, &mallory, &mallory_key)
        .unwrap();

    let chain = format!("{}{}", victim.pem(), mallory.pem());
    let result = validator::validate(
        &chain,
        "CN=victim",
        None,
        &[root.pem()],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "not a CA");
}

#[test]
fn non_ca_anchor_cannot_cover_a_chain() {
    let root_key = KeyPair::generate().unwrap();
    let root = ca_params("root ca").self_signed(&root_key).unwrap();

    let mallory_key = KeyPair::generate().unwrap();
    let mallory = leaf_params("mallory")
        .signed_by(&mallory_key, &root, &root_key)
        .unwrap();

    let victim_key = KeyPair::generate().unwrap();
    let victim = leaf_params("victim")
        .signed_by(&victim_key, &mallory, &mallory_key)
        .unwrap();

    // The end-entity certificate itself is offered as the trust anchor.
    let result = validator::validate(
        &victim.pem(),
        "CN=victim",
        None,
        &[mallory.pem()],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "trust anchor");
}

#[test]
fn wrong_subject_name_fails() {
    let (chain, root) = make_chain("leaf");
    let result = validator::validate(
        &chain,
        "CN=someone-else",
        None,
        &[root],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "does not match expected identity");
}

#[test]
fn missing_key_usage_fails() {
    let root_key = KeyPair::generate().unwrap();
    let root = ca_params("root ca").self_signed(&root_key).unwrap();

    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, "leaf");
    // No key usage extension at all.
    let leaf_key = KeyPair::generate().unwrap();
    let leaf = params.signed_by(&leaf_key, &root, &root_key).unwrap();

    let result = validator::validate(
        &leaf.pem(),
        "CN=leaf",
        None,
        &[root.pem()],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "key usage");
}

#[test]
fn expired_leaf_fails() {
    let root_key = KeyPair::generate().unwrap();
    let root = ca_params("root ca").self_signed(&root_key).unwrap();

    let mut params = leaf_params("leaf");
    params.not_before = rcgen::date_time_ymd(1990, 1, 1);
    params.not_after = rcgen::date_time_ymd(1995, 1, 1);
    let leaf_key = KeyPair::generate().unwrap();
    let leaf = params.signed_by(&leaf_key, &root, &root_key).unwrap();

    let result = validator::validate(
        &leaf.pem(),
        "CN=leaf",
        None,
        &[root.pem()],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "validity period");
}

#[test]
fn garbage_pem_fails() {
    let (_, root) = make_chain("leaf");
    let result = validator::validate(
        "not a certificate",
        "CN=leaf",
        None,
        &[root],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert!(matches!(
        result,
        Err(WeftTrustError::InvalidPeerCertificate(_))
    ));
}

#[test]
fn mismatched_expected_public_key_fails() {
    let (chain, root) = make_chain("leaf");
    let result = validator::validate(
        &chain,
        "CN=leaf",
        Some(&[0u8; 65]),
        &[root],
        RevocationCheckMode::Off,
        &AllGood,
    );
    assert_cert_error(result, "public key");
}

// ── Revocation modes ─────────────────────────────────────────────────────

#[test]
fn unreachable_source_passes_in_soft_fail() {
    let (chain, root) = make_chain("leaf");
    validator::validate(
        &chain,
        "CN=leaf",
        None,
        &[root],
        RevocationCheckMode::SoftFail,
        &Unreachable,
    )
    .unwrap();
}

#[test]
fn unreachable_source_fails_in_hard_fail() {
    let (chain, root) = make_chain("leaf");
    let result = validator::validate(
        &chain,
        "CN=leaf",
        None,
        &[root],
        RevocationCheckMode::HardFail,
        &Unreachable,
    );
    assert_cert_error(result, "unreachable");
}

#[test]
fn positively_revoked_certificate_fails_even_in_soft_fail() {
    let (chain, root) = make_chain("leaf");
    let result = validator::validate(
        &chain,
        "CN=leaf",
        None,
        &[root],
        RevocationCheckMode::SoftFail,
        &EverythingRevoked,
    );
    assert_cert_error(result, "revoked");
}

#[test]
fn off_mode_never_consults_the_checker() {
    struct Panics;
    impl RevocationChecker for Panics {
        fn check(&self, _: &[u8], _: Option<&[u8]>) -> Result<RevocationStatus, String> {
            panic!("revocation checker consulted in Off mode");
        }
    }
    let (chain, root) = make_chain("leaf");
    validator::validate(
        &chain,
        "CN=leaf",
        None,
        &[root],
        RevocationCheckMode::Off,
        &Panics,
    )
    .unwrap();
}

// ── Handshake with certificate checking ──────────────────────────────────

mod handshake_with_certificates {
    use std::sync::Arc;

    use p256::ecdsa::signature::Signer as _;
    use p256::ecdsa::{Signature, SigningKey};
    use p256::pkcs8::EncodePrivateKey;
    use rand::RngCore;
    use wefttrust::cert::CertificateCheckMode;
    use wefttrust::handshake::{HandshakeIdentity, Initiator, Responder};
    use wefttrust::protocol::messages::ProtocolMode;
    use wefttrust::{SignatureSpec, WeftTrustError};

    use super::*;

    struct Identity {
        signing_key: SigningKey,
        public_key: Vec<u8>,
        chain_pem: String,
    }

    /// Mint a leaf certificate over a fresh P-256 identity key, so the
    /// certificate's SPKI matches the key used in the handshake payload.
    fn make_certified_identity(name: &str, root: &Certificate, root_key: &KeyPair) -> Identity {
        let secret = loop {
            let mut seed = [0u8; 32];
            rand::rng().fill_bytes(&mut seed);
            if let Ok(secret) = p256::SecretKey::from_slice(&seed) {
                break secret;
            }
        };
        let pkcs8 = secret.to_pkcs8_der().unwrap();
        let leaf_key = KeyPair::try_from(pkcs8.as_bytes()).unwrap();
        let leaf = leaf_params(name)
            .signed_by(&leaf_key, root, root_key)
            .unwrap();

        let signing_key = SigningKey::from(&secret);
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Identity {
            signing_key,
            public_key,
            chain_pem: leaf.pem(),
        }
    }

    fn check_mode(root_pem: String) -> CertificateCheckMode {
        CertificateCheckMode::CheckCertificate {
            trust_anchors: vec![root_pem],
            revocation_mode: RevocationCheckMode::Off,
            revocation_client: Arc::new(AllGood),
        }
    }

    #[test]
    fn handshake_succeeds_with_valid_certificates() {
        let root_key = KeyPair::generate().unwrap();
        let root = ca_params("root ca").self_signed(&root_key).unwrap();
        let alice = make_certified_identity("alice", &root, &root_key);
        let bob = make_certified_identity("bob", &root, &root_key);

        let identity = HandshakeIdentity::new("session-1", "group-a");
        let modes = vec![ProtocolMode::AuthenticatedEncryption];
        let mut initiator = Initiator::new(
            identity.clone(),
            modes.clone(),
            10_000,
            alice.public_key.clone(),
            check_mode(root.pem()),
        );
        let mut responder = Responder::new(
            identity,
            modes,
            10_000,
            bob.public_key.clone(),
            check_mode(root.pem()),
        );

        let hello_i = initiator.generate_initiator_hello().unwrap();
        responder.receive_initiator_hello(&hello_i).unwrap();
        let hello_r = responder.generate_responder_hello().unwrap();
        initiator.receive_responder_hello(&hello_r).unwrap();

        let msg3 = initiator
            .generate_our_handshake_message(
                &bob.public_key,
                Some(alice.chain_pem.clone()),
                &|bytes: &[u8]| {
                    let sig: Signature = alice.signing_key.sign(bytes);
                    Ok(sig.to_vec())
                },
            )
            .unwrap();
        responder
            .validate_peer_handshake_message(
                &msg3,
                "CN=alice",
                &alice.public_key,
                SignatureSpec::EcdsaP256Sha256,
            )
            .unwrap();

        let msg4 = responder
            .generate_our_handshake_message(
                &alice.public_key,
                Some(bob.chain_pem.clone()),
                &|bytes: &[u8]| {
                    let sig: Signature = bob.signing_key.sign(bytes);
                    Ok(sig.to_vec())
                },
            )
            .unwrap();
        initiator
            .validate_peer_handshake_message(
                &msg4,
                "CN=bob",
                &bob.public_key,
                SignatureSpec::EcdsaP256Sha256,
            )
            .unwrap();

        assert!(initiator.session().is_ok());
        assert!(responder.session().is_ok());
    }

    #[test]
    fn missing_chain_under_check_certificate_fails() {
        let root_key = KeyPair::generate().unwrap();
        let root = ca_params("root ca").self_signed(&root_key).unwrap();
        let alice = make_certified_identity("alice", &root, &root_key);
        let bob = make_certified_identity("bob", &root, &root_key);

        let identity = HandshakeIdentity::new("session-1", "group-a");
        let modes = vec![ProtocolMode::AuthenticatedEncryption];
        let mut initiator = Initiator::new(
            identity.clone(),
            modes.clone(),
            10_000,
            alice.public_key.clone(),
            CertificateCheckMode::NoCertificate,
        );
        let mut responder = Responder::new(
            identity,
            modes,
            10_000,
            bob.public_key.clone(),
            check_mode(root.pem()),
        );

        let hello_i = initiator.generate_initiator_hello().unwrap();
        responder.receive_initiator_hello(&hello_i).unwrap();
        let hello_r = responder.generate_responder_hello().unwrap();
        initiator.receive_responder_hello(&hello_r).unwrap();

        // Initiator presents no chain; the responder requires one.
        let msg3 = initiator
            .generate_our_handshake_message(&bob.public_key, None, &|bytes: &[u8]| {
                let sig: Signature = alice.signing_key.sign(bytes);
                Ok(sig.to_vec())
            })
            .unwrap();
        let err = responder
            .validate_peer_handshake_message(
                &msg3,
                "CN=alice",
                &alice.public_key,
                SignatureSpec::EcdsaP256Sha256,
            )
            .unwrap_err();
        assert!(matches!(err, WeftTrustError::InvalidPeerCertificate(_)));
    }

    #[test]
    fn chain_from_an_untrusted_root_fails() {
        let root_key = KeyPair::generate().unwrap();
        let root = ca_params("root ca").self_signed(&root_key).unwrap();
        let rogue_key = KeyPair::generate().unwrap();
        let rogue = ca_params("rogue ca").self_signed(&rogue_key).unwrap();

        let alice = make_certified_identity("alice", &rogue, &rogue_key);
        let bob = make_certified_identity("bob", &root, &root_key);

        let identity = HandshakeIdentity::new("session-1", "group-a");
        let modes = vec![ProtocolMode::AuthenticatedEncryption];
        let mut initiator = Initiator::new(
            identity.clone(),
            modes.clone(),
            10_000,
            alice.public_key.clone(),
            CertificateCheckMode::NoCertificate,
        );
        let mut responder = Responder::new(
            identity,
            modes,
            10_000,
            bob.public_key.clone(),
            check_mode(root.pem()),
        );

        let hello_i = initiator.generate_initiator_hello().unwrap();
        responder.receive_initiator_hello(&hello_i).unwrap();
        let hello_r = responder.generate_responder_hello().unwrap();
        initiator.receive_responder_hello(&hello_r).unwrap();

        let msg3 = initiator
            .generate_our_handshake_message(
                &bob.public_key,
                Some(alice.chain_pem.clone()),
                &|bytes: &[u8]| {
                    let sig: Signature = alice.signing_key.sign(bytes);
                    Ok(sig.to_vec())
                },
            )
            .unwrap();
        let err = responder
            .validate_peer_handshake_message(
                &msg3,
                "CN=alice",
                &alice.public_key,
                SignatureSpec::EcdsaP256Sha256,
            )
            .unwrap_err();
        assert!(matches!(err, WeftTrustError::InvalidPeerCertificate(_)));
    }
}
