// Round-trip tests for the detail-record serialization bridge: a machine or
// session rebuilt from its record must behave exactly like the original.

use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use wefttrust::cert::CertificateCheckMode;
use wefttrust::handshake::{HandshakeIdentity, Initiator, Responder};
use wefttrust::protocol::messages::ProtocolMode;
use wefttrust::record::{self, InitiatorHandshakeDetails, ResponderHandshakeDetails, SessionDetails};
use wefttrust::session::Session;
use wefttrust::{Result, SignatureSpec, WeftTrustError};

const BOTH_MODES: [ProtocolMode; 2] = [
    ProtocolMode::AuthenticationOnly,
    ProtocolMode::AuthenticatedEncryption,
];

fn make_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

fn ed25519_signer(key: &SigningKey) -> impl Fn(&[u8]) -> Result<Vec<u8>> + '_ {
    move |bytes| Ok(key.sign(bytes).to_bytes().to_vec())
}

fn make_machines() -> (Initiator, Responder, SigningKey, SigningKey) {
    let identity = HandshakeIdentity::new("session-1", "group-a");
    let initiator_key = make_signing_key();
    let responder_key = make_signing_key();
    let initiator = Initiator::new(
        identity.clone(),
        BOTH_MODES.to_vec(),
        10_000,
        initiator_key.verifying_key().as_bytes().to_vec(),
        CertificateCheckMode::NoCertificate,
    );
    let responder = Responder::new(
        identity,
        BOTH_MODES.to_vec(),
        10_000,
        responder_key.verifying_key().as_bytes().to_vec(),
        CertificateCheckMode::NoCertificate,
    );
    (initiator, responder, initiator_key, responder_key)
}

/// Serialize a machine to JSON and rebuild it, as an external store would.
fn roundtrip_initiator(machine: &Initiator) -> Initiator {
    let json = record::to_json(&machine.to_detail_record()).unwrap();
    let details: InitiatorHandshakeDetails = record::from_json(&json).unwrap();
    Initiator::from_detail_record(details, CertificateCheckMode::NoCertificate).unwrap()
}

fn roundtrip_responder(machine: &Responder) -> Responder {
    let json = record::to_json(&machine.to_detail_record()).unwrap();
    let details: ResponderHandshakeDetails = record::from_json(&json).unwrap();
    Responder::from_detail_record(details, CertificateCheckMode::NoCertificate).unwrap()
}

// ── Handshake resumption ─────────────────────────────────────────────────

#[test]
fn initiator_resumed_at_sent_hello_completes_the_handshake() {
    let (mut initiator, mut responder, initiator_key, responder_key) = make_machines();
    let initiator_public = initiator_key.verifying_key().as_bytes().to_vec();
    let responder_public = responder_key.verifying_key().as_bytes().to_vec();

    let hello_i = initiator.generate_initiator_hello().unwrap();

    // Persist the initiator mid-flight; the ephemeral secret travels in the
    // record at this step and nowhere else.
    let record = initiator.to_detail_record();
    assert!(record.ephemeral_secret.is_some());
    let mut resumed = roundtrip_initiator(&initiator);
    drop(initiator);

    responder.receive_initiator_hello(&hello_i).unwrap();
    let hello_r = responder.generate_responder_hello().unwrap();
    resumed.receive_responder_hello(&hello_r).unwrap();

    // Once the handshake secrets exist, the ephemeral is gone from records.
    assert!(resumed.to_detail_record().ephemeral_secret.is_none());

    let msg3 = resumed
        .generate_our_handshake_message(&responder_public, None, &ed25519_signer(&initiator_key))
        .unwrap();
    responder
        .validate_peer_handshake_message(
            &msg3,
            "CN=initiator",
            &initiator_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();
    let msg4 = responder
        .generate_our_handshake_message(&initiator_public, None, &ed25519_signer(&responder_key))
        .unwrap();
    resumed
        .validate_peer_handshake_message(
            &msg4,
            "CN=responder",
            &responder_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();

    assert!(resumed.session().is_ok());
    assert!(responder.session().is_ok());
}

#[test]
fn responder_resumed_mid_flight_completes_the_handshake() {
    let (mut initiator, mut responder, initiator_key, responder_key) = make_machines();
    let initiator_public = initiator_key.verifying_key().as_bytes().to_vec();
    let responder_public = responder_key.verifying_key().as_bytes().to_vec();

    let hello_i = initiator.generate_initiator_hello().unwrap();
    responder.receive_initiator_hello(&hello_i).unwrap();
    let hello_r = responder.generate_responder_hello().unwrap();

    let mut resumed = roundtrip_responder(&responder);
    drop(responder);

    initiator.receive_responder_hello(&hello_r).unwrap();
    let msg3 = initiator
        .generate_our_handshake_message(&responder_public, None, &ed25519_signer(&initiator_key))
        .unwrap();
    resumed
        .validate_peer_handshake_message(
            &msg3,
            "CN=initiator",
            &initiator_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();
    let msg4 = resumed
        .generate_our_handshake_message(&initiator_public, None, &ed25519_signer(&responder_key))
        .unwrap();
    initiator
        .validate_peer_handshake_message(
            &msg4,
            "CN=responder",
            &responder_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();

    assert!(initiator.session().is_ok());
    assert!(resumed.session().is_ok());
}

#[test]
fn resumed_generator_returns_the_cached_message() {
    let (mut initiator, _, _, _) = make_machines();
    let hello = initiator.generate_initiator_hello().unwrap();
    let mut resumed = roundtrip_initiator(&initiator);
    let hello_again = resumed.generate_initiator_hello().unwrap();
    assert_eq!(hello.encode(), hello_again.encode());
}

#[test]
fn record_at_every_initiator_step_roundtrips() {
    let (mut initiator, mut responder, initiator_key, responder_key) = make_machines();
    let initiator_public = initiator_key.verifying_key().as_bytes().to_vec();
    let responder_public = responder_key.verifying_key().as_bytes().to_vec();

    roundtrip_initiator(&initiator);

    let hello_i = initiator.generate_initiator_hello().unwrap();
    roundtrip_initiator(&initiator);

    responder.receive_initiator_hello(&hello_i).unwrap();
    roundtrip_responder(&responder);
    let hello_r = responder.generate_responder_hello().unwrap();
    roundtrip_responder(&responder);

    initiator.receive_responder_hello(&hello_r).unwrap();
    roundtrip_initiator(&initiator);

    let msg3 = initiator
        .generate_our_handshake_message(&responder_public, None, &ed25519_signer(&initiator_key))
        .unwrap();
    roundtrip_initiator(&initiator);

    responder
        .validate_peer_handshake_message(
            &msg3,
            "CN=initiator",
            &initiator_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();
    roundtrip_responder(&responder);

    let msg4 = responder
        .generate_our_handshake_message(&initiator_public, None, &ed25519_signer(&responder_key))
        .unwrap();
    roundtrip_responder(&responder);

    initiator
        .validate_peer_handshake_message(
            &msg4,
            "CN=responder",
            &responder_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();
    roundtrip_initiator(&initiator);
}

#[test]
fn inconsistent_record_is_rejected() {
    let (mut initiator, _, _, _) = make_machines();
    initiator.generate_initiator_hello().unwrap();

    let mut details = initiator.to_detail_record();
    details.ephemeral_secret = None;
    let err =
        Initiator::from_detail_record(details, CertificateCheckMode::NoCertificate).unwrap_err();
    assert!(matches!(err, WeftTrustError::Serialization(_)));
}

#[test]
fn record_without_the_negotiated_size_is_rejected() {
    let (mut initiator, mut responder, _, _) = make_machines();
    let hello_i = initiator.generate_initiator_hello().unwrap();
    responder.receive_initiator_hello(&hello_i).unwrap();
    let hello_r = responder.generate_responder_hello().unwrap();
    initiator.receive_responder_hello(&hello_r).unwrap();

    let mut details = initiator.to_detail_record();
    details.negotiated_max_message_size = None;
    let err =
        Initiator::from_detail_record(details, CertificateCheckMode::NoCertificate).unwrap_err();
    assert!(matches!(err, WeftTrustError::Serialization(_)));

    let mut details = responder.to_detail_record();
    details.negotiated_max_message_size = None;
    let err =
        Responder::from_detail_record(details, CertificateCheckMode::NoCertificate).unwrap_err();
    assert!(matches!(err, WeftTrustError::Serialization(_)));
}

// ── Session records ──────────────────────────────────────────────────────

fn established_sessions(modes: Vec<ProtocolMode>) -> (Session, Session) {
    let identity = HandshakeIdentity::new("session-1", "group-a");
    let initiator_key = make_signing_key();
    let responder_key = make_signing_key();
    let initiator_public = initiator_key.verifying_key().as_bytes().to_vec();
    let responder_public = responder_key.verifying_key().as_bytes().to_vec();

    let mut initiator = Initiator::new(
        identity.clone(),
        modes.clone(),
        10_000,
        initiator_public.clone(),
        CertificateCheckMode::NoCertificate,
    );
    let mut responder = Responder::new(
        identity,
        modes,
        10_000,
        responder_public.clone(),
        CertificateCheckMode::NoCertificate,
    );

    let hello_i = initiator.generate_initiator_hello().unwrap();
    responder.receive_initiator_hello(&hello_i).unwrap();
    let hello_r = responder.generate_responder_hello().unwrap();
    initiator.receive_responder_hello(&hello_r).unwrap();
    let msg3 = initiator
        .generate_our_handshake_message(&responder_public, None, &ed25519_signer(&initiator_key))
        .unwrap();
    responder
        .validate_peer_handshake_message(
            &msg3,
            "CN=initiator",
            &initiator_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();
    let msg4 = responder
        .generate_our_handshake_message(&initiator_public, None, &ed25519_signer(&responder_key))
        .unwrap();
    initiator
        .validate_peer_handshake_message(
            &msg4,
            "CN=responder",
            &responder_public,
            SignatureSpec::Ed25519,
        )
        .unwrap();

    (initiator.session().unwrap(), responder.session().unwrap())
}

#[test]
fn authenticated_session_record_preserves_behavior() {
    let (tx, rx) = established_sessions(vec![ProtocolMode::AuthenticationOnly]);
    let mut tx = match tx {
        Session::Authenticated(s) => s,
        _ => panic!("expected MAC-only session"),
    };

    // One message before persisting, so the counter is mid-stream.
    let first = tx.create_mac(b"before persistence").unwrap();

    let json = record::to_json(&Session::Authenticated(tx).to_detail_record()).unwrap();
    let details: SessionDetails = record::from_json(&json).unwrap();
    let mut resumed = match Session::from_detail_record(details) {
        Session::Authenticated(s) => s,
        _ => panic!("record changed session variant"),
    };

    let second = resumed.create_mac(b"after persistence").unwrap();
    assert_eq!(second.header.sequence_number, first.header.sequence_number + 1);

    let rx = match rx {
        Session::Authenticated(s) => s,
        _ => panic!("expected MAC-only session"),
    };
    rx.validate_mac(&first.header, &first.payload, &first.auth_tag)
        .unwrap();
    rx.validate_mac(&second.header, &second.payload, &second.auth_tag)
        .unwrap();
}

#[test]
fn encrypted_session_record_preserves_behavior() {
    let (tx, rx) = established_sessions(vec![ProtocolMode::AuthenticatedEncryption]);
    let mut tx = match tx {
        Session::AuthenticatedEncryption(s) => s,
        _ => panic!("expected encrypted session"),
    };
    let rx = match rx {
        Session::AuthenticatedEncryption(s) => s,
        _ => panic!("expected encrypted session"),
    };

    let first = tx.encrypt_data(b"before persistence").unwrap();

    let json = record::to_json(&Session::AuthenticatedEncryption(tx).to_detail_record()).unwrap();
    let details: SessionDetails = record::from_json(&json).unwrap();
    let mut resumed = match Session::from_detail_record(details) {
        Session::AuthenticatedEncryption(s) => s,
        _ => panic!("record changed session variant"),
    };

    let second = resumed.encrypt_data(b"after persistence").unwrap();
    assert_eq!(
        rx.decrypt_data(&first.header, &first.encrypted_payload, &first.auth_tag)
            .unwrap(),
        b"before persistence"
    );
    assert_eq!(
        rx.decrypt_data(&second.header, &second.encrypted_payload, &second.auth_tag)
            .unwrap(),
        b"after persistence"
    );
}

#[test]
fn malformed_json_is_a_serialization_error() {
    let err = record::from_json::<SessionDetails>("{ not json").unwrap_err();
    assert!(matches!(err, WeftTrustError::Serialization(_)));
}
