//! End-to-end pairing scenarios over the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use wakupair::{
    commit_public_key, random_bytes_32, Handshake, HandshakeParameters, HandshakePattern, Keypair,
    InMemoryTransport, NoisePublicKey, Nonce, Pairing, PairingConfig, PairingInfo,
    PairingTransport, PayloadV2, PresetConfirmation, Qr, SecureDecoder, SecureEncoder, StepInput,
    StepResult, WakuPairError, NONCE_MAX,
};

fn config() -> PairingConfig {
    PairingConfig::new("wakupair", "0.1", "0").with_timeout(Duration::from_secs(10))
}

/// Run a full pairing and return (alice, bob) channel halves.
async fn pair(
    transport: Arc<InMemoryTransport>,
) -> (
    (SecureEncoder, SecureDecoder),
    (SecureEncoder, SecureDecoder),
) {
    let (bob_pairing, info) =
        Pairing::responder(Keypair::generate(), Arc::clone(&transport), config()).unwrap();

    let bob_task = tokio::spawn(async move {
        bob_pairing
            .execute(&PresetConfirmation::new(true))
            .await
            .unwrap()
    });
    // Let the responder subscribe before the first message goes out.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let alice_pairing =
        Pairing::initiator(Keypair::generate(), &info, transport, config()).unwrap();
    let alice = alice_pairing
        .execute(&PresetConfirmation::new(true))
        .await
        .unwrap();
    let bob = bob_task.await.unwrap();

    (alice, bob)
}

#[tokio::test]
async fn test_happy_path_pairing_and_bulk_exchange() {
    let transport = Arc::new(InMemoryTransport::new());
    let ((alice_encoder, alice_decoder), (bob_encoder, bob_decoder)) =
        pair(Arc::clone(&transport)).await;

    assert_eq!(alice_encoder.content_topic(), "/wakupair/0.1/0/proto");
    assert_eq!(bob_decoder.content_topic(), "/wakupair/0.1/0/proto");

    // Ten times the nametag window, in both directions.
    for _ in 0..500 {
        let message = random_bytes_32();
        let wire = alice_encoder.to_wire(&message).await.unwrap();
        assert_eq!(bob_decoder.from_wire(&wire).await.unwrap(), message);

        let reply = random_bytes_32();
        let wire = bob_encoder.to_wire(&reply).await.unwrap();
        assert_eq!(alice_decoder.from_wire(&wire).await.unwrap(), reply);
    }
}

#[tokio::test]
async fn test_pairing_times_out_without_a_peer() {
    let transport = Arc::new(InMemoryTransport::new());

    // The responder constructs its QR but never joins the exchange.
    let (_idle_responder, info) =
        Pairing::responder(Keypair::generate(), Arc::clone(&transport), config()).unwrap();

    let alice = Pairing::initiator(
        Keypair::generate(),
        &info,
        transport,
        config().with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let result = alice.execute(&PresetConfirmation::new(true)).await;
    assert!(matches!(result, Err(WakuPairError::PairingTimeout)));
}

#[tokio::test]
async fn test_authcode_rejection_stops_both_sides() {
    let transport = Arc::new(InMemoryTransport::new());
    let (bob_pairing, info) =
        Pairing::responder(Keypair::generate(), Arc::clone(&transport), config()).unwrap();

    let bob_task = tokio::spawn(async move {
        bob_pairing.execute(&PresetConfirmation::new(false)).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let alice_pairing =
        Pairing::initiator(Keypair::generate(), &info, transport, config()).unwrap();
    let alice_result = alice_pairing.execute(&PresetConfirmation::new(false)).await;
    let bob_result = bob_task.await.unwrap();

    assert!(matches!(
        alice_result,
        Err(WakuPairError::AuthcodeRejected)
    ));
    assert!(matches!(bob_result, Err(WakuPairError::AuthcodeRejected)));
}

#[tokio::test]
async fn test_tampered_commitment_opening_aborts() {
    let transport = Arc::new(InMemoryTransport::new());
    let qr_nametag = [9u8; 16];

    // A dishonest responder: its QR commitment is sound, but the opener
    // it reveals in message 2 is corrupted, as a key-substitution
    // adversary's would be.
    let static_key = Keypair::generate();
    let ephemeral = Keypair::generate();
    let opener = random_bytes_32();
    let committed = commit_public_key(&static_key.public_bytes(), &opener);
    let qr = Qr::new(
        "wakupair",
        "0.1",
        "0",
        ephemeral.public_bytes(),
        committed,
    );
    let info = PairingInfo {
        qr,
        qr_message_nametag: qr_nametag,
    };
    let topic = info.qr.content_topic();

    let mut responder = Handshake::new(
        HandshakeParameters::new(HandshakePattern::waku_pairing(), false)
            .with_static_key(static_key)
            .with_ephemeral_key(ephemeral.clone())
            .with_pre_message_keys(vec![NoisePublicKey::Unencrypted(ephemeral.public_bytes())]),
    )
    .unwrap();

    let mut inbox = transport.subscribe(&topic).await.unwrap();
    let responder_transport = Arc::clone(&transport);
    let responder_topic = topic.clone();
    let responder_task = tokio::spawn(async move {
        loop {
            let raw = inbox.recv().await.unwrap();
            let payload = PayloadV2::decode(&raw).unwrap();
            match responder.step(StepInput::Read(&payload), qr_nametag) {
                Ok(StepResult::Read(_)) => break,
                Err(WakuPairError::NametagMismatch { .. }) => continue,
                other => panic!("unexpected step outcome: {other:?}"),
            }
        }

        let mut bad_opener = opener;
        bad_opener[0] ^= 1;
        let nametag = responder.to_message_nametag();
        let StepResult::Written(payload) = responder
            .step(StepInput::Write(&bad_opener), nametag)
            .unwrap()
        else {
            panic!("expected a written payload");
        };
        responder_transport
            .publish(&responder_topic, payload.encode().unwrap())
            .await
            .unwrap();
    });

    let alice =
        Pairing::initiator(Keypair::generate(), &info, Arc::clone(&transport), config()).unwrap();
    let result = alice.execute(&PresetConfirmation::new(true)).await;
    assert!(matches!(result, Err(WakuPairError::CommitmentMismatch)));

    responder_task.await.unwrap();
}

#[tokio::test]
async fn test_dropped_message_recovery() {
    let transport = Arc::new(InMemoryTransport::new());
    let ((alice_encoder, _), (_, bob_decoder)) = pair(transport).await;

    let m1 = alice_encoder.to_wire(b"m1").await.unwrap();
    let m2 = alice_encoder.to_wire(b"m2").await.unwrap();
    let m3 = alice_encoder.to_wire(b"m3").await.unwrap();

    // The transport drops m1; the decoder resynchronizes on m2.
    assert_eq!(bob_decoder.from_wire(&m2).await.unwrap(), b"m2");

    // A late delivery of m1 is no longer accepted.
    assert!(bob_decoder.from_wire(&m1).await.is_none());

    // The channel keeps flowing afterwards.
    assert_eq!(bob_decoder.from_wire(&m3).await.unwrap(), b"m3");
}

#[test]
fn test_nonce_exhaustion_ends_the_session() {
    // A finalized session whose outbound counter sits at the cap.
    let mut alice = Handshake::new(
        HandshakeParameters::new(HandshakePattern::xx(), true)
            .with_static_key(Keypair::generate()),
    )
    .unwrap();
    let mut bob = Handshake::new(
        HandshakeParameters::new(HandshakePattern::xx(), false)
            .with_static_key(Keypair::generate()),
    )
    .unwrap();

    let mut nametag = [0u8; 16];
    for step in 0..3 {
        let (writer, reader) = if step % 2 == 0 {
            (&mut alice, &mut bob)
        } else {
            (&mut bob, &mut alice)
        };
        let StepResult::Written(payload) = writer.step(StepInput::Write(b""), nametag).unwrap()
        else {
            panic!("expected a written payload");
        };
        reader.step(StepInput::Read(&payload), nametag).unwrap();
        nametag = writer.to_message_nametag();
    }

    let mut session = alice.finalize().unwrap();
    session.cs_outbound.set_nonce(Nonce::from(NONCE_MAX));

    // The last counter value still goes out.
    session.write_message(b"final message").unwrap();

    // After that the session is over, stably.
    for _ in 0..3 {
        assert!(matches!(
            session.write_message(b"one too many"),
            Err(WakuPairError::NonceExhausted)
        ));
    }
}
