//! Post-handshake secure channel codec.
//!
//! A completed handshake yields one [`SecureEncoder`] / [`SecureDecoder`]
//! pair per party, sharing the session state. The encoder frames
//! outbound application messages; the decoder accepts raw bytes from
//! the subscription and silently drops whatever does not decrypt, so
//! that an adversary publishing garbage on the topic learns nothing
//! from our behavior.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::payload::PayloadV2;
use crate::session::HandshakeResult;
use crate::types::{Result, WakuPairError};

/// Create the encoder/decoder pair for a finalized session.
pub fn secure_channel(
    session: HandshakeResult,
    content_topic: impl Into<String>,
) -> (SecureEncoder, SecureDecoder) {
    let session = Arc::new(Mutex::new(session));
    let content_topic = content_topic.into();
    (
        SecureEncoder {
            session: Arc::clone(&session),
            content_topic: content_topic.clone(),
        },
        SecureDecoder {
            session,
            content_topic,
        },
    )
}

/// Outbound half of the secure channel.
pub struct SecureEncoder {
    session: Arc<Mutex<HandshakeResult>>,
    content_topic: String,
}

impl SecureEncoder {
    pub fn content_topic(&self) -> &str {
        &self.content_topic
    }

    /// Encrypt and frame an application message for the transport.
    pub async fn to_wire(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut session = self.session.lock().await;
        let payload = session.write_message(message)?;
        payload.encode()
    }
}

/// Inbound half of the secure channel.
pub struct SecureDecoder {
    session: Arc<Mutex<HandshakeResult>>,
    content_topic: String,
}

impl SecureDecoder {
    pub fn content_topic(&self) -> &str {
        &self.content_topic
    }

    /// Decode raw bytes from the subscription.
    ///
    /// Returns the decrypted message, or `None` for anything that does
    /// not verify: unparseable frames, unknown nametags, failed
    /// authentication. An out-of-order nametag resynchronizes the
    /// window first, writing off the skipped messages as lost.
    pub async fn from_wire(&self, data: &[u8]) -> Option<Vec<u8>> {
        let payload = match PayloadV2::decode(data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("{}: dropping unparseable message: {e}", self.content_topic);
                return None;
            }
        };

        let mut session = self.session.lock().await;
        match session.read_message(&payload) {
            Ok(message) => Some(message),
            Err(WakuPairError::NametagOutOfOrder { skipped }) => {
                warn!(
                    "{}: resynchronizing, {skipped} inbound messages lost",
                    self.content_topic
                );
                session.delete_inbound_nametags(skipped);
                match session.read_message(&payload) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        debug!("{}: dropping message after resync: {e}", self.content_topic);
                        None
                    }
                }
            }
            Err(e) => {
                debug!("{}: dropping message: {e}", self.content_topic);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;
    use crate::patterns::HandshakePattern;
    use crate::session::{Handshake, HandshakeParameters, StepInput, StepResult};

    fn finished_pair() -> (HandshakeResult, HandshakeResult) {
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
            let StepResult::Read(_) = reader.step(StepInput::Read(&payload), nametag).unwrap()
            else {
                panic!("expected a read payload");
            };
            nametag = writer.to_message_nametag();
        }

        (alice.finalize().unwrap(), bob.finalize().unwrap())
    }

    #[tokio::test]
    async fn test_wire_roundtrip() {
        let (alice, bob) = finished_pair();
        let (alice_encoder, _alice_decoder) = secure_channel(alice, "/app/1/0/proto");
        let (_bob_encoder, bob_decoder) = secure_channel(bob, "/app/1/0/proto");

        let wire = alice_encoder.to_wire(b"application data").await.unwrap();
        assert_eq!(
            bob_decoder.from_wire(&wire).await.unwrap(),
            b"application data"
        );
    }

    #[tokio::test]
    async fn test_garbage_is_suppressed() {
        let (_, bob) = finished_pair();
        let (_encoder, decoder) = secure_channel(bob, "/app/1/0/proto");

        assert!(decoder.from_wire(b"").await.is_none());
        assert!(decoder.from_wire(&[0u8; 64]).await.is_none());
    }

    #[tokio::test]
    async fn test_tampered_frame_is_suppressed() {
        let (alice, bob) = finished_pair();
        let (alice_encoder, _) = secure_channel(alice, "/app/1/0/proto");
        let (_, bob_decoder) = secure_channel(bob, "/app/1/0/proto");

        let mut wire = alice_encoder.to_wire(b"message").await.unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 1;
        assert!(bob_decoder.from_wire(&wire).await.is_none());
    }

    #[tokio::test]
    async fn test_out_of_order_resync() {
        let (alice, bob) = finished_pair();
        let (alice_encoder, _) = secure_channel(alice, "/app/1/0/proto");
        let (_, bob_decoder) = secure_channel(bob, "/app/1/0/proto");

        let lost = alice_encoder.to_wire(b"m1").await.unwrap();
        let delivered = alice_encoder.to_wire(b"m2").await.unwrap();

        // m1 never arrives; the decoder resynchronizes on m2.
        assert_eq!(bob_decoder.from_wire(&delivered).await.unwrap(), b"m2");

        // m1 shows up late and is dropped.
        assert!(bob_decoder.from_wire(&lost).await.is_none());
    }
}
