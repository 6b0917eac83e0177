//! Device pairing choreography.
//!
//! Two parties bootstrap trust from an out-of-band QR exchange: the
//! responder commits to its static key and publishes an ephemeral key
//! through the QR, then both run the three-message pairing handshake
//! over the content topic, open the static-key commitments, and confirm
//! a short authorization code before the secure channel is handed out.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rand::RngCore;
use tokio::sync::mpsc;
use tokio::time;

use crate::codec::{secure_channel, SecureDecoder, SecureEncoder};
use crate::crypto::commit_public_key;
use crate::keys::{random_bytes_32, Keypair};
use crate::patterns::HandshakePattern;
use crate::payload::{NoisePublicKey, PayloadV2};
use crate::qr::Qr;
use crate::session::{Handshake, HandshakeParameters, StepInput, StepResult};
use crate::transport::{AuthcodeValidator, PairingTransport};
use crate::types::{MessageNametag, Result, WakuPairError, KEY_SIZE, MESSAGE_NAMETAG_SIZE};

/// Configuration for a pairing exchange.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Application name, first segment of the content topic.
    pub application_name: String,
    /// Application version string.
    pub application_version: String,
    /// Shard identifier isolating this pairing's traffic.
    pub shard_id: String,
    /// Wall-clock bound on the whole exchange.
    pub timeout: Duration,
}

impl PairingConfig {
    pub fn new(
        application_name: impl Into<String>,
        application_version: impl Into<String>,
        shard_id: impl Into<String>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            application_version: application_version.into(),
            shard_id: shard_id.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Everything the responder hands over out-of-band: the QR record and
/// the random nametag addressing the first handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingInfo {
    pub qr: Qr,
    pub qr_message_nametag: MessageNametag,
}

fn random_nametag() -> MessageNametag {
    let mut nametag = [0u8; MESSAGE_NAMETAG_SIZE];
    rand::thread_rng().fill_bytes(&mut nametag);
    nametag
}

/// A pairing exchange in progress.
///
/// Construct with [`Pairing::initiator`] (after scanning a QR) or
/// [`Pairing::responder`] (which produces the QR), then drive it to
/// completion with [`Pairing::execute`].
pub struct Pairing<T: PairingTransport> {
    handshake: Handshake,
    transport: Arc<T>,
    content_topic: String,
    timeout: Duration,
    initiator: bool,
    my_committed_static_key: [u8; KEY_SIZE],
    commitment_opener: [u8; KEY_SIZE],
    /// The peer's commitment: from the QR for the initiator, learned
    /// from message 1 for the responder.
    peer_commitment: Vec<u8>,
    qr_message_nametag: MessageNametag,
}

impl<T: PairingTransport> Pairing<T> {
    /// Start a pairing from a scanned QR.
    ///
    /// The QR must belong to the same application; its fields then
    /// determine the content topic.
    pub fn initiator(
        static_key: Keypair,
        info: &PairingInfo,
        transport: Arc<T>,
        config: PairingConfig,
    ) -> Result<Self> {
        if info.qr.application_name != config.application_name
            || info.qr.application_version != config.application_version
        {
            return Err(WakuPairError::InvalidPayload(format!(
                "QR belongs to {}/{}, this application is {}/{}",
                info.qr.application_name,
                info.qr.application_version,
                config.application_name,
                config.application_version
            )));
        }

        let commitment_opener = random_bytes_32();
        let my_committed_static_key =
            commit_public_key(&static_key.public_bytes(), &commitment_opener);

        let handshake = Handshake::new(
            HandshakeParameters::new(HandshakePattern::waku_pairing(), true)
                .with_static_key(static_key)
                .with_pre_message_keys(vec![NoisePublicKey::Unencrypted(info.qr.ephemeral_key)]),
        )?;

        Ok(Self {
            handshake,
            transport,
            content_topic: info.qr.content_topic(),
            timeout: config.timeout,
            initiator: true,
            my_committed_static_key,
            commitment_opener,
            peer_commitment: info.qr.committed_static_key.to_vec(),
            qr_message_nametag: info.qr_message_nametag,
        })
    }

    /// Start a pairing as the party displaying the QR.
    ///
    /// Returns the pairing and the [`PairingInfo`] to hand to the peer
    /// out-of-band.
    pub fn responder(
        static_key: Keypair,
        transport: Arc<T>,
        config: PairingConfig,
    ) -> Result<(Self, PairingInfo)> {
        let ephemeral_key = Keypair::generate();
        let commitment_opener = random_bytes_32();
        let my_committed_static_key =
            commit_public_key(&static_key.public_bytes(), &commitment_opener);

        let qr = Qr::new(
            config.application_name,
            config.application_version,
            config.shard_id,
            ephemeral_key.public_bytes(),
            my_committed_static_key,
        );
        let qr_message_nametag = random_nametag();
        let content_topic = qr.content_topic();

        let handshake = Handshake::new(
            HandshakeParameters::new(HandshakePattern::waku_pairing(), false)
                .with_static_key(static_key)
                .with_ephemeral_key(ephemeral_key.clone())
                .with_pre_message_keys(vec![NoisePublicKey::Unencrypted(
                    ephemeral_key.public_bytes(),
                )]),
        )?;

        let info = PairingInfo {
            qr,
            qr_message_nametag,
        };
        let pairing = Self {
            handshake,
            transport,
            content_topic,
            timeout: config.timeout,
            initiator: false,
            my_committed_static_key,
            commitment_opener,
            peer_commitment: Vec::new(),
            qr_message_nametag,
        };
        Ok((pairing, info))
    }

    /// The content topic this pairing uses.
    pub fn content_topic(&self) -> &str {
        &self.content_topic
    }

    /// Run the exchange to completion.
    ///
    /// Suspends on the next transport message and on the authcode
    /// confirmation, the whole exchange racing the configured timeout.
    /// On success returns the secure channel halves bound to the
    /// content topic.
    pub async fn execute<V: AuthcodeValidator>(
        self,
        validator: &V,
    ) -> Result<(SecureEncoder, SecureDecoder)> {
        let timeout = self.timeout;
        time::timeout(timeout, self.run(validator))
            .await
            .map_err(|_| WakuPairError::PairingTimeout)?
    }

    async fn run<V: AuthcodeValidator>(
        mut self,
        validator: &V,
    ) -> Result<(SecureEncoder, SecureDecoder)> {
        let mut inbox = self.transport.subscribe(&self.content_topic).await?;

        if self.initiator {
            // Message 1: send our committed static key under the
            // nametag agreed through the QR.
            let committed = self.my_committed_static_key;
            self.publish_step(&committed, self.qr_message_nametag)
                .await?;

            // Message 2: the responder reveals its commitment opener.
            let expected = self.handshake.to_message_nametag();
            let peer_opener = self.read_step(&mut inbox, expected).await?;
            self.verify_peer_commitment(&peer_opener)?;

            self.confirm_authcode(validator).await?;

            // Message 3: reveal our own opener.
            let nametag = self.handshake.to_message_nametag();
            let opener = self.commitment_opener;
            self.publish_step(&opener, nametag).await?;
        } else {
            // Message 1: learn the initiator's commitment.
            let peer_commitment = self.read_step(&mut inbox, self.qr_message_nametag).await?;
            self.peer_commitment = peer_commitment;

            // Message 2: reveal our commitment opener.
            let nametag = self.handshake.to_message_nametag();
            let opener = self.commitment_opener;
            self.publish_step(&opener, nametag).await?;

            self.confirm_authcode(validator).await?;

            // Message 3: the initiator reveals its opener.
            let expected = self.handshake.to_message_nametag();
            let peer_opener = self.read_step(&mut inbox, expected).await?;
            self.verify_peer_commitment(&peer_opener)?;
        }

        let result = self.handshake.finalize()?;
        Ok(secure_channel(result, self.content_topic))
    }

    async fn publish_step(&mut self, message: &[u8], nametag: MessageNametag) -> Result<()> {
        let StepResult::Written(payload) = self.handshake.step(StepInput::Write(message), nametag)?
        else {
            return Err(WakuPairError::InvalidPattern(
                "handshake already complete".to_string(),
            ));
        };
        self.transport
            .publish(&self.content_topic, payload.encode()?)
            .await
    }

    /// Wait for the inbound message addressed by `expected`.
    ///
    /// Unparseable traffic and payloads carrying other nametags (our
    /// own loopback included) are skipped; the handshake state only
    /// moves when the right message arrives.
    async fn read_step(
        &mut self,
        inbox: &mut mpsc::Receiver<Vec<u8>>,
        expected: MessageNametag,
    ) -> Result<Vec<u8>> {
        loop {
            let raw = inbox
                .recv()
                .await
                .ok_or_else(|| WakuPairError::Transport("subscription closed".to_string()))?;

            let payload = match PayloadV2::decode(&raw) {
                Ok(payload) => payload,
                Err(e) => {
                    debug!("{}: ignoring unparseable message: {e}", self.content_topic);
                    continue;
                }
            };

            match self.handshake.step(StepInput::Read(&payload), expected) {
                Ok(StepResult::Read(message)) => return Ok(message),
                Ok(_) => {
                    return Err(WakuPairError::InvalidPattern(
                        "handshake advanced unexpectedly".to_string(),
                    ))
                }
                Err(WakuPairError::NametagMismatch { .. }) => {
                    debug!(
                        "{}: skipping message not addressed to this step",
                        self.content_topic
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Open the peer's static-key commitment with the opener it sent.
    fn verify_peer_commitment(&self, opener: &[u8]) -> Result<()> {
        let rs = self.handshake.remote_static().ok_or_else(|| {
            WakuPairError::InvalidKey("no remote static key received".to_string())
        })?;
        let opener: [u8; KEY_SIZE] = match opener.try_into() {
            Ok(opener) => opener,
            Err(_) => return Err(WakuPairError::CommitmentMismatch),
        };
        if commit_public_key(&rs, &opener).as_slice() != self.peer_commitment.as_slice() {
            return Err(WakuPairError::CommitmentMismatch);
        }
        Ok(())
    }

    async fn confirm_authcode<V: AuthcodeValidator>(&self, validator: &V) -> Result<()> {
        let authcode = self.handshake.authcode();
        debug!(
            "{}: awaiting confirmation of authcode {authcode}",
            self.content_topic
        );
        if !validator.validate_authcode(&authcode).await {
            return Err(WakuPairError::AuthcodeRejected);
        }
        Ok(())
    }
}
