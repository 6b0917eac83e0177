//! Handshake driver and the resulting secure session.
//!
//! [`Handshake`] walks a pattern one message at a time: the writing
//! side produces a complete [`PayloadV2`], the reading side consumes
//! one after verifying its nametag. [`Handshake::finalize`] consumes
//! the driver and yields a [`HandshakeResult`], the two cipher states
//! and two nametag buffers that make up the secure channel.

use crate::cipher::CipherState;
use crate::crypto::hkdf_2;
use crate::handshake::HandshakeState;
use crate::keys::Keypair;
use crate::nametag::MessageNametagBuffer;
use crate::nonce::Nonce;
use crate::patterns::{HandshakePattern, ProtocolId};
use crate::payload::{NoisePublicKey, PayloadV2};
use crate::types::{
    MessageNametag, Result, WakuPairError, KEY_SIZE, PADDING_BLOCK_SIZE,
};

/// Key material for the two post-handshake nametag chains.
const NAMETAG_SECRETS_IKM: &[u8] = b"nametag-secrets";

/// PKCS#7-pad a handshake transport payload to the protocol block size.
fn pkcs7_pad(message: &[u8]) -> Vec<u8> {
    let pad_len = PADDING_BLOCK_SIZE - message.len() % PADDING_BLOCK_SIZE;
    let mut padded = Vec::with_capacity(message.len() + pad_len);
    padded.extend_from_slice(message);
    padded.resize(message.len() + pad_len, pad_len as u8);
    padded
}

/// Strip and validate PKCS#7 padding.
fn pkcs7_unpad(padded: &[u8]) -> Result<Vec<u8>> {
    let pad_len = *padded.last().ok_or(WakuPairError::InvalidPadding)? as usize;
    if pad_len == 0 || pad_len > PADDING_BLOCK_SIZE || pad_len > padded.len() {
        return Err(WakuPairError::InvalidPadding);
    }
    let (message, padding) = padded.split_at(padded.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(WakuPairError::InvalidPadding);
    }
    Ok(message.to_vec())
}

/// Inputs for constructing a [`Handshake`].
pub struct HandshakeParameters {
    pub pattern: HandshakePattern,
    pub initiator: bool,
    pub ephemeral_key: Option<Keypair>,
    pub static_key: Option<Keypair>,
    pub pre_message_keys: Vec<NoisePublicKey>,
    pub psk: Vec<u8>,
}

impl HandshakeParameters {
    pub fn new(pattern: HandshakePattern, initiator: bool) -> Self {
        Self {
            pattern,
            initiator,
            ephemeral_key: None,
            static_key: None,
            pre_message_keys: Vec::new(),
            psk: Vec::new(),
        }
    }

    pub fn with_static_key(mut self, keypair: Keypair) -> Self {
        self.static_key = Some(keypair);
        self
    }

    pub fn with_ephemeral_key(mut self, keypair: Keypair) -> Self {
        self.ephemeral_key = Some(keypair);
        self
    }

    pub fn with_pre_message_keys(mut self, keys: Vec<NoisePublicKey>) -> Self {
        self.pre_message_keys = keys;
        self
    }

    pub fn with_psk(mut self, psk: Vec<u8>) -> Self {
        self.psk = psk;
        self
    }
}

/// One step's input: the payload to write, or the payload that arrived.
pub enum StepInput<'a> {
    Write(&'a [u8]),
    Read(&'a PayloadV2),
}

/// One step's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The framed message to hand to the transport.
    Written(PayloadV2),
    /// The decrypted transport payload of an inbound message.
    Read(Vec<u8>),
    /// All messages were already processed; nothing happened.
    Complete,
}

/// Step-by-step orchestration of one handshake.
pub struct Handshake {
    state: HandshakeState,
    poisoned: bool,
}

impl Handshake {
    pub fn new(parameters: HandshakeParameters) -> Result<Self> {
        let state = HandshakeState::new(
            parameters.pattern,
            parameters.initiator,
            parameters.ephemeral_key,
            parameters.static_key,
            &parameters.pre_message_keys,
            parameters.psk,
        )?;
        Ok(Self {
            state,
            poisoned: false,
        })
    }

    /// Whether every message of the pattern has been processed.
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// The nametag both parties expect on the next handshake message.
    ///
    /// Snapshots of the evolving symmetric state; valid for messages
    /// after the first (whose nametag is agreed out-of-band).
    pub fn to_message_nametag(&self) -> MessageNametag {
        self.state.to_message_nametag()
    }

    /// The peer's static key, once a handshake message delivered it.
    pub fn remote_static(&self) -> Option<[u8; KEY_SIZE]> {
        self.state.remote_static_bytes()
    }

    pub fn handshake_hash(&self) -> [u8; KEY_SIZE] {
        self.state.handshake_hash()
    }

    /// Short authorization code for out-of-band confirmation.
    ///
    /// Five decimal digits derived from the first eight bytes of the
    /// transcript hash (big-endian, zero-padded decimal, first five
    /// characters). Meaningful once both parties have processed the
    /// first two handshake messages.
    pub fn authcode(&self) -> String {
        let h = self.state.handshake_hash();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&h[..8]);
        let digits = format!("{:020}", u64::from_be_bytes(prefix));
        digits[..5].to_string()
    }

    /// Process the next handshake message.
    ///
    /// Writing wraps the transport payload (padded, encrypted, bound to
    /// `message_nametag`) and the handshake keys into a [`PayloadV2`].
    /// Reading first verifies the payload's nametag: a mismatch is
    /// recoverable, the state is untouched and the caller may retry
    /// with the next inbound message. Every other failure poisons the
    /// handshake and all further calls are rejected.
    pub fn step(&mut self, input: StepInput<'_>, message_nametag: MessageNametag) -> Result<StepResult> {
        if self.poisoned {
            return Err(WakuPairError::InvalidPattern(
                "handshake was poisoned by an earlier failure".to_string(),
            ));
        }
        if self.state.is_complete() {
            return Ok(StepResult::Complete);
        }

        match (input, self.state.writes_current()) {
            (StepInput::Write(transport_message), true) => {
                match self.write_step(transport_message, message_nametag) {
                    Ok(payload) => Ok(StepResult::Written(payload)),
                    Err(e) => {
                        self.poisoned = true;
                        Err(e)
                    }
                }
            }
            (StepInput::Read(payload), false) => {
                if payload.message_nametag != message_nametag {
                    return Err(WakuPairError::NametagMismatch {
                        expected: message_nametag,
                        actual: payload.message_nametag,
                    });
                }
                match self.read_step(payload, message_nametag) {
                    Ok(message) => Ok(StepResult::Read(message)),
                    Err(e) => {
                        self.poisoned = true;
                        Err(e)
                    }
                }
            }
            (StepInput::Write(_), false) => Err(WakuPairError::InvalidPattern(format!(
                "handshake message {} is read, not written, by this party",
                self.state.message_index() + 1
            ))),
            (StepInput::Read(_), true) => Err(WakuPairError::InvalidPattern(format!(
                "handshake message {} is written, not read, by this party",
                self.state.message_index() + 1
            ))),
        }
    }

    fn write_step(
        &mut self,
        transport_message: &[u8],
        message_nametag: MessageNametag,
    ) -> Result<PayloadV2> {
        let protocol_id = self.state.pattern().protocol_id().ok_or_else(|| {
            WakuPairError::InvalidPattern(format!(
                "pattern {} has no protocol id",
                self.state.pattern().name
            ))
        })? as u8;

        let handshake_message = self.state.write_message_tokens()?;
        let padded = pkcs7_pad(transport_message);
        let transport_message = self.state.encrypt_transport(&padded, &message_nametag)?;
        self.state.advance();

        Ok(PayloadV2 {
            message_nametag,
            protocol_id,
            handshake_message,
            transport_message,
        })
    }

    fn read_step(
        &mut self,
        payload: &PayloadV2,
        message_nametag: MessageNametag,
    ) -> Result<Vec<u8>> {
        self.state.read_message_tokens(&payload.handshake_message)?;
        let padded = self
            .state
            .decrypt_transport(&payload.transport_message, &message_nametag)?;
        let message = pkcs7_unpad(&padded)?;
        self.state.advance();
        Ok(message)
    }

    /// Consume the completed handshake and derive the secure channel.
    pub fn finalize(self) -> Result<HandshakeResult> {
        if self.poisoned {
            return Err(WakuPairError::InvalidPattern(
                "handshake was poisoned by an earlier failure".to_string(),
            ));
        }
        if !self.state.is_complete() {
            return Err(WakuPairError::InvalidPattern(
                "handshake is not complete".to_string(),
            ));
        }

        let (cs1, cs2) = self.state.split();
        let (nms1, nms2) = hkdf_2(self.state.chaining_key(), NAMETAG_SECRETS_IKM);
        let rs = self.state.remote_static_bytes().ok_or_else(|| {
            WakuPairError::InvalidKey("handshake completed without a remote static key".to_string())
        })?;
        let h = self.state.handshake_hash();

        let (cs_outbound, cs_inbound, outbound_secret, inbound_secret) =
            if self.state.is_initiator() {
                (cs1, cs2, nms2, nms1)
            } else {
                (cs2, cs1, nms1, nms2)
            };

        Ok(HandshakeResult {
            cs_outbound,
            cs_inbound,
            nametags_outbound: MessageNametagBuffer::new(Some(outbound_secret)),
            nametags_inbound: MessageNametagBuffer::new(Some(inbound_secret)),
            rs,
            h,
        })
    }
}

/// The secure channel produced by a completed handshake.
///
/// `rs` and `h` are retained for channel binding; everything else is
/// live session state mutated by the read/write operations below.
pub struct HandshakeResult {
    pub cs_outbound: CipherState,
    pub cs_inbound: CipherState,
    pub nametags_outbound: MessageNametagBuffer,
    pub nametags_inbound: MessageNametagBuffer,
    /// The peer's static key.
    pub rs: [u8; KEY_SIZE],
    /// The final handshake hash.
    pub h: [u8; KEY_SIZE],
}

impl HandshakeResult {
    /// Frame and encrypt an outbound transport message.
    pub fn write_message(&mut self, transport_message: &[u8]) -> Result<PayloadV2> {
        let message_nametag = self.nametags_outbound.pop();
        let transport_message = self
            .cs_outbound
            .encrypt_with_ad(&message_nametag, transport_message)?;
        Ok(PayloadV2 {
            message_nametag,
            protocol_id: ProtocolId::None as u8,
            handshake_message: Vec::new(),
            transport_message,
        })
    }

    /// Verify, decrypt and accept an inbound payload.
    ///
    /// The nametag is located in the inbound window first; only a
    /// successful decryption consumes it. Out-of-order payloads report
    /// how many earlier messages were skipped so the caller can decide
    /// to [`delete_inbound_nametags`](Self::delete_inbound_nametags).
    pub fn read_message(&mut self, payload: &PayloadV2) -> Result<Vec<u8>> {
        self.nametags_inbound.check_nametag(&payload.message_nametag)?;
        let plaintext = self
            .cs_inbound
            .decrypt_with_ad(&payload.message_nametag, &payload.transport_message)?;
        self.nametags_inbound.pop();
        Ok(plaintext)
    }

    /// Give up on the next `n` inbound messages.
    ///
    /// Advances the nametag window and the inbound nonce together: the
    /// sender consumed one nonce per skipped message, so both counters
    /// must move for later ciphertexts to line up.
    pub fn delete_inbound_nametags(&mut self, n: usize) {
        self.nametags_inbound.delete(n);
        let nonce = self.cs_inbound.nonce().value();
        self.cs_inbound.set_nonce(Nonce::from(nonce + n as u64));
    }
}
