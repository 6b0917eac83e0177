//! HandshakeState: the pattern token interpreter.
//!
//! One engine executes every supported pattern. It walks the static
//! token tables, mutating the symmetric state and exchanging public
//! keys as `NoisePublicKey` values; the driver in `session` wraps it
//! with wire framing, padding and nametag handling.

use x25519_dalek::PublicKey;

use crate::keys::{dh, Keypair};
use crate::patterns::{Direction, HandshakePattern, Token};
use crate::payload::NoisePublicKey;
use crate::symmetric::SymmetricState;
use crate::types::{MessageNametag, Result, WakuPairError, KEY_SIZE};

fn to_key_array(bytes: &[u8]) -> Result<[u8; KEY_SIZE]> {
    bytes.try_into().map_err(|_| {
        WakuPairError::InvalidKey(format!(
            "public key must be {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}

pub(crate) struct HandshakeState {
    s: Option<Keypair>,
    e: Option<Keypair>,
    rs: Option<PublicKey>,
    re: Option<PublicKey>,
    ss: SymmetricState,
    initiator: bool,
    pattern: HandshakePattern,
    msg_idx: usize,
    psk: Vec<u8>,
}

impl HandshakeState {
    /// Build a handshake state and process the pattern's pre-messages.
    ///
    /// `pre_message_keys` supplies the pre-message public keys in
    /// declared order. Both parties pass the same list: the owner of a
    /// key confirms it matches its own key pair, the other party adopts
    /// it as remote.
    pub(crate) fn new(
        pattern: HandshakePattern,
        initiator: bool,
        ephemeral_key: Option<Keypair>,
        static_key: Option<Keypair>,
        pre_message_keys: &[NoisePublicKey],
        psk: Vec<u8>,
    ) -> Result<Self> {
        let ss = SymmetricState::new(pattern.name.as_bytes());
        let mut state = Self {
            s: static_key,
            e: ephemeral_key,
            rs: None,
            re: None,
            ss,
            initiator,
            pattern,
            msg_idx: 0,
            psk,
        };
        state.process_pre_messages(pre_message_keys)?;
        Ok(state)
    }

    fn writes(&self, direction: Direction) -> bool {
        match direction {
            Direction::Right => self.initiator,
            Direction::Left => !self.initiator,
        }
    }

    /// Whether the current message is written (rather than read) here.
    pub(crate) fn writes_current(&self) -> bool {
        self.writes(self.pattern.messages[self.msg_idx].direction)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.msg_idx >= self.pattern.messages.len()
    }

    pub(crate) fn message_index(&self) -> usize {
        self.msg_idx
    }

    pub(crate) fn advance(&mut self) {
        self.msg_idx += 1;
    }

    pub(crate) fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub(crate) fn pattern(&self) -> &HandshakePattern {
        &self.pattern
    }

    pub(crate) fn handshake_hash(&self) -> [u8; KEY_SIZE] {
        self.ss.handshake_hash()
    }

    pub(crate) fn chaining_key(&self) -> &[u8; KEY_SIZE] {
        self.ss.chaining_key()
    }

    pub(crate) fn to_message_nametag(&self) -> MessageNametag {
        self.ss.to_message_nametag()
    }

    pub(crate) fn remote_static_bytes(&self) -> Option<[u8; KEY_SIZE]> {
        self.rs.map(|pk| *pk.as_bytes())
    }

    pub(crate) fn split(&self) -> (crate::cipher::CipherState, crate::cipher::CipherState) {
        self.ss.split()
    }

    fn local_ephemeral(&self) -> Result<&Keypair> {
        self.e
            .as_ref()
            .ok_or_else(|| WakuPairError::InvalidKey("no local ephemeral key".to_string()))
    }

    fn local_static(&self) -> Result<&Keypair> {
        self.s
            .as_ref()
            .ok_or_else(|| WakuPairError::InvalidKey("no local static key".to_string()))
    }

    fn remote_ephemeral(&self) -> Result<PublicKey> {
        self.re
            .ok_or_else(|| WakuPairError::InvalidKey("no remote ephemeral key".to_string()))
    }

    fn remote_static(&self) -> Result<PublicKey> {
        self.rs
            .ok_or_else(|| WakuPairError::InvalidKey("no remote static key".to_string()))
    }

    /// Process the declared pre-messages once, at construction.
    ///
    /// Only `e` and `s` may appear. Every key is mixed into the
    /// transcript; psk variants additionally mix it into the key chain.
    fn process_pre_messages(&mut self, pre_message_keys: &[NoisePublicKey]) -> Result<()> {
        let psk_pattern = self.pattern.is_psk();
        let mut supplied = pre_message_keys.iter();

        for pre_message in self.pattern.pre_messages {
            let writing = self.writes(pre_message.direction);
            for token in pre_message.tokens {
                let declared = match supplied.next() {
                    Some(NoisePublicKey::Unencrypted(pk)) => *pk,
                    Some(NoisePublicKey::Encrypted(_)) => {
                        return Err(WakuPairError::InvalidKey(
                            "pre-message keys must be unencrypted".to_string(),
                        ))
                    }
                    None => {
                        return Err(WakuPairError::InvalidKey(
                            "missing pre-message public key".to_string(),
                        ))
                    }
                };

                match token {
                    Token::E => {
                        if writing {
                            if self.local_ephemeral()?.public_bytes() != declared {
                                return Err(WakuPairError::InvalidKey(
                                    "pre-message ephemeral does not match the local key"
                                        .to_string(),
                                ));
                            }
                        } else {
                            self.re = Some(PublicKey::from(declared));
                        }
                    }
                    Token::S => {
                        if writing {
                            if self.local_static()?.public_bytes() != declared {
                                return Err(WakuPairError::InvalidKey(
                                    "pre-message static does not match the local key".to_string(),
                                ));
                            }
                        } else {
                            self.rs = Some(PublicKey::from(declared));
                        }
                    }
                    other => {
                        return Err(WakuPairError::InvalidPattern(format!(
                            "token {other:?} is not allowed in a pre-message"
                        )))
                    }
                }

                self.ss.mix_hash(&declared);
                if psk_pattern {
                    self.ss.mix_key(&declared);
                }
            }
        }
        Ok(())
    }

    /// Run the writing side of the current message pattern, producing
    /// the handshake keys to put on the wire.
    pub(crate) fn write_message_tokens(&mut self) -> Result<Vec<NoisePublicKey>> {
        let tokens = self.pattern.messages[self.msg_idx].tokens;
        let psk_pattern = self.pattern.is_psk();
        let mut keys = Vec::new();

        for token in tokens {
            match token {
                Token::E => {
                    // A pre-seeded ephemeral (committed out-of-band) is
                    // reused; otherwise generate a fresh one.
                    if self.e.is_none() {
                        self.e = Some(Keypair::generate());
                    }
                    let pk = self.local_ephemeral()?.public_bytes();
                    self.ss.mix_hash(&pk);
                    if psk_pattern {
                        self.ss.mix_key(&pk);
                    }
                    keys.push(NoisePublicKey::Unencrypted(pk));
                }
                Token::S => {
                    let pk = self.local_static()?.public_bytes();
                    let enc = self.ss.encrypt_and_hash(&pk, &[])?;
                    keys.push(NoisePublicKey::from_handshake_bytes(enc)?);
                }
                Token::Ee => {
                    let ikm = dh(self.local_ephemeral()?.secret(), &self.remote_ephemeral()?);
                    self.ss.mix_key(&ikm);
                }
                Token::Es => {
                    let ikm = if self.initiator {
                        dh(self.local_ephemeral()?.secret(), &self.remote_static()?)
                    } else {
                        dh(self.local_static()?.secret(), &self.remote_ephemeral()?)
                    };
                    self.ss.mix_key(&ikm);
                }
                Token::Se => {
                    let ikm = if self.initiator {
                        dh(self.local_static()?.secret(), &self.remote_ephemeral()?)
                    } else {
                        dh(self.local_ephemeral()?.secret(), &self.remote_static()?)
                    };
                    self.ss.mix_key(&ikm);
                }
                Token::Ss => {
                    let ikm = dh(self.local_static()?.secret(), &self.remote_static()?);
                    self.ss.mix_key(&ikm);
                }
                Token::Psk => {
                    let psk = self.pre_shared_key()?;
                    self.ss.mix_key_and_hash(&psk);
                }
            }
        }
        Ok(keys)
    }

    /// Run the reading side of the current message pattern, consuming
    /// the peer's handshake keys head to tail.
    pub(crate) fn read_message_tokens(&mut self, keys: &[NoisePublicKey]) -> Result<()> {
        let tokens = self.pattern.messages[self.msg_idx].tokens;
        let psk_pattern = self.pattern.is_psk();
        let mut supplied = keys.iter();

        for token in tokens {
            match token {
                Token::E => {
                    let key = supplied.next().ok_or_else(|| {
                        WakuPairError::InvalidKey(
                            "handshake message is missing an ephemeral key".to_string(),
                        )
                    })?;
                    let pk = match key {
                        NoisePublicKey::Unencrypted(pk) => {
                            let pk = *pk;
                            self.ss.mix_hash(&pk);
                            pk
                        }
                        NoisePublicKey::Encrypted(ciphertext) => {
                            let ciphertext = ciphertext.clone();
                            let plaintext = self.ss.decrypt_and_hash(&ciphertext, &[])?;
                            to_key_array(&plaintext)?
                        }
                    };
                    self.re = Some(PublicKey::from(pk));
                    if psk_pattern {
                        self.ss.mix_key(&pk);
                    }
                }
                Token::S => {
                    let key = supplied.next().ok_or_else(|| {
                        WakuPairError::InvalidKey(
                            "handshake message is missing a static key".to_string(),
                        )
                    })?;
                    // A plaintext static key goes through DecryptAndHash
                    // too: with no symmetric key that is the identity and
                    // keeps the transcripts aligned; with a key set it is
                    // an authentication failure, as it should be.
                    let bytes = match key {
                        NoisePublicKey::Unencrypted(pk) => pk.to_vec(),
                        NoisePublicKey::Encrypted(ciphertext) => ciphertext.clone(),
                    };
                    let plaintext = self.ss.decrypt_and_hash(&bytes, &[])?;
                    self.rs = Some(PublicKey::from(to_key_array(&plaintext)?));
                }
                Token::Ee => {
                    let ikm = dh(self.local_ephemeral()?.secret(), &self.remote_ephemeral()?);
                    self.ss.mix_key(&ikm);
                }
                Token::Es => {
                    let ikm = if self.initiator {
                        dh(self.local_ephemeral()?.secret(), &self.remote_static()?)
                    } else {
                        dh(self.local_static()?.secret(), &self.remote_ephemeral()?)
                    };
                    self.ss.mix_key(&ikm);
                }
                Token::Se => {
                    let ikm = if self.initiator {
                        dh(self.local_static()?.secret(), &self.remote_ephemeral()?)
                    } else {
                        dh(self.local_ephemeral()?.secret(), &self.remote_static()?)
                    };
                    self.ss.mix_key(&ikm);
                }
                Token::Ss => {
                    let ikm = dh(self.local_static()?.secret(), &self.remote_static()?);
                    self.ss.mix_key(&ikm);
                }
                Token::Psk => {
                    let psk = self.pre_shared_key()?;
                    self.ss.mix_key_and_hash(&psk);
                }
            }
        }
        Ok(())
    }

    fn pre_shared_key(&self) -> Result<Vec<u8>> {
        if self.psk.len() != KEY_SIZE {
            return Err(WakuPairError::InvalidKey(format!(
                "pre-shared key must be {KEY_SIZE} bytes, got {}",
                self.psk.len()
            )));
        }
        Ok(self.psk.clone())
    }

    /// Encrypt a handshake transport payload, binding the nametag.
    pub(crate) fn encrypt_transport(
        &mut self,
        plaintext: &[u8],
        nametag: &MessageNametag,
    ) -> Result<Vec<u8>> {
        self.ss.encrypt_and_hash(plaintext, nametag)
    }

    /// Decrypt a handshake transport payload, binding the nametag.
    pub(crate) fn decrypt_transport(
        &mut self,
        ciphertext: &[u8],
        nametag: &MessageNametag,
    ) -> Result<Vec<u8>> {
        self.ss.decrypt_and_hash(ciphertext, nametag)
    }
}
