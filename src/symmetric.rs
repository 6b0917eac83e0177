//! SymmetricState: the chaining key and transcript hash of a handshake.

use zeroize::Zeroize;

use crate::cipher::CipherState;
use crate::crypto::{hkdf_1, hkdf_2, hkdf_3, sha256};
use crate::types::{MessageNametag, Result, KEY_SIZE, MESSAGE_NAMETAG_SIZE};

/// The symmetric core of a handshake: chaining key `ck`, transcript
/// hash `h` and the embedded cipher state.
///
/// `ck` accumulates every DH output through HKDF; `h` binds every byte
/// of public handshake data. The two must only ever be mutated through
/// the mix operations below.
pub struct SymmetricState {
    ck: [u8; KEY_SIZE],
    h: [u8; KEY_SIZE],
    cs: CipherState,
}

impl SymmetricState {
    /// Initialize from a protocol name.
    ///
    /// A name of at most 32 bytes becomes `h` directly, zero-padded;
    /// longer names are hashed. `ck` starts equal to `h` and the cipher
    /// state starts empty.
    pub fn new(protocol_name: &[u8]) -> Self {
        let h = if protocol_name.len() <= KEY_SIZE {
            let mut padded = [0u8; KEY_SIZE];
            padded[..protocol_name.len()].copy_from_slice(protocol_name);
            padded
        } else {
            sha256(protocol_name)
        };

        Self {
            ck: h,
            h,
            cs: CipherState::empty(),
        }
    }

    pub fn handshake_hash(&self) -> [u8; KEY_SIZE] {
        self.h
    }

    pub(crate) fn chaining_key(&self) -> &[u8; KEY_SIZE] {
        &self.ck
    }

    /// Whether a symmetric key has been mixed in yet.
    pub fn has_key(&self) -> bool {
        self.cs.has_key()
    }

    /// Mix key material into the chaining key and refresh the cipher key.
    pub fn mix_key(&mut self, ikm: &[u8]) {
        let (ck, temp_k) = hkdf_2(&self.ck, ikm);
        self.ck = ck;
        self.cs = CipherState::new(temp_k);
    }

    /// Mix data into the transcript hash.
    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut input = Vec::with_capacity(KEY_SIZE + data.len());
        input.extend_from_slice(&self.h);
        input.extend_from_slice(data);
        self.h = sha256(&input);
    }

    /// Mix key material into both the chaining key and the transcript.
    ///
    /// Used by the `psk` token, which must influence `h` as well as the
    /// key schedule.
    pub fn mix_key_and_hash(&mut self, ikm: &[u8]) {
        let (ck, temp_h, temp_k) = hkdf_3(&self.ck, ikm);
        self.ck = ck;
        self.mix_hash(&temp_h);
        self.cs = CipherState::new(temp_k);
    }

    /// Encrypt and bind to the transcript.
    ///
    /// The associated data is `h || extra_ad`; the resulting ciphertext
    /// is mixed into `h`.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8], extra_ad: &[u8]) -> Result<Vec<u8>> {
        let mut ad = Vec::with_capacity(KEY_SIZE + extra_ad.len());
        ad.extend_from_slice(&self.h);
        ad.extend_from_slice(extra_ad);

        let ciphertext = self.cs.encrypt_with_ad(&ad, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypt and bind to the transcript.
    ///
    /// The ciphertext, not the plaintext, is mixed into `h`, keeping
    /// both transcripts identical even though only one side encrypts.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8], extra_ad: &[u8]) -> Result<Vec<u8>> {
        let mut ad = Vec::with_capacity(KEY_SIZE + extra_ad.len());
        ad.extend_from_slice(&self.h);
        ad.extend_from_slice(extra_ad);

        let plaintext = self.cs.decrypt_with_ad(&ad, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Derive the two transport cipher states.
    pub fn split(&self) -> (CipherState, CipherState) {
        let (k1, k2) = hkdf_2(&self.ck, &[]);
        (CipherState::new(k1), CipherState::new(k2))
    }

    /// Project the current (ck, h) pair into a 16-byte message nametag.
    ///
    /// Both parties reach identical symmetric states after each
    /// handshake message, so these snapshots address the next message.
    pub fn to_message_nametag(&self) -> MessageNametag {
        let okm = hkdf_1(&self.ck, &self.h);
        let mut nametag = [0u8; MESSAGE_NAMETAG_SIZE];
        nametag.copy_from_slice(&okm[..MESSAGE_NAMETAG_SIZE]);
        nametag
    }
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.ck.zeroize();
    }
}
