//! CipherState: an AEAD key with an automatically advancing nonce.

use zeroize::Zeroize;

use crate::crypto::{aead_decrypt, aead_encrypt};
use crate::nonce::Nonce;
use crate::types::{Result, KEY_SIZE};

/// A ChaCha20-Poly1305 key paired with a message counter.
///
/// The all-zero key is the "empty" sentinel: an empty cipher state
/// passes data through unchanged and never advances its nonce, which is
/// how handshake material flows before the first key is mixed in.
#[derive(Clone)]
pub struct CipherState {
    k: [u8; KEY_SIZE],
    n: Nonce,
}

impl CipherState {
    /// Create a cipher state with the given key and a zero nonce.
    pub fn new(k: [u8; KEY_SIZE]) -> Self {
        Self { k, n: Nonce::new() }
    }

    /// Create an empty (keyless) cipher state.
    pub fn empty() -> Self {
        Self::new([0u8; KEY_SIZE])
    }

    /// Whether a key has been set.
    pub fn has_key(&self) -> bool {
        self.k != [0u8; KEY_SIZE]
    }

    pub fn nonce(&self) -> Nonce {
        self.n
    }

    /// Overwrite the nonce. Intended for resuming persisted sessions and
    /// for exercising the nonce cap in tests.
    pub fn set_nonce(&mut self, n: Nonce) {
        self.n = n;
    }

    /// Encrypt `plaintext` under the current nonce and advance it.
    ///
    /// With no key set, returns the plaintext unchanged and leaves the
    /// nonce alone.
    pub fn encrypt_with_ad(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.n.assert_valid()?;
        if !self.has_key() {
            return Ok(plaintext.to_vec());
        }

        let ciphertext = aead_encrypt(&self.k, &self.n.to_bytes(), ad, plaintext)?;
        self.n.increment();
        Ok(ciphertext)
    }

    /// Decrypt `ciphertext` under the current nonce and advance it.
    ///
    /// A failed authentication leaves the nonce untouched so that a
    /// forged message cannot desynchronize the channel. With no key set,
    /// returns the input unchanged and leaves the nonce alone.
    pub fn decrypt_with_ad(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.n.assert_valid()?;
        if !self.has_key() {
            return Ok(ciphertext.to_vec());
        }

        let plaintext = aead_decrypt(&self.k, &self.n.to_bytes(), ad, ciphertext)?;
        self.n.increment();
        Ok(plaintext)
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::NONCE_MAX;
    use crate::types::WakuPairError;

    #[test]
    fn test_empty_key_is_identity() {
        let mut cs = CipherState::empty();
        assert!(!cs.has_key());

        let out = cs.encrypt_with_ad(b"ad", b"payload").unwrap();
        assert_eq!(out, b"payload");
        assert_eq!(cs.nonce().value(), 0);

        let back = cs.decrypt_with_ad(b"ad", &out).unwrap();
        assert_eq!(back, b"payload");
        assert_eq!(cs.nonce().value(), 0);
    }

    #[test]
    fn test_roundtrip_advances_nonce() {
        let mut sender = CipherState::new([0x42u8; 32]);
        let mut receiver = CipherState::new([0x42u8; 32]);

        let ciphertext = sender.encrypt_with_ad(b"ad", b"first").unwrap();
        assert_eq!(sender.nonce().value(), 1);
        assert_ne!(ciphertext, b"first");

        let plaintext = receiver.decrypt_with_ad(b"ad", &ciphertext).unwrap();
        assert_eq!(plaintext, b"first");
        assert_eq!(receiver.nonce().value(), 1);
    }

    #[test]
    fn test_failed_decrypt_keeps_nonce() {
        let mut sender = CipherState::new([0x42u8; 32]);
        let mut receiver = CipherState::new([0x42u8; 32]);

        let mut ciphertext = sender.encrypt_with_ad(b"ad", b"msg").unwrap();
        ciphertext[0] ^= 1;

        assert!(matches!(
            receiver.decrypt_with_ad(b"ad", &ciphertext),
            Err(WakuPairError::AuthenticationFailure)
        ));
        assert_eq!(receiver.nonce().value(), 0);

        // An untampered retransmission still decrypts.
        ciphertext[0] ^= 1;
        assert_eq!(receiver.decrypt_with_ad(b"ad", &ciphertext).unwrap(), b"msg");
    }

    #[test]
    fn test_nonce_exhaustion_is_stable() {
        let mut cs = CipherState::new([0x42u8; 32]);
        cs.set_nonce(Nonce::from(NONCE_MAX));

        // The final counter value is still usable.
        cs.encrypt_with_ad(b"", b"last").unwrap();

        for _ in 0..3 {
            assert!(matches!(
                cs.encrypt_with_ad(b"", b"too late"),
                Err(WakuPairError::NonceExhausted)
            ));
            assert!(matches!(
                cs.decrypt_with_ad(b"", b"too late"),
                Err(WakuPairError::NonceExhausted)
            ));
        }
    }
}
