//! Cryptographic primitives: SHA-256, chained HKDF, ChaCha20-Poly1305
//! and the static-key commitment.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::types::{Result, WakuPairError, KEY_SIZE};

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn hkdf_expand(salt: &[u8; KEY_SIZE], ikm: &[u8], okm: &mut [u8]) {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    hkdf.expand(&[], okm)
        .expect("output length is a small multiple of 32, well within the HKDF limit");
}

/// Derive one 32-byte output with HKDF-SHA256 (salt `ck`, empty info).
pub fn hkdf_1(ck: &[u8; KEY_SIZE], ikm: &[u8]) -> [u8; KEY_SIZE] {
    let mut okm = [0u8; KEY_SIZE];
    hkdf_expand(ck, ikm, &mut okm);
    okm
}

/// Derive two chained 32-byte outputs with HKDF-SHA256.
pub fn hkdf_2(ck: &[u8; KEY_SIZE], ikm: &[u8]) -> ([u8; KEY_SIZE], [u8; KEY_SIZE]) {
    let mut okm = [0u8; 2 * KEY_SIZE];
    hkdf_expand(ck, ikm, &mut okm);

    let mut first = [0u8; KEY_SIZE];
    let mut second = [0u8; KEY_SIZE];
    first.copy_from_slice(&okm[..KEY_SIZE]);
    second.copy_from_slice(&okm[KEY_SIZE..]);
    (first, second)
}

/// Derive three chained 32-byte outputs with HKDF-SHA256.
pub fn hkdf_3(
    ck: &[u8; KEY_SIZE],
    ikm: &[u8],
) -> ([u8; KEY_SIZE], [u8; KEY_SIZE], [u8; KEY_SIZE]) {
    let mut okm = [0u8; 3 * KEY_SIZE];
    hkdf_expand(ck, ikm, &mut okm);

    let mut first = [0u8; KEY_SIZE];
    let mut second = [0u8; KEY_SIZE];
    let mut third = [0u8; KEY_SIZE];
    first.copy_from_slice(&okm[..KEY_SIZE]);
    second.copy_from_slice(&okm[KEY_SIZE..2 * KEY_SIZE]);
    third.copy_from_slice(&okm[2 * KEY_SIZE..]);
    (first, second, third)
}

/// Encrypt with ChaCha20-Poly1305 (IETF construction).
///
/// Returns the ciphertext with the 16-byte authentication tag appended.
pub fn aead_encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; 12],
    ad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: ad,
            },
        )
        .map_err(|e| WakuPairError::EncryptionFailure(e.to_string()))
}

/// Decrypt with ChaCha20-Poly1305 (IETF construction).
///
/// The ciphertext must carry the 16-byte tag. Any mismatch in key,
/// nonce, associated data or ciphertext yields an authentication
/// failure without revealing anything else.
pub fn aead_decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; 12],
    ad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: ad,
            },
        )
        .map_err(|_| WakuPairError::AuthenticationFailure)
}

/// Commit to a public key with 32 bytes of randomness.
///
/// `commit(pk, r) = SHA-256(pk || r)`. Revealing `r` later opens the
/// commitment; `r` must come from a CSPRNG and never be reused.
pub fn commit_public_key(public_key: &[u8; KEY_SIZE], r: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut input = Vec::with_capacity(2 * KEY_SIZE);
    input.extend_from_slice(public_key);
    input.extend_from_slice(r);
    sha256(&input)
}
