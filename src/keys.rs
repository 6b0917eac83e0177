//! X25519 key pairs and Diffie-Hellman.

use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::types::KEY_SIZE;

/// An X25519 key pair.
#[derive(Clone)]
pub struct Keypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh key pair from the thread CSPRNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Build a key pair from an existing secret.
    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        *self.public.as_bytes()
    }
}

/// Perform X25519 Diffie-Hellman.
///
/// Never fails: a low-order peer key produces the all-zero output,
/// which contributes nothing useful to the key schedule but keeps the
/// state machine total.
pub fn dh(secret: &StaticSecret, public: &PublicKey) -> [u8; KEY_SIZE] {
    secret.diffie_hellman(public).to_bytes()
}

/// Draw 32 bytes from the thread CSPRNG.
pub fn random_bytes_32() -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dh_symmetry() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        assert_eq!(
            dh(alice.secret(), bob.public()),
            dh(bob.secret(), alice.public())
        );
    }

    #[test]
    fn test_public_matches_secret() {
        let pair = Keypair::generate();
        let rebuilt = Keypair::from_secret(pair.secret().clone());
        assert_eq!(pair.public_bytes(), rebuilt.public_bytes());
    }

    #[test]
    fn test_generate_is_random() {
        assert_ne!(
            Keypair::generate().public_bytes(),
            Keypair::generate().public_bytes()
        );
    }
}
