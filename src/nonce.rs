//! 64-bit message counter with the protocol nonce cap.

use crate::types::{Result, WakuPairError};

/// Highest counter value a cipher state may use.
///
/// The cap is a protocol constant: once a counter would exceed it, the
/// owning cipher state refuses all further operations.
pub const NONCE_MAX: u64 = u32::MAX as u64;

/// A monotonically increasing message counter.
///
/// Serialized as the ChaCha20-Poly1305 IETF 12-byte nonce: the low four
/// counter bytes little-endian followed by eight zero bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nonce(u64);

impl Nonce {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Advance the counter by one.
    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// Fail once the counter has passed the cap.
    ///
    /// An operation at `NONCE_MAX` itself is still allowed; the counter
    /// it advances to is then rejected here on every later call, so a
    /// capped state fails repeatedly without mutating.
    pub fn assert_valid(&self) -> Result<()> {
        if self.0 > NONCE_MAX {
            return Err(WakuPairError::NonceExhausted);
        }
        Ok(())
    }

    /// Wire form of the counter.
    pub fn to_bytes(self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&(self.0 as u32).to_le_bytes());
        bytes
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
