//! Sliding window of expected message nametags.
//!
//! After a handshake completes, each direction derives its nametags
//! from a shared 32-byte secret and a counter. The receiver keeps a
//! window of the next expected tags so that lost or reordered messages
//! on the transport are detectable without trial decryption.

use crate::crypto::hkdf_1;
use crate::types::{
    MessageNametag, Result, WakuPairError, KEY_SIZE, MESSAGE_NAMETAG_BUFFER_SIZE,
    MESSAGE_NAMETAG_SIZE,
};

/// Derive the nametag at a counter position from the direction secret.
pub fn message_nametag_at(secret: &[u8; KEY_SIZE], counter: u64) -> MessageNametag {
    let okm = hkdf_1(secret, &counter.to_le_bytes());
    let mut nametag = [0u8; MESSAGE_NAMETAG_SIZE];
    nametag.copy_from_slice(&okm[..MESSAGE_NAMETAG_SIZE]);
    nametag
}

/// A ring of the next expected nametags for one direction.
///
/// The head is the next expected inbound (or next emittable outbound)
/// nametag. Without a secret the buffer stays all-zero and never
/// matches anything; that state only occurs before finalization.
#[derive(Clone)]
pub struct MessageNametagBuffer {
    buffer: [MessageNametag; MESSAGE_NAMETAG_BUFFER_SIZE],
    counter: u64,
    secret: Option<[u8; KEY_SIZE]>,
}

impl MessageNametagBuffer {
    pub fn new(secret: Option<[u8; KEY_SIZE]>) -> Self {
        let mut buffer = Self {
            buffer: [[0u8; MESSAGE_NAMETAG_SIZE]; MESSAGE_NAMETAG_BUFFER_SIZE],
            counter: 0,
            secret,
        };
        if let Some(secret) = buffer.secret {
            for slot in buffer.buffer.iter_mut() {
                *slot = message_nametag_at(&secret, buffer.counter);
                buffer.counter += 1;
            }
        }
        buffer
    }

    /// The current head of the window.
    pub fn first(&self) -> MessageNametag {
        self.buffer[0]
    }

    /// Take the head nametag, rotate the window and derive one new tail
    /// entry. Senders call this before transmitting; receivers after a
    /// successful decryption.
    pub fn pop(&mut self) -> MessageNametag {
        let head = self.buffer[0];
        self.buffer.rotate_left(1);
        if let Some(secret) = self.secret {
            self.buffer[MESSAGE_NAMETAG_BUFFER_SIZE - 1] =
                message_nametag_at(&secret, self.counter);
            self.counter += 1;
        }
        head
    }

    /// Locate a nametag in the window.
    ///
    /// At the head: the message is the expected one. Further along:
    /// `NametagOutOfOrder` reports how many earlier messages were
    /// skipped, and the caller may [`delete`](Self::delete) them to
    /// resynchronize, accepting that they are lost. Absent:
    /// `NametagNotFound`.
    pub fn check_nametag(&self, nametag: &MessageNametag) -> Result<()> {
        if self.secret.is_none() {
            return Err(WakuPairError::NametagNotFound);
        }
        match self.buffer.iter().position(|expected| expected == nametag) {
            Some(0) => Ok(()),
            Some(skipped) => Err(WakuPairError::NametagOutOfOrder { skipped }),
            None => Err(WakuPairError::NametagNotFound),
        }
    }

    /// Drop the first `n` expected nametags and regenerate the tail.
    pub fn delete(&mut self, n: usize) {
        for _ in 0..n {
            self.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_buffer() -> MessageNametagBuffer {
        MessageNametagBuffer::new(Some([0xABu8; 32]))
    }

    #[test]
    fn test_window_is_counter_ordered() {
        let buffer = secret_buffer();
        let secret = [0xABu8; 32];
        assert_eq!(buffer.first(), message_nametag_at(&secret, 0));

        let mut buffer = buffer;
        for counter in 0..(MESSAGE_NAMETAG_BUFFER_SIZE as u64 * 3) {
            assert_eq!(buffer.pop(), message_nametag_at(&secret, counter));
        }
    }

    #[test]
    fn test_check_nametag_positions() {
        let buffer = secret_buffer();
        let secret = [0xABu8; 32];

        assert!(buffer.check_nametag(&message_nametag_at(&secret, 0)).is_ok());

        // Every later position within the window reports its distance.
        for skipped in 1..MESSAGE_NAMETAG_BUFFER_SIZE as u64 {
            let result = buffer.check_nametag(&message_nametag_at(&secret, skipped));
            assert!(matches!(
                result,
                Err(WakuPairError::NametagOutOfOrder { skipped: s }) if s as u64 == skipped
            ));
        }

        // One past the window is gone.
        let result =
            buffer.check_nametag(&message_nametag_at(&secret, MESSAGE_NAMETAG_BUFFER_SIZE as u64));
        assert!(matches!(result, Err(WakuPairError::NametagNotFound)));
    }

    #[test]
    fn test_delete_resynchronizes() {
        let mut buffer = secret_buffer();
        let secret = [0xABu8; 32];

        // Messages 0..3 were lost; 3 is now three positions in.
        let tag = message_nametag_at(&secret, 3);
        assert!(matches!(
            buffer.check_nametag(&tag),
            Err(WakuPairError::NametagOutOfOrder { skipped: 3 })
        ));

        buffer.delete(3);
        assert!(buffer.check_nametag(&tag).is_ok());

        // A late arrival of a deleted message no longer matches.
        let stale = message_nametag_at(&secret, 1);
        assert!(matches!(
            buffer.check_nametag(&stale),
            Err(WakuPairError::NametagNotFound)
        ));
    }

    #[test]
    fn test_secretless_buffer_never_matches() {
        let mut buffer = MessageNametagBuffer::new(None);
        assert_eq!(buffer.first(), [0u8; 16]);
        assert_eq!(buffer.pop(), [0u8; 16]);
        assert_eq!(buffer.pop(), [0u8; 16]);

        // Even the all-zero tag it emits is not accepted.
        assert!(matches!(
            buffer.check_nametag(&[0u8; 16]),
            Err(WakuPairError::NametagNotFound)
        ));
    }

    #[test]
    fn test_distinct_secrets_distinct_tags() {
        let a = MessageNametagBuffer::new(Some([1u8; 32]));
        let b = MessageNametagBuffer::new(Some([2u8; 32]));
        assert_ne!(a.first(), b.first());
    }
}
