//! Type definitions and protocol constants for the pairing engine.

use thiserror::Error;

/// Size of an X25519 public key or derived secret in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of a message nametag in bytes.
pub const MESSAGE_NAMETAG_SIZE: usize = 16;

/// Number of expected nametags kept in a nametag buffer.
pub const MESSAGE_NAMETAG_BUFFER_SIZE: usize = 50;

/// Block size for PKCS#7 padding of handshake transport payloads.
///
/// 248 leaves room for the 16-byte AEAD tag inside a 256-byte block.
/// Both parties must use the same block size or handshake decryption
/// fails.
pub const PADDING_BLOCK_SIZE: usize = 248;

/// Maximum serialized size of the handshake-key section of a payload.
pub const MAX_HANDSHAKE_SECTION_SIZE: usize = 255;

/// A 16-byte per-message tag used to address and order messages over a
/// lossy transport.
pub type MessageNametag = [u8; MESSAGE_NAMETAG_SIZE];

/// Errors that can occur during pairing and secure-channel operations.
#[derive(Error, Debug)]
pub enum WakuPairError {
    /// AEAD tag verification failed. The cipher state is unchanged and
    /// the session is unrecoverable.
    #[error("authentication failure: AEAD tag mismatch")]
    AuthenticationFailure,

    /// AEAD encryption failed.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// The cipher state reached the nonce cap; the session must end.
    #[error("nonce exhausted: cipher state reached the maximum nonce")]
    NonceExhausted,

    /// Unrecognized pattern, malformed pre-message, or unsupported token.
    #[error("invalid handshake pattern: {0}")]
    InvalidPattern(String),

    /// Wrong key length, invalid key flag, or a missing required key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// PKCS#7 validation failed during handshake transport decryption.
    #[error("invalid padding in handshake transport message")]
    InvalidPadding,

    /// The serialized handshake-key section exceeds the 1-byte length field.
    #[error("handshake keys exceed {MAX_HANDSHAKE_SECTION_SIZE} serialized bytes")]
    HandshakeTooLarge,

    /// An inbound handshake message carried an unexpected nametag.
    ///
    /// Recoverable while reading handshake messages: the handshake state
    /// is untouched and the caller may wait for the next inbound message.
    #[error("message nametag mismatch: expected {expected:02x?}, actual {actual:02x?}")]
    NametagMismatch {
        expected: MessageNametag,
        actual: MessageNametag,
    },

    /// A nametag was not found in the expected window.
    #[error("message nametag not found in the expected window")]
    NametagNotFound,

    /// A nametag was found ahead of the window head; `skipped` earlier
    /// messages were lost or are still in flight.
    #[error("message nametag found {skipped} positions ahead of the window head")]
    NametagOutOfOrder { skipped: usize },

    /// Opening a static-key commitment failed.
    #[error("static key commitment mismatch")]
    CommitmentMismatch,

    /// The user declined the displayed authorization code.
    #[error("authorization code rejected")]
    AuthcodeRejected,

    /// The pairing exchange did not complete within the configured timeout.
    #[error("pairing timed out")]
    PairingTimeout,

    /// Malformed wire data.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A transport collaborator failed.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, WakuPairError>;
