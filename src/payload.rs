//! Wire framing: tagged public keys and the versioned payload envelope.

use crate::types::{
    MessageNametag, Result, WakuPairError, KEY_SIZE, MAX_HANDSHAKE_SECTION_SIZE,
    MESSAGE_NAMETAG_SIZE, TAG_SIZE,
};

/// Serialized size of an encrypted public key: X coordinate plus tag.
const ENCRYPTED_KEY_SIZE: usize = KEY_SIZE + TAG_SIZE;

/// A public key as it appears on the wire during a handshake.
///
/// The single flag byte tells the reader whether the 32-byte X
/// coordinate travels in the clear or encrypted under the current
/// handshake key (with its 16-byte tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoisePublicKey {
    /// Flag 0: a plaintext 32-byte X25519 public key.
    Unencrypted([u8; KEY_SIZE]),
    /// Flag 1: ciphertext of the X coordinate plus the Poly1305 tag.
    Encrypted(Vec<u8>),
}

impl NoisePublicKey {
    /// Wrap AEAD output, choosing the flag from its length.
    pub(crate) fn from_handshake_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() == KEY_SIZE {
            let mut key = [0u8; KEY_SIZE];
            key.copy_from_slice(&bytes);
            Ok(Self::Unencrypted(key))
        } else if bytes.len() == ENCRYPTED_KEY_SIZE {
            Ok(Self::Encrypted(bytes))
        } else {
            Err(WakuPairError::InvalidKey(format!(
                "handshake key must be {KEY_SIZE} or {ENCRYPTED_KEY_SIZE} bytes, got {}",
                bytes.len()
            )))
        }
    }

    pub fn flag(&self) -> u8 {
        match self {
            Self::Unencrypted(_) => 0,
            Self::Encrypted(_) => 1,
        }
    }

    /// Serialized length including the flag byte.
    pub fn serialized_len(&self) -> usize {
        match self {
            Self::Unencrypted(_) => 1 + KEY_SIZE,
            Self::Encrypted(_) => 1 + ENCRYPTED_KEY_SIZE,
        }
    }

    /// Encode as `flag || bytes`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_len());
        out.push(self.flag());
        match self {
            Self::Unencrypted(key) => out.extend_from_slice(key),
            Self::Encrypted(ciphertext) => out.extend_from_slice(ciphertext),
        }
        out
    }

    /// Decode a single key occupying the whole input.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let (key, consumed) = Self::read_from(data)?;
        if consumed != data.len() {
            return Err(WakuPairError::InvalidKey(format!(
                "{} trailing bytes after public key",
                data.len() - consumed
            )));
        }
        Ok(key)
    }

    /// Decode one key from the head of `data`, returning the bytes used.
    fn read_from(data: &[u8]) -> Result<(Self, usize)> {
        let flag = *data
            .first()
            .ok_or_else(|| WakuPairError::InvalidKey("empty public key".to_string()))?;

        match flag {
            0 => {
                if data.len() < 1 + KEY_SIZE {
                    return Err(WakuPairError::InvalidKey(
                        "truncated unencrypted public key".to_string(),
                    ));
                }
                let mut key = [0u8; KEY_SIZE];
                key.copy_from_slice(&data[1..1 + KEY_SIZE]);
                Ok((Self::Unencrypted(key), 1 + KEY_SIZE))
            }
            1 => {
                if data.len() < 1 + ENCRYPTED_KEY_SIZE {
                    return Err(WakuPairError::InvalidKey(
                        "truncated encrypted public key".to_string(),
                    ));
                }
                let ciphertext = data[1..1 + ENCRYPTED_KEY_SIZE].to_vec();
                Ok((Self::Encrypted(ciphertext), 1 + ENCRYPTED_KEY_SIZE))
            }
            other => Err(WakuPairError::InvalidKey(format!(
                "unknown public key flag {other}"
            ))),
        }
    }
}

/// The versioned wire envelope carried on the content topic.
///
/// Layout:
/// - `[0..16]`   message nametag
/// - `[16]`      protocol id
/// - `[17]`      handshake-key section length (bytes, max 255)
/// - `[18..]`    serialized handshake keys
/// - 8-byte little-endian transport message length
/// - transport message bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadV2 {
    pub message_nametag: MessageNametag,
    pub protocol_id: u8,
    pub handshake_message: Vec<NoisePublicKey>,
    pub transport_message: Vec<u8>,
}

impl PayloadV2 {
    /// Encode the payload to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let keys_len: usize = self
            .handshake_message
            .iter()
            .map(NoisePublicKey::serialized_len)
            .sum();
        if keys_len > MAX_HANDSHAKE_SECTION_SIZE {
            return Err(WakuPairError::HandshakeTooLarge);
        }

        let mut data = Vec::with_capacity(
            MESSAGE_NAMETAG_SIZE + 2 + keys_len + 8 + self.transport_message.len(),
        );
        data.extend_from_slice(&self.message_nametag);
        data.push(self.protocol_id);
        data.push(keys_len as u8);
        for key in &self.handshake_message {
            data.extend_from_slice(&key.serialize());
        }
        data.extend_from_slice(&(self.transport_message.len() as u64).to_le_bytes());
        data.extend_from_slice(&self.transport_message);
        Ok(data)
    }

    /// Decode bytes into a payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header_len = MESSAGE_NAMETAG_SIZE + 2;
        if data.len() < header_len {
            return Err(WakuPairError::InvalidPayload(format!(
                "data too short: {} bytes (minimum {header_len})",
                data.len()
            )));
        }

        let mut message_nametag = [0u8; MESSAGE_NAMETAG_SIZE];
        message_nametag.copy_from_slice(&data[..MESSAGE_NAMETAG_SIZE]);
        let protocol_id = data[MESSAGE_NAMETAG_SIZE];
        let keys_len = data[MESSAGE_NAMETAG_SIZE + 1] as usize;

        if data.len() < header_len + keys_len + 8 {
            return Err(WakuPairError::InvalidPayload(
                "handshake section exceeds payload".to_string(),
            ));
        }

        let mut handshake_message = Vec::new();
        let mut section = &data[header_len..header_len + keys_len];
        while !section.is_empty() {
            let (key, consumed) = NoisePublicKey::read_from(section)?;
            handshake_message.push(key);
            section = &section[consumed..];
        }

        let len_offset = header_len + keys_len;
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&data[len_offset..len_offset + 8]);
        let transport_len = u64::from_le_bytes(len_bytes);

        let body = &data[len_offset + 8..];
        if transport_len != body.len() as u64 {
            return Err(WakuPairError::InvalidPayload(format!(
                "transport message length {transport_len} does not match {} remaining bytes",
                body.len()
            )));
        }

        Ok(Self {
            message_nametag,
            protocol_id,
            handshake_message,
            transport_message: body.to_vec(),
        })
    }
}
