//! Out-of-band pairing bootstrap: QR serialization and content topics.
//!
//! Format: `app:version:shard:ephemeralKey:committedStaticKey`, each
//! field base64url encoded (padded). The responder renders this string
//! as a QR code; the initiator scans and parses it.

use base64::{engine::general_purpose::URL_SAFE, Engine};

use crate::types::{Result, WakuPairError, KEY_SIZE};

/// The out-of-band pairing bootstrap record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qr {
    /// Application name, also the first content-topic segment.
    pub application_name: String,
    /// Application version string.
    pub application_version: String,
    /// Shard identifier isolating this pairing's traffic.
    pub shard_id: String,
    /// The responder's committed ephemeral public key.
    pub ephemeral_key: [u8; KEY_SIZE],
    /// SHA-256 commitment to the responder's static key.
    pub committed_static_key: [u8; KEY_SIZE],
}

impl Qr {
    pub fn new(
        application_name: impl Into<String>,
        application_version: impl Into<String>,
        shard_id: impl Into<String>,
        ephemeral_key: [u8; KEY_SIZE],
        committed_static_key: [u8; KEY_SIZE],
    ) -> Self {
        Self {
            application_name: application_name.into(),
            application_version: application_version.into(),
            shard_id: shard_id.into(),
            ephemeral_key,
            committed_static_key,
        }
    }

    /// Encode to the colon-separated base64url string.
    pub fn encode(&self) -> String {
        [
            URL_SAFE.encode(self.application_name.as_bytes()),
            URL_SAFE.encode(self.application_version.as_bytes()),
            URL_SAFE.encode(self.shard_id.as_bytes()),
            URL_SAFE.encode(self.ephemeral_key),
            URL_SAFE.encode(self.committed_static_key),
        ]
        .join(":")
    }

    /// Parse a scanned QR string.
    ///
    /// Rejects anything that is not exactly five base64url fields.
    pub fn parse(input: &str) -> Result<Self> {
        let fields: Vec<&str> = input.split(':').collect();
        if fields.len() != 5 {
            return Err(WakuPairError::InvalidPayload(format!(
                "QR must have 5 fields, got {}",
                fields.len()
            )));
        }

        Ok(Self {
            application_name: decode_text(fields[0])?,
            application_version: decode_text(fields[1])?,
            shard_id: decode_text(fields[2])?,
            ephemeral_key: decode_key(fields[3])?,
            committed_static_key: decode_key(fields[4])?,
        })
    }

    /// The content topic this pairing publishes and subscribes on.
    pub fn content_topic(&self) -> String {
        format!(
            "/{}/{}/{}/proto",
            self.application_name, self.application_version, self.shard_id
        )
    }
}

fn decode_text(field: &str) -> Result<String> {
    let bytes = URL_SAFE
        .decode(field)
        .map_err(|e| WakuPairError::InvalidPayload(format!("invalid base64url field: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| WakuPairError::InvalidPayload("QR field is not valid UTF-8".to_string()))
}

fn decode_key(field: &str) -> Result<[u8; KEY_SIZE]> {
    let bytes = URL_SAFE
        .decode(field)
        .map_err(|e| WakuPairError::InvalidPayload(format!("invalid base64url field: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        WakuPairError::InvalidPayload(format!(
            "QR key field must be {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}
