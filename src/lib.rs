//! Noise-based device pairing and secure channels over pub/sub transports.
//!
//! Two parties bootstrap trust from an out-of-band QR exchange, run a
//! committed-static-key handshake over an untrusted, unordered
//! transport, confirm a short authorization code, and come away with an
//! authenticated, confidential channel whose messages are addressed by
//! per-message nametags.

mod types;
mod crypto;
mod keys;
mod nonce;
mod cipher;
mod symmetric;
mod patterns;
mod handshake;
mod payload;
mod nametag;
mod session;
mod qr;
mod transport;
mod pairing;
mod codec;

pub use types::*;
pub use crypto::*;
pub use keys::*;
pub use nonce::*;
pub use cipher::*;
pub use symmetric::*;
pub use patterns::*;
pub use payload::*;
pub use nametag::*;
pub use session::*;
pub use qr::*;
pub use transport::*;
pub use pairing::*;
pub use codec::*;
