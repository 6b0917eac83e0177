//! Static handshake pattern tables.
//!
//! A pattern is a list of pre-messages (public keys both parties know
//! before the first byte is sent) followed by a list of messages, each
//! a direction plus an ordered token stream. The interpreter in
//! `handshake` dispatches on these tables; nothing here has behavior.

/// A single handshake token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Ephemeral public key.
    E,
    /// Static public key.
    S,
    /// DH(ephemeral, ephemeral).
    Ee,
    /// DH(initiator ephemeral, responder static).
    Es,
    /// DH(initiator static, responder ephemeral).
    Se,
    /// DH(static, static).
    Ss,
    /// Pre-shared key.
    Psk,
}

/// Message direction: `Right` is initiator to responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Right,
    Left,
}

/// A pre-message: keys known out-of-band, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreMessagePattern {
    pub direction: Direction,
    pub tokens: &'static [Token],
}

/// One handshake message: a direction and its token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePattern {
    pub direction: Direction,
    pub tokens: &'static [Token],
}

/// A complete handshake pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePattern {
    pub name: &'static str,
    pub pre_messages: &'static [PreMessagePattern],
    pub messages: &'static [MessagePattern],
}

/// Wire protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolId {
    None = 0,
    K1k1 = 10,
    Xk1 = 11,
    Xx = 12,
    Xxpsk0 = 13,
    WakuPairing = 14,
    /// Reserved for post-handshake traffic; shipped messages carry
    /// [`ProtocolId::None`].
    ChaChaPoly = 30,
}

impl HandshakePattern {
    /// K1K1: both static keys known ahead of time.
    ///
    /// ```text
    ///   -> s
    ///   <- s
    ///   ...
    ///   -> e
    ///   <- e, ee, es
    ///   -> se
    /// ```
    pub fn k1k1() -> Self {
        Self {
            name: "Noise_K1K1_25519_ChaChaPoly_SHA256",
            pre_messages: &[
                PreMessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::S],
                },
                PreMessagePattern {
                    direction: Direction::Left,
                    tokens: &[Token::S],
                },
            ],
            messages: &[
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::E],
                },
                MessagePattern {
                    direction: Direction::Left,
                    tokens: &[Token::E, Token::Ee, Token::Es],
                },
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::Se],
                },
            ],
        }
    }

    /// XK1: the responder's static key known to the initiator.
    ///
    /// ```text
    ///   <- s
    ///   ...
    ///   -> e
    ///   <- e, ee, es
    ///   -> s, se
    /// ```
    pub fn xk1() -> Self {
        Self {
            name: "Noise_XK1_25519_ChaChaPoly_SHA256",
            pre_messages: &[PreMessagePattern {
                direction: Direction::Left,
                tokens: &[Token::S],
            }],
            messages: &[
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::E],
                },
                MessagePattern {
                    direction: Direction::Left,
                    tokens: &[Token::E, Token::Ee, Token::Es],
                },
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::S, Token::Se],
                },
            ],
        }
    }

    /// XX: mutual authentication with no prior knowledge.
    ///
    /// ```text
    ///   -> e
    ///   <- e, ee, s, es
    ///   -> s, se
    /// ```
    pub fn xx() -> Self {
        Self {
            name: "Noise_XX_25519_ChaChaPoly_SHA256",
            pre_messages: &[],
            messages: &[
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::E],
                },
                MessagePattern {
                    direction: Direction::Left,
                    tokens: &[Token::E, Token::Ee, Token::S, Token::Es],
                },
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::S, Token::Se],
                },
            ],
        }
    }

    /// XX with a pre-shared key mixed in before the first ephemeral.
    ///
    /// ```text
    ///   -> psk, e
    ///   <- e, ee, s, es
    ///   -> s, se
    /// ```
    pub fn xxpsk0() -> Self {
        Self {
            name: "Noise_XXpsk0_25519_ChaChaPoly_SHA256",
            pre_messages: &[],
            messages: &[
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::Psk, Token::E],
                },
                MessagePattern {
                    direction: Direction::Left,
                    tokens: &[Token::E, Token::Ee, Token::S, Token::Es],
                },
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::S, Token::Se],
                },
            ],
        }
    }

    /// Device pairing: the responder's ephemeral key is distributed
    /// out-of-band, static keys travel under commitment.
    ///
    /// ```text
    ///   <- e
    ///   ...
    ///   -> e, ee
    ///   <- s, es
    ///   -> s, se, ss
    /// ```
    pub fn waku_pairing() -> Self {
        Self {
            name: "Noise_WakuPairing_25519_ChaChaPoly_SHA256",
            pre_messages: &[PreMessagePattern {
                direction: Direction::Left,
                tokens: &[Token::E],
            }],
            messages: &[
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::E, Token::Ee],
                },
                MessagePattern {
                    direction: Direction::Left,
                    tokens: &[Token::S, Token::Es],
                },
                MessagePattern {
                    direction: Direction::Right,
                    tokens: &[Token::S, Token::Se, Token::Ss],
                },
            ],
        }
    }

    /// Whether the pattern mixes a pre-shared key into its key schedule.
    pub fn is_psk(&self) -> bool {
        self.name.contains("psk")
    }

    /// The wire protocol identifier for this pattern.
    pub fn protocol_id(&self) -> Option<ProtocolId> {
        match self.name {
            "Noise_K1K1_25519_ChaChaPoly_SHA256" => Some(ProtocolId::K1k1),
            "Noise_XK1_25519_ChaChaPoly_SHA256" => Some(ProtocolId::Xk1),
            "Noise_XX_25519_ChaChaPoly_SHA256" => Some(ProtocolId::Xx),
            "Noise_XXpsk0_25519_ChaChaPoly_SHA256" => Some(ProtocolId::Xxpsk0),
            "Noise_WakuPairing_25519_ChaChaPoly_SHA256" => Some(ProtocolId::WakuPairing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_ids() {
        assert_eq!(HandshakePattern::k1k1().protocol_id(), Some(ProtocolId::K1k1));
        assert_eq!(HandshakePattern::xk1().protocol_id(), Some(ProtocolId::Xk1));
        assert_eq!(HandshakePattern::xx().protocol_id(), Some(ProtocolId::Xx));
        assert_eq!(
            HandshakePattern::xxpsk0().protocol_id(),
            Some(ProtocolId::Xxpsk0)
        );
        assert_eq!(
            HandshakePattern::waku_pairing().protocol_id(),
            Some(ProtocolId::WakuPairing)
        );
        assert_eq!(ProtocolId::K1k1 as u8, 10);
        assert_eq!(ProtocolId::WakuPairing as u8, 14);
        assert_eq!(ProtocolId::ChaChaPoly as u8, 30);
    }

    #[test]
    fn test_psk_detection() {
        assert!(HandshakePattern::xxpsk0().is_psk());
        assert!(!HandshakePattern::xx().is_psk());
        assert!(!HandshakePattern::waku_pairing().is_psk());
    }

    #[test]
    fn test_message_counts() {
        for pattern in [
            HandshakePattern::k1k1(),
            HandshakePattern::xk1(),
            HandshakePattern::xx(),
            HandshakePattern::xxpsk0(),
            HandshakePattern::waku_pairing(),
        ] {
            assert_eq!(pattern.messages.len(), 3);
            // Every message alternates direction starting from the initiator.
            assert_eq!(pattern.messages[0].direction, Direction::Right);
            assert_eq!(pattern.messages[1].direction, Direction::Left);
            assert_eq!(pattern.messages[2].direction, Direction::Right);
        }
    }
}
