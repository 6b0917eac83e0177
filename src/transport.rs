//! Transport and confirmation collaborator contracts.
//!
//! The pairing driver speaks to the outside world through these traits:
//! a publish/subscribe message transport addressed by content topic,
//! and a yes/no confirmation surface for the authorization code.
//! Implementations can wrap any broker; [`InMemoryTransport`] serves
//! tests and single-process embedding.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::types::{Result, WakuPairError};

/// Capacity of a subscriber's delivery queue.
const SUBSCRIPTION_BUFFER: usize = 64;

/// A publish/subscribe message transport.
///
/// Delivery may drop, duplicate and reorder; the protocol layers above
/// are built to tolerate that. Subscriptions yield raw payload bytes in
/// arrival order; dropping the receiver unsubscribes.
#[async_trait::async_trait]
pub trait PairingTransport: Send + Sync {
    /// Publish a payload on a content topic.
    async fn publish(&self, content_topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Subscribe to a content topic.
    async fn subscribe(&self, content_topic: &str) -> Result<mpsc::Receiver<Vec<u8>>>;
}

/// The programmatic yes/no contract for authcode confirmation.
///
/// The pairing driver displays nothing itself; it hands the five-digit
/// code to this collaborator and acts on the answer.
#[async_trait::async_trait]
pub trait AuthcodeValidator: Send + Sync {
    async fn validate_authcode(&self, authcode: &str) -> bool;
}

/// A validator with a predetermined answer.
pub struct PresetConfirmation {
    accept: bool,
}

impl PresetConfirmation {
    pub fn new(accept: bool) -> Self {
        Self { accept }
    }
}

#[async_trait::async_trait]
impl AuthcodeValidator for PresetConfirmation {
    async fn validate_authcode(&self, _authcode: &str) -> bool {
        self.accept
    }
}

/// An in-process broker delivering every publish to every subscriber
/// of the topic, including the publisher's own subscriptions.
#[derive(Default)]
pub struct InMemoryTransport {
    topics: Arc<RwLock<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PairingTransport for InMemoryTransport {
    async fn publish(&self, content_topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut topics = self.topics.write().await;
        if let Some(subscribers) = topics.get_mut(content_topic) {
            subscribers.retain(|subscriber| !subscriber.is_closed());
            for subscriber in subscribers.iter() {
                subscriber
                    .send(payload.clone())
                    .await
                    .map_err(|_| WakuPairError::Transport("subscriber went away".to_string()))?;
            }
        }
        Ok(())
    }

    async fn subscribe(&self, content_topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut topics = self.topics.write().await;
        topics
            .entry(content_topic.to_string())
            .or_default()
            .push(sender);
        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let transport = InMemoryTransport::new();
        let mut first = transport.subscribe("/app/1/0/proto").await.unwrap();
        let mut second = transport.subscribe("/app/1/0/proto").await.unwrap();

        transport
            .publish("/app/1/0/proto", b"hello".to_vec())
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap(), b"hello");
        assert_eq!(second.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let transport = InMemoryTransport::new();
        let mut a = transport.subscribe("/app/1/0/proto").await.unwrap();
        let mut b = transport.subscribe("/app/1/1/proto").await.unwrap();

        transport
            .publish("/app/1/0/proto", b"for a".to_vec())
            .await
            .unwrap();
        transport
            .publish("/app/1/1/proto", b"for b".to_vec())
            .await
            .unwrap();

        assert_eq!(a.recv().await.unwrap(), b"for a");
        assert_eq!(b.recv().await.unwrap(), b"for b");
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let transport = InMemoryTransport::new();
        let receiver = transport.subscribe("/app/1/0/proto").await.unwrap();
        drop(receiver);

        // Publishing after the receiver is gone is not an error.
        transport
            .publish("/app/1/0/proto", b"into the void".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_preset_confirmation() {
        assert!(PresetConfirmation::new(true).validate_authcode("12345").await);
        assert!(!PresetConfirmation::new(false).validate_authcode("12345").await);
    }
}
