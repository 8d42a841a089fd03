//! Correlation-id reply routing
//!
//! A single consumer per reply queue demultiplexes incoming replies into
//! the futures waiting on them. Orphan replies (deadline already expired,
//! or a duplicate) are dropped with a warning.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct ReplyRouter {
    pending: Mutex<HashMap<String, oneshot::Sender<Vec<u8>>>>,
}

impl ReplyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a correlation id before publishing.
    pub fn register(&self, correlation_id: &str) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert(correlation_id.to_string(), tx);
        rx
    }

    /// Deliver a reply to whoever is waiting on it.
    pub fn resolve(&self, correlation_id: &str, payload: Vec<u8>) {
        let waiter = self.pending.lock().unwrap().remove(correlation_id);
        match waiter {
            Some(tx) => {
                if tx.send(payload).is_err() {
                    tracing::warn!(correlation_id, "reply receiver dropped before delivery");
                }
            }
            None => {
                tracing::warn!(correlation_id, "dropping orphan reply");
            }
        }
    }

    /// Abandon a pending request (publisher-side deadline expired).
    pub fn forget(&self, correlation_id: &str) {
        self.pending.lock().unwrap().remove(correlation_id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_to_waiter() {
        let router = ReplyRouter::new();
        let rx = router.register("abc");
        router.resolve("abc", b"payload".to_vec());
        assert_eq!(rx.await.unwrap(), b"payload");
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_orphan_reply_dropped() {
        let router = ReplyRouter::new();
        router.resolve("never-registered", b"late".to_vec());
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_forget_makes_reply_orphan() {
        let router = ReplyRouter::new();
        let rx = router.register("abc");
        router.forget("abc");
        router.resolve("abc", b"late".to_vec());
        assert!(rx.await.is_err(), "sender gone after forget");
    }

    #[tokio::test]
    async fn test_replies_race_independently() {
        let router = ReplyRouter::new();
        let rx_a = router.register("a");
        let rx_b = router.register("b");

        router.resolve("b", b"second".to_vec());
        router.resolve("a", b"first".to_vec());

        assert_eq!(rx_a.await.unwrap(), b"first");
        assert_eq!(rx_b.await.unwrap(), b"second");
    }
}
