//! Routes incoming messages to conversations that are waiting for a reply.
//!
//! Every message the gateway sees is offered here first. If a pending waiter
//! matches, the oldest one gets the message and nothing else sees it;
//! otherwise the message comes back to the caller and is treated as a fresh
//! candidate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::transport::{InboundMessage, ReplyMatcher};

struct Waiter {
    id: u64,
    matcher: ReplyMatcher,
    tx: oneshot::Sender<InboundMessage>,
}

#[derive(Default)]
pub struct ReplyRouter {
    waiters: Mutex<Vec<Waiter>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ReplyRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyRouter")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ReplyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `msg` to the oldest matching waiter.
    ///
    /// Returns the message back when nobody consumed it.
    pub fn offer(&self, msg: InboundMessage) -> Option<InboundMessage> {
        let mut waiters = self.waiters.lock();
        let mut msg = msg;
        loop {
            let Some(pos) = waiters.iter().position(|w| w.matcher.matches(&msg)) else {
                return Some(msg);
            };
            let waiter = waiters.remove(pos);
            match waiter.tx.send(msg) {
                Ok(()) => {
                    trace!(waiter = waiter.id, "Reply delivered to waiting conversation");
                    return None;
                }
                // Waiting task was dropped before deregistering
                Err(returned) => msg = returned,
            }
        }
    }

    /// Register a waiter and block until a matching message arrives or `timeout` elapses.
    pub async fn wait(&self, matcher: ReplyMatcher, timeout: Duration) -> Option<InboundMessage> {
        let (tx, mut rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.waiters.lock().push(Waiter { id, matcher, tx });

        if let Ok(Ok(msg)) = tokio::time::timeout(timeout, &mut rx).await {
            return Some(msg);
        }
        self.settle(id, rx)
    }

    /// Deregister a waiter that stopped waiting.
    ///
    /// A reply handed over before the waiter left the list is still sitting in
    /// the channel and is returned instead of being dropped.
    fn settle(&self, id: u64, mut rx: oneshot::Receiver<InboundMessage>) -> Option<InboundMessage> {
        self.waiters.lock().retain(|w| w.id != id);
        rx.try_recv().ok()
    }

    /// Number of conversations currently waiting.
    pub fn pending(&self) -> usize {
        self.waiters.lock().len()
    }
}
