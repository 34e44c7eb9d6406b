//! # Output bus and the output-logging boundary.
//!
//! [`OutputLogger`] is what controllers call for every user-visible line.
//! [`OutputBus`] is the bundled implementation: a thin wrapper around
//! [`tokio::sync::broadcast`] that fans messages out to any number of
//! consumers (console, IPC clients, tests).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Consumers (many):
//!   MacroFile 1 ──┐                ┌──► console writer
//!   MacroFile 2 ──┼──► OutputBus ──┼──► IPC subscriber
//!   Executor    ──┘  (broadcast)   └──► ...
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent messages for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: messages are lost if there are no active receivers at send time.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::message::{Message, MessageType};

/// # Sink for user-visible output lines.
///
/// Independent of the process diagnostic log (`tracing`), which is
/// synchronous and fire-and-forget.
#[async_trait]
pub trait OutputLogger: Send + Sync + 'static {
    /// Writes one line of the given severity.
    async fn log_output(&self, kind: MessageType, content: &str);
}

/// Broadcast channel for output messages.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct OutputBus {
    tx: broadcast::Sender<Message>,
}

impl OutputBus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Message>(capacity);
        Self { tx }
    }

    /// Publishes a message to all active receivers.
    pub fn publish(&self, msg: Message) {
        let _ = self.tx.send(msg);
    }

    /// Creates a new receiver that will observe subsequent messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl OutputLogger for OutputBus {
    async fn log_output(&self, kind: MessageType, content: &str) {
        self.publish(Message::new(kind, content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receivers_see_messages_in_order() {
        let bus = OutputBus::new(8);
        let mut rx = bus.subscribe();

        bus.log_output(MessageType::Error, "first").await;
        bus.log_output(MessageType::Warning, "second").await;

        let a = rx.recv().await.expect("first message");
        let b = rx.recv().await.expect("second message");
        assert_eq!(&*a.content, "first");
        assert_eq!(b.kind, MessageType::Warning);
        assert!(a.seq < b.seq);
    }

    #[test]
    fn publish_without_receivers_is_dropped() {
        let bus = OutputBus::new(0);
        bus.publish(Message::success("nobody listens"));
    }
}
