//! # User-visible output messages.
//!
//! The [`MessageType`] enum classifies output lines; the [`Message`] struct
//! carries the text plus a timestamp and a global sequence number.
//!
//! ## Ordering guarantees
//! Each message has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when messages are delivered out of order.
//!
//! ## Example
//! ```rust
//! use codevisor::{Message, MessageType};
//!
//! let msg = Message::error("Failed to execute G28 in homeall.g: [Io] gone");
//! assert_eq!(msg.kind, MessageType::Error);
//! assert!(msg.content.contains("homeall.g"));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for message ordering.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Severity of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Success,
    Warning,
    Error,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageType::Success => "success",
            MessageType::Warning => "warning",
            MessageType::Error => "error",
        })
    }
}

/// Output line produced by a code or by a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Severity.
    pub kind: MessageType,
    /// Text shown to the user.
    pub content: Arc<str>,
}

impl Message {
    /// Creates a message with current timestamp and next sequence number.
    pub fn new(kind: MessageType, content: impl Into<Arc<str>>) -> Self {
        Self {
            seq: MESSAGE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            content: content.into(),
        }
    }

    #[inline]
    pub fn success(content: impl Into<Arc<str>>) -> Self {
        Self::new(MessageType::Success, content)
    }

    #[inline]
    pub fn warning(content: impl Into<Arc<str>>) -> Self {
        Self::new(MessageType::Warning, content)
    }

    #[inline]
    pub fn error(content: impl Into<Arc<str>>) -> Self {
        Self::new(MessageType::Error, content)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, MessageType::Error)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageType::Success => f.write_str(&self.content),
            MessageType::Warning => write!(f, "Warning: {}", self.content),
            MessageType::Error => write!(f, "Error: {}", self.content),
        }
    }
}
