//! Output messages and the broadcast bus that carries them.
//!
//! ## Contents
//! - [`MessageType`], [`Message`] severity and payload of a user-visible line
//! - [`OutputLogger`] boundary every controller writes output through
//! - [`OutputBus`] thin wrapper over `tokio::sync::broadcast` implementing it

mod bus;
mod message;

pub use bus::{OutputBus, OutputLogger};
pub use message::{Message, MessageType};
