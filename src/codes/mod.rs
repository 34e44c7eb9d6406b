//! # Codes and their execution.
//!
//! This module provides the code-related types:
//! - [`Code`] - one firmware instruction plus origin metadata
//! - [`CodeExecutor`] - trait that starts executing a code
//! - [`ExecutorFn`] - function-based executor implementation
//! - [`ExecutorRef`] - shared reference to an executor (`Arc<dyn CodeExecutor>`)

mod code;
mod executor;
mod parse;

pub use code::{Code, CodeChannel, CodeFlags, CodeKind, CodeParameter};
pub use executor::{CodeExecutor, CodeFuture, ExecutorFn, ExecutorRef};
pub use parse::parse_line;
