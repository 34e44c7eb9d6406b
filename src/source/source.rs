//! # Code source boundary.
//!
//! A [`CodeSource`] is a sequential reader over a command stream. A controller
//! owns exactly one source and only touches it through the exclusive-access
//! region of a [`SharedSource`]; closing always happens inside that region so
//! a close can never race a read.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::codes::{Code, CodeChannel};
use crate::error::{OpenError, ReadError};

/// Source guarded by its exclusive-access region.
///
/// `lock().await` is the suspending acquisition, `blocking_lock()` the blocking one.
pub type SharedSource = Arc<Mutex<Box<dyn CodeSource>>>;

/// # Sequential code reader.
#[async_trait]
pub trait CodeSource: Send + 'static {
    /// Reads the next code.
    ///
    /// Returns `Ok(None)` at end of stream and after [`close`](CodeSource::close).
    async fn read_code(&mut self) -> Result<Option<Code>, ReadError>;

    /// Releases the underlying stream. Safe to call any number of times.
    fn close(&mut self);

    /// Whether [`close`](CodeSource::close) has been called.
    fn is_closed(&self) -> bool;
}

/// # Opens code sources for physical paths.
pub trait SourceOpener: Send + Sync + 'static {
    /// Opens `path` for reading codes on `channel`.
    ///
    /// A missing file must be reported as [`OpenError::NotFound`].
    fn open(&self, path: &Path, channel: CodeChannel) -> Result<Box<dyn CodeSource>, OpenError>;
}

/// Wraps a source into its exclusive-access region.
pub fn shared(source: Box<dyn CodeSource>) -> SharedSource {
    Arc::new(Mutex::new(source))
}
