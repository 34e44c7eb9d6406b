//! # Code sources.
//!
//! - [`CodeSource`] - sequential reader boundary
//! - [`SourceOpener`] - opens a source for a physical path
//! - [`CodeFile`] / [`FileOpener`] - file-backed implementation

mod file;
#[allow(clippy::module_inception)]
mod source;

pub use file::{CodeFile, FileOpener};
pub use source::{CodeSource, SharedSource, SourceOpener, shared};
