//! Runtime core: macro controllers and their shared services.
//!
//! The public API from this module is [`MacroFile`], the controller of one
//! running macro, and [`MacroRuntime`], the services every controller shares.
//!
//! Internal modules:
//! - [`macro_file`]: construction, queries, locks, abort/finish/dispose;
//! - [`pipeline`]: the run-loop (look-ahead fill and ordered drain);
//! - [`runner`]: awaits one started code and reports its outcome;
//! - [`bootstrap`]: synthetic codes sent before the configuration file;
//! - [`completion`]: one-shot finish signal with many waiters;
//! - [`runtime`] / [`builder`]: shared services and how to build them.

mod bootstrap;
mod builder;
mod completion;
mod config;
mod macro_file;
mod pipeline;
mod runner;
mod runtime;

pub use builder::MacroRuntimeBuilder;
pub use completion::{FinishFuture, FinishOutcome};
pub use config::Config;
pub use macro_file::MacroFile;
pub use runtime::MacroRuntime;
