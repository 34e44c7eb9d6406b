//! # codevisor
//!
//! **Codevisor** executes macro files for a machine-control server that drives
//! CNC / 3D-printer firmware.
//!
//! A macro is a file of G/M/T-codes. Each running macro is owned by a
//! [`MacroFile`] controller that reads codes ahead of execution, starts them
//! strictly in read order, awaits them strictly in start order, and can be
//! aborted, awaited and disposed from any task.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Channel HTTP │   │ Channel File │   │ Channel Sbc  │
//!     │ (owner)      │   │ (owner)      │   │ (owner)      │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  MacroFile   │   │  MacroFile   │   │  MacroFile   │
//!     │  (run-loop)  │   │  (run-loop)  │   │ (config.g)   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ reads            │ reads            │ M550 / M905, then reads
//!      ▼                  ▼                  ▼
//!   CodeSource         CodeSource         CodeSource
//!      │                  │                  │
//!      └────────── codes (stamped) ──────────┘
//!                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  MacroRuntime (shared services)                                   │
//! │  - Config        (look-ahead depth, startup file names, hostname) │
//! │  - CodeExecutor  (starts each code, resolves to a Message)        │
//! │  - OutputLogger  (user-visible lines; OutputBus by default)       │
//! │  - SourceOpener  (FileOpener by default)                          │
//! │  - shutdown token ──► child scope per MacroFile                   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! MacroFile::new() ──► open source ──► tokio::spawn(run())
//!
//! loop while !shutdown {
//!   ├─► fill:  read ahead up to Config::buffered_macro_codes, start each code
//!   ├─► drain: await the oldest started code, report failures
//!   └─► nothing left ─► exit
//! }
//!
//! On exit: is_executing = false, wait_for_finish() resolves, dispose()
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types / traits                         |
//! |-----------------|----------------------------------------------------------|--------------------------------------------|
//! | **Controller**  | Run, abort, await and dispose one macro.                 | [`MacroFile`], [`FinishOutcome`]           |
//! | **Runtime**     | Services shared by all controllers.                      | [`MacroRuntime`], [`Config`]               |
//! | **Codes**       | Code model and how codes are executed.                   | [`Code`], [`CodeExecutor`], [`ExecutorFn`] |
//! | **Sources**     | Where codes are read from.                               | [`CodeSource`], [`CodeFile`]               |
//! | **Output**      | User-visible lines.                                      | [`OutputLogger`], [`OutputBus`]            |
//! | **Errors**      | Typed errors for opening, reading and executing.         | [`OpenError`], [`ReadError`], [`CodeError`]|
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use codevisor::{
//!     Code, CodeChannel, CodeError, Config, ExecutorFn, MacroFile, MacroRuntime, Message,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = ExecutorFn::arc(|code: Arc<Code>| async move {
//!         println!("executing {code}");
//!         Ok::<_, CodeError>(Message::success(""))
//!     });
//!     let runtime = MacroRuntime::builder(Config::default(), executor).build();
//!
//!     let mf = MacroFile::new(&runtime, "homeall.g", "/opt/dsf/sd/sys/homeall.g", CodeChannel::Http, false, 0);
//!     if mf.file_opened() {
//!         mf.wait_for_finish().await;
//!     }
//! }
//! ```
mod codes;
mod core;
mod error;
mod events;
mod source;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use codes::{
    Code, CodeChannel, CodeExecutor, CodeFlags, CodeFuture, CodeKind, CodeParameter, ExecutorFn,
    ExecutorRef, parse_line,
};
pub use core::{
    Config, FinishFuture, FinishOutcome, MacroFile, MacroRuntime, MacroRuntimeBuilder,
};
pub use error::{CodeError, MacroError, OpenError, ReadError};
pub use events::{Message, MessageType, OutputBus, OutputLogger};
pub use source::{CodeFile, CodeSource, FileOpener, SharedSource, SourceOpener};
