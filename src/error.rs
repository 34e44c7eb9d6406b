//! Error types used by macro controllers, code sources and code executors.
//!
//! This module defines four enums:
//!
//! - [`OpenError`]: a code source could not be opened.
//! - [`ReadError`]: reading the next code from a source failed.
//! - [`CodeError`]: executing a single code failed.
//! - [`MacroError`]: a controller-level wait was refused.
//!
//! Each type provides `as_label` (stable snake_case label for logs) and
//! `as_message` helpers. None of them ever reaches the completion signal of a
//! macro: failures below the controller are turned into output lines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced while opening a code source.
///
/// [`OpenError::NotFound`] is expected for optional macros and is not logged
/// as an error by the controller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OpenError {
    /// The physical file does not exist.
    #[error("file {path:?} not found")]
    NotFound {
        /// Path that was probed.
        path: PathBuf,
    },

    /// Any other failure (permissions, I/O fault, ...).
    #[error("failed to open {path:?}: {source}")]
    Io {
        /// Path that could not be opened.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },
}

impl OpenError {
    /// Classifies an I/O error raised while opening `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            OpenError::NotFound { path }
        } else {
            OpenError::Io { path, source }
        }
    }

    /// Returns `true` for [`OpenError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, OpenError::NotFound { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            OpenError::NotFound { .. } => "open_not_found",
            OpenError::Io { .. } => "open_io",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OpenError::NotFound { path } => format!("not found: {}", path.display()),
            OpenError::Io { path, source } => format!("io: {} ({source})", path.display()),
        }
    }
}

/// # Errors produced while reading the next code.
///
/// `Canceled` is raised when the controller's cancellation scope fires during a
/// read. Everything else makes the controller close its source.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReadError {
    /// The read was interrupted by cancellation.
    #[error("read cancelled")]
    Canceled,

    /// The underlying stream failed.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// A line could not be decoded into a code.
    #[error("{message} in line {line}")]
    Parse {
        /// 1-based line number.
        line: u64,
        /// What went wrong.
        message: String,
    },
}

impl ReadError {
    /// Returns `true` for [`ReadError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, ReadError::Canceled)
    }

    /// Failure reason shown to the user.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use codevisor::ReadError;
    ///
    /// assert_eq!(ReadError::Canceled.as_label(), "read_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReadError::Canceled => "read_canceled",
            ReadError::Io(_) => "read_io",
            ReadError::Parse { .. } => "read_parse",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ReadError::Canceled => "read cancelled".to_string(),
            ReadError::Io(e) => format!("io: {e}"),
            ReadError::Parse { line, message } => format!("parse: {message} (line {line})"),
        }
    }
}

/// # Errors produced by code execution.
///
/// Cancellation is routine (a pausable macro being interrupted) and is
/// swallowed by the controller. Parse and execution failures are reported.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// Execution was interrupted by cancellation.
    #[error("code cancelled")]
    Canceled,

    /// The code turned out to be malformed when it was processed.
    #[error("{message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// Execution failed.
    #[error("{message}")]
    Fail {
        /// Short failure kind, printed as `[kind]`.
        kind: String,
        /// The underlying error message.
        message: String,
    },
}

impl CodeError {
    /// Creates a [`CodeError::Fail`].
    pub fn fail(kind: impl Into<String>, message: impl Into<String>) -> Self {
        CodeError::Fail {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a [`CodeError::Parse`].
    pub fn parse(message: impl Into<String>) -> Self {
        CodeError::Parse {
            message: message.into(),
        }
    }

    /// Returns `true` for [`CodeError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, CodeError::Canceled)
    }

    /// Short failure kind used in output lines.
    pub fn kind(&self) -> &str {
        match self {
            CodeError::Canceled => "Canceled",
            CodeError::Parse { .. } => "Parse",
            CodeError::Fail { kind, .. } => kind,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use codevisor::CodeError;
    ///
    /// let err = CodeError::fail("IoError", "disk gone");
    /// assert_eq!(err.as_label(), "code_failed");
    /// assert_eq!(err.kind(), "IoError");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CodeError::Canceled => "code_canceled",
            CodeError::Parse { .. } => "code_parse",
            CodeError::Fail { .. } => "code_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            CodeError::Canceled => "code cancelled".to_string(),
            CodeError::Parse { message } => format!("parse: {message}"),
            CodeError::Fail { kind, message } => format!("[{kind}] {message}"),
        }
    }
}

/// # Errors produced by controller waits.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroError {
    /// The cancellation scope observed by the wait fired first.
    #[error("macro cancelled")]
    Canceled,
}

impl MacroError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            MacroError::Canceled => "macro_canceled",
        }
    }
}
