//! # Code model.
//!
//! A [`Code`] is one instruction for the firmware. Codes are built by a
//! [`CodeSource`](crate::CodeSource) (or synthesized by a controller), stamped
//! with their origin by the owning [`MacroFile`], then shared as `Arc<Code>`
//! with the [`CodeExecutor`](crate::CodeExecutor). After stamping they are
//! never mutated again.

use std::fmt;
use std::sync::Weak;

use bitflags::bitflags;
use tokio_util::sync::CancellationToken;

use crate::core::MacroFile;

/// Logical command channel of the controlled machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeChannel {
    Http,
    Telnet,
    File,
    Usb,
    Aux,
    Trigger,
    Queue,
    Lcd,
    Sbc,
    /// Background channel that probes optional macros routinely.
    Daemon,
    Aux2,
    Autopause,
}

impl fmt::Display for CodeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodeChannel::Http => "HTTP",
            CodeChannel::Telnet => "Telnet",
            CodeChannel::File => "File",
            CodeChannel::Usb => "USB",
            CodeChannel::Aux => "Aux",
            CodeChannel::Trigger => "Trigger",
            CodeChannel::Queue => "Queue",
            CodeChannel::Lcd => "LCD",
            CodeChannel::Sbc => "SBC",
            CodeChannel::Daemon => "Daemon",
            CodeChannel::Aux2 => "Aux2",
            CodeChannel::Autopause => "Autopause",
        };
        f.write_str(name)
    }
}

/// Letter class of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    GCode,
    MCode,
    TCode,
    /// Comment-only line.
    Comment,
}

impl CodeKind {
    /// Leading letter (`None` for comments).
    pub fn letter(&self) -> Option<char> {
        match self {
            CodeKind::GCode => Some('G'),
            CodeKind::MCode => Some('M'),
            CodeKind::TCode => Some('T'),
            CodeKind::Comment => None,
        }
    }
}

bitflags! {
    /// Origin markers attached to a code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CodeFlags: u8 {
        /// Read from (or synthesized by) a macro file.
        const FROM_MACRO           = 0b0000_0001;
        /// Belongs to the startup configuration file.
        const FROM_CONFIG          = 0b0000_0010;
        /// Belongs to the configuration override file.
        const FROM_CONFIG_OVERRIDE = 0b0000_0100;
        /// Belongs to a macro started from within another code.
        const NESTED_MACRO         = 0b0000_1000;
    }
}

/// One letter parameter, e.g. `P"host"` or `S0.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeParameter {
    /// Upper-case parameter letter.
    pub letter: char,
    /// Raw value (unquoted for strings, may be empty).
    pub value: String,
    /// Whether the value was given as a quoted string.
    pub is_string: bool,
}

impl CodeParameter {
    /// Creates a plain (unquoted) parameter.
    pub fn new(letter: char, value: impl Into<String>) -> Self {
        Self {
            letter: letter.to_ascii_uppercase(),
            value: value.into(),
            is_string: false,
        }
    }

    /// Creates a quoted string parameter.
    pub fn string(letter: char, value: impl Into<String>) -> Self {
        Self {
            letter: letter.to_ascii_uppercase(),
            value: value.into(),
            is_string: true,
        }
    }

    /// Parses the value, e.g. `param.parse::<i32>()`.
    pub fn parse<T: std::str::FromStr>(&self) -> Option<T> {
        self.value.parse().ok()
    }
}

impl fmt::Display for CodeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_string {
            write!(f, "{}\"{}\"", self.letter, self.value.replace('"', "\"\""))
        } else {
            write!(f, "{}{}", self.letter, self.value)
        }
    }
}

/// A single firmware instruction plus the execution metadata the controller stamps on it.
#[derive(Debug, Clone)]
pub struct Code {
    /// Channel the code runs on.
    pub channel: CodeChannel,
    /// Letter class.
    pub kind: CodeKind,
    /// Major number (`28` in `G28`).
    pub major: Option<i32>,
    /// Minor number (`6` in `G54.6`).
    pub minor: Option<i8>,
    /// Parameters in source order.
    pub parameters: Vec<CodeParameter>,
    /// Trailing comment without the leading `;`.
    pub comment: Option<String>,
    /// Origin markers.
    pub flags: CodeFlags,
    /// Set on codes the host synthesized for itself; the executor must not
    /// re-validate them against host state.
    pub internally_processed: bool,
    /// Byte offset in the source file (`None` for macro codes).
    pub file_position: Option<u64>,
    /// IPC connection that (indirectly) requested this code (0 = none).
    pub source_connection: u32,
    /// Whether the execution result is written to the output log.
    pub log_output: bool,
    /// Cancellation scope the executor must observe.
    pub cancellation: CancellationToken,
    /// Macro this code belongs to. Never keeps the macro alive.
    pub macro_file: Option<Weak<MacroFile>>,
}

impl Code {
    /// Creates an empty code of the given kind.
    pub fn new(channel: CodeChannel, kind: CodeKind, major: Option<i32>) -> Self {
        Self {
            channel,
            kind,
            major,
            minor: None,
            parameters: Vec::new(),
            comment: None,
            flags: CodeFlags::empty(),
            internally_processed: false,
            file_position: None,
            source_connection: 0,
            log_output: false,
            cancellation: CancellationToken::new(),
            macro_file: None,
        }
    }

    /// Shorthand for an M-code.
    pub fn mcode(channel: CodeChannel, major: i32) -> Self {
        Self::new(channel, CodeKind::MCode, Some(major))
    }

    /// Appends a parameter.
    #[inline]
    pub fn with_parameter(mut self, parameter: CodeParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Returns the first parameter with the given letter.
    pub fn parameter(&self, letter: char) -> Option<&CodeParameter> {
        let letter = letter.to_ascii_uppercase();
        self.parameters.iter().find(|p| p.letter == letter)
    }

    /// Returns the macro this code was read from, if it is still alive.
    pub fn owning_macro(&self) -> Option<std::sync::Arc<MacroFile>> {
        self.macro_file.as_ref().and_then(Weak::upgrade)
    }

    /// Renders only letter and numbers, e.g. `G54.6` or `M550`.
    pub fn to_short_string(&self) -> String {
        let Some(letter) = self.kind.letter() else {
            return "(comment)".to_string();
        };
        let mut out = String::with_capacity(8);
        out.push(letter);
        if let Some(major) = self.major {
            out.push_str(&major.to_string());
            if let Some(minor) = self.minor {
                out.push('.');
                out.push_str(&minor.to_string());
            }
        }
        out
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = if self.kind == CodeKind::Comment {
            String::new()
        } else {
            self.to_short_string()
        };
        for p in &self.parameters {
            text.push(' ');
            text.push_str(&p.to_string());
        }
        if let Some(comment) = &self.comment {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push(';');
            text.push_str(comment);
        }
        f.write_str(&text)
    }
}
