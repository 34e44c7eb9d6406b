//! # Bootstrap codes for the startup configuration file.
//!
//! Before the first line of the configuration file is read, the controller
//! sends two synthetic codes:
//!
//! ```text
//! SendHostname ──► M550 P"<hostname>"              ──► SendDateTime
//! SendDateTime ──► M905 P"yyyy-MM-dd" S"HH:mm:ss"  ──► Done
//! Done         ──► (codes come from the source only)
//! ```
//!
//! Both are flagged `internally_processed` so the executor does not feed the
//! host's own hostname and clock back into itself.

use chrono::{DateTime, Local};

use crate::codes::{Code, CodeChannel, CodeParameter};

/// Progress through the bootstrap codes. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigStep {
    SendHostname,
    SendDateTime,
    Done,
}

impl ConfigStep {
    /// Starting step: bootstrap codes only for the configuration file.
    pub(crate) fn initial(is_config: bool) -> Self {
        if is_config {
            ConfigStep::SendHostname
        } else {
            ConfigStep::Done
        }
    }

    /// Returns the synthetic code for the current step and advances, or
    /// `None` once [`ConfigStep::Done`] is reached.
    pub(crate) fn advance(&mut self, channel: CodeChannel, hostname: &str) -> Option<Code> {
        match self {
            ConfigStep::SendHostname => {
                *self = ConfigStep::SendDateTime;
                Some(hostname_code(channel, hostname))
            }
            ConfigStep::SendDateTime => {
                *self = ConfigStep::Done;
                Some(datetime_code(channel, Local::now()))
            }
            ConfigStep::Done => None,
        }
    }
}

/// `M550 P"<hostname>"`
fn hostname_code(channel: CodeChannel, hostname: &str) -> Code {
    let mut code = Code::mcode(channel, 550).with_parameter(CodeParameter::string('P', hostname));
    code.internally_processed = true;
    code
}

/// `M905 P"<date>" S"<time>"`
fn datetime_code(channel: CodeChannel, now: DateTime<Local>) -> Code {
    let mut code = Code::mcode(channel, 905)
        .with_parameter(CodeParameter::string('P', now.format("%Y-%m-%d").to_string()))
        .with_parameter(CodeParameter::string('S', now.format("%H:%M:%S").to_string()));
    code.internally_processed = true;
    code
}
