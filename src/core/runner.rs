//! # Drain one pending code.
//!
//! Awaits the execution of the oldest code in the look-ahead queue and turns
//! its outcome into output lines and diagnostics.
//!
//! ## Outcome flow
//!
//! ```text
//! Success:
//!   execution → Ok(message) → (nothing, the executor reports its own output)
//!
//! Cancellation:
//!   execution → Err(Canceled) → debug only (a pausable macro was interrupted)
//!
//! Parse failure:
//!   execution → Err(Parse)    → output "<message> of <file>"
//!
//! Failure:
//!   execution → Err(Fail)     → output "Failed to execute <code> in <file>: [<kind>] <message>"
//!                             → warn
//! ```
//!
//! ## Rules
//! - At most **one** output line per drained code
//! - A panicking execution is reported like any other failure
//! - Executions are never killed: a cancelled code observes
//!   [`Code::cancellation`] and unwinds on its own, and drain waits for it

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use super::macro_file::MacroFile;
use crate::{
    codes::Code,
    error::CodeError,
    events::{Message, MessageType},
};

/// A code whose execution has been started but not yet awaited.
pub(crate) struct PendingCode {
    pub(crate) code: Arc<Code>,
    pub(crate) execution: JoinHandle<Result<Message, CodeError>>,
}

impl PendingCode {
    /// Starts executing `code` on the runtime's executor.
    ///
    /// The executor's synchronous part runs here, so calling this in read
    /// order initiates codes in read order.
    pub(crate) fn start(mf: &MacroFile, code: Code) -> Self {
        let code = Arc::new(code);
        let fut = mf.runtime.executor().execute(Arc::clone(&code));
        Self {
            code,
            execution: tokio::spawn(fut),
        }
    }
}

/// Awaits `pending` and reports its outcome for `mf`.
pub(crate) async fn drain(mf: &MacroFile, pending: PendingCode) {
    let PendingCode { code, execution } = pending;
    let res = execution.await.unwrap_or_else(join_failure);

    match res {
        Ok(_) => {}
        Err(CodeError::Canceled) => report_canceled(mf, &code),
        Err(CodeError::Parse { message }) => report_parse(mf, &message).await,
        Err(e) => report_failed(mf, &code, &e).await,
    }
}

/// Maps a failed join to a code error.
fn join_failure(err: JoinError) -> Result<Message, CodeError> {
    if err.is_cancelled() {
        Err(CodeError::Canceled)
    } else {
        Err(CodeError::fail("panic", err.to_string()))
    }
}

fn report_canceled(mf: &MacroFile, code: &Code) {
    debug!(
        "Cancelled {} in macro file {}",
        code.to_short_string(),
        mf.file_name()
    );
}

async fn report_parse(mf: &MacroFile, message: &str) {
    let line = format!("{} of {}", message, mf.display_name());
    debug!("{}", line);
    mf.runtime.output().log_output(MessageType::Error, &line).await;
}

async fn report_failed(mf: &MacroFile, code: &Code, err: &CodeError) {
    let line = format!(
        "Failed to execute {} in {}: {}",
        code.to_short_string(),
        mf.display_name(),
        err.as_message()
    );
    warn!(label = err.as_label(), "{}", line);
    mf.runtime.output().log_output(MessageType::Error, &line).await;
}
