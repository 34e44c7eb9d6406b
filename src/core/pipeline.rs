//! # Run-loop of a macro: look-ahead fill and ordered drain.
//!
//! ## Architecture
//! ```text
//! MacroFile::new() ──► tokio::spawn(run())
//!
//! loop while !shutdown {
//!   ├─► Filling:  while queue.len() < buffered_macro_codes
//!   │       ├─► read_next() ── Some(code) ─► start execution, push_back
//!   │       │               ── None       ─► stop filling
//!   │       │               ── Canceled   ─► lock, abort if not aborted
//!   │       │               └─ Err        ─► close source, output error line
//!   │       ▼
//!   ├─► Draining: pop_front ─► drain() ─► Filling
//!   │             (empty)   ─► Finished
//!   ▼
//! close source ─► finish() ─► dispose()
//! ```
//!
//! ## Rules
//! - Codes are **started** in read order (execution begins inside fill)
//! - Codes are **drained** in start order, regardless of completion order
//! - A read failure does not abort the macro; queued codes still drain
//! - Only this task fills and drains; collaborators never do
//! - Started codes are never killed, only cancelled through their scope

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error};

use super::bootstrap::ConfigStep;
use super::macro_file::MacroFile;
use super::runner::{self, PendingCode};
use crate::error::ReadError;
use crate::events::MessageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Filling,
    Draining,
    Finished,
}

impl MacroFile {
    /// Executes the macro until the source is exhausted, then releases it.
    pub(super) async fn run(self: Arc<Self>) {
        let mut queue: VecDeque<PendingCode> = VecDeque::new();
        let mut step = ConfigStep::initial(self.is_config());
        let mut stage = Stage::Filling;

        while stage != Stage::Finished {
            stage = match stage {
                Stage::Filling if self.runtime.shutdown_token().is_cancelled() => Stage::Finished,
                Stage::Filling => {
                    self.fill(&mut queue, &mut step).await;
                    Stage::Draining
                }
                Stage::Draining => match queue.pop_front() {
                    Some(pending) => {
                        runner::drain(&self, pending).await;
                        Stage::Filling
                    }
                    None => {
                        debug!("Finished codes from macro file {}", self.file_name());
                        Stage::Finished
                    }
                },
                Stage::Finished => Stage::Finished,
            };
        }

        // Codes still queued on shutdown are detached; they observe the
        // cancelled scope and unwind on their own.
        drop(queue);
        if let Some(src) = &self.source {
            src.lock().await.close();
        }

        self.finish().await;
        self.dispose();
    }

    /// Reads ahead until the queue holds `buffered_macro_codes` codes or the
    /// source has nothing more to give.
    async fn fill(&self, queue: &mut VecDeque<PendingCode>, step: &mut ConfigStep) {
        let depth = self.runtime.config().buffer_depth();

        while queue.len() < depth {
            match self.read_next(step).await {
                Ok(Some(mut code)) => {
                    code.log_output = true;
                    queue.push_back(PendingCode::start(self, code));
                }
                Ok(None) => break,
                Err(ReadError::Canceled) => {
                    if let Ok(_guard) = self.lock_async().await {
                        if !self.is_aborted() {
                            debug!("Read of macro file {} cancelled", self.file_name());
                            self.abort_async().await;
                        }
                    }
                    break;
                }
                Err(e) => {
                    self.fail_read(&e).await;
                    break;
                }
            }
        }
    }

    /// Closes the source after a read failure and reports it.
    async fn fail_read(&self, err: &ReadError) {
        if let Some(src) = &self.source {
            src.lock().await.close();
        }
        let line = format!(
            "Failed to read code from macro {}: {}",
            self.display_name(),
            err.reason()
        );
        self.runtime.output().log_output(MessageType::Error, &line).await;
        error!(label = err.as_label(), "{}", line);
    }
}
