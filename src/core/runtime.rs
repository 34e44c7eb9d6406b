//! # Shared services of all macro controllers.
//!
//! [`MacroRuntime`] owns what every [`MacroFile`](crate::MacroFile) needs from
//! its host: the configuration, the process-wide shutdown scope, the code
//! executor, the output logger and the source opener. Build one with
//! [`MacroRuntime::builder`] and share it as `Arc<MacroRuntime>`.
//!
//! ```text
//! MacroRuntime
//!   ├─ Config            (look-ahead depth, startup file names, hostname)
//!   ├─ shutdown token    ──► child_token() per MacroFile ──► stamped on every Code
//!   ├─ CodeExecutor      (initiates each code in read order)
//!   ├─ OutputLogger      (user-visible lines)
//!   └─ SourceOpener      (physical path → CodeSource)
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::builder::MacroRuntimeBuilder;
use crate::codes::{CodeExecutor, ExecutorRef};
use crate::core::Config;
use crate::events::OutputLogger;
use crate::source::SourceOpener;

/// Services shared by every macro controller.
pub struct MacroRuntime {
    pub(super) cfg: Config,
    pub(super) hostname: String,
    pub(super) shutdown: CancellationToken,
    pub(super) executor: ExecutorRef,
    pub(super) output: Arc<dyn OutputLogger>,
    pub(super) opener: Arc<dyn SourceOpener>,
}

impl MacroRuntime {
    /// Starts building a runtime around `executor`.
    pub fn builder(cfg: Config, executor: Arc<dyn CodeExecutor>) -> MacroRuntimeBuilder {
        MacroRuntimeBuilder::new(cfg, executor)
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Hostname reported before the configuration file runs, resolved once
    /// when the runtime was built.
    #[inline]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Process-wide shutdown scope. Every macro scope derives from it.
    #[inline]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    #[inline]
    pub fn executor(&self) -> &dyn CodeExecutor {
        self.executor.as_ref()
    }

    #[inline]
    pub fn output(&self) -> &dyn OutputLogger {
        self.output.as_ref()
    }

    #[inline]
    pub fn opener(&self) -> &dyn SourceOpener {
        self.opener.as_ref()
    }

    /// Cancels the process-wide scope, and with it every running macro.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for MacroRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroRuntime")
            .field("cfg", &self.cfg)
            .field("hostname", &self.hostname)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
