use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::runtime::MacroRuntime;
use crate::{
    codes::CodeExecutor,
    core::Config,
    events::{OutputBus, OutputLogger},
    source::{FileOpener, SourceOpener},
};

/// Builder for constructing a [`MacroRuntime`] with optional services.
pub struct MacroRuntimeBuilder {
    cfg: Config,
    executor: Arc<dyn CodeExecutor>,
    output: Option<Arc<dyn OutputLogger>>,
    opener: Option<Arc<dyn SourceOpener>>,
    shutdown: Option<CancellationToken>,
}

impl MacroRuntimeBuilder {
    /// Creates a new builder with the given configuration and executor.
    pub fn new(cfg: Config, executor: Arc<dyn CodeExecutor>) -> Self {
        Self {
            cfg,
            executor,
            output: None,
            opener: None,
            shutdown: None,
        }
    }

    /// Sets the sink for user-visible output lines.
    ///
    /// Defaults to a fresh [`OutputBus`] nobody listens to.
    pub fn with_output(mut self, output: Arc<dyn OutputLogger>) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets how physical paths are opened. Defaults to [`FileOpener`].
    pub fn with_opener(mut self, opener: Arc<dyn SourceOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Uses `token` as the process-wide shutdown scope.
    ///
    /// Defaults to a fresh token cancelled only by [`MacroRuntime::shutdown`].
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Builds and returns the runtime.
    ///
    /// Resolves [`Config::hostname`] here, so the run-loops never touch the
    /// filesystem for it.
    pub fn build(self) -> Arc<MacroRuntime> {
        let hostname = self.cfg.hostname().into_owned();
        let output = self
            .output
            .unwrap_or_else(|| Arc::new(OutputBus::new(self.cfg.output_capacity_clamped())));

        Arc::new(MacroRuntime {
            hostname,
            output,
            opener: self.opener.unwrap_or_else(|| Arc::new(FileOpener)),
            shutdown: self.shutdown.unwrap_or_default(),
            executor: self.executor,
            cfg: self.cfg,
        })
    }
}
