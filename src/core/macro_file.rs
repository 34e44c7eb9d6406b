//! # MacroFile: controller of one running macro.
//!
//! A [`MacroFile`] owns the [`CodeSource`](crate::CodeSource) of one macro or
//! configuration file for the duration of one invocation. Construction opens
//! the source and launches the run-loop (see `pipeline`) as an independent
//! task; the owner then observes it through queries, aborts it, waits for it
//! and finally drops it.
//!
//! ## Lifecycle
//! ```text
//! MacroFile::new()
//!   ├─► classify file name (config / config-override)
//!   ├─► open source ── NotFound ─► inert (info, trace on Daemon)
//!   │               └─ Io       ─► inert (error)
//!   └─► source opened (or config fallback) ─► is_executing = just_started = true
//!                                           └─► spawn run()
//!
//! run() ─► fill/drain ... ─► finish(): is_executing = false, resolve waiters
//!                         └─► dispose()
//! ```
//!
//! ## Locks
//! - `lock` / `lock_async`: controller-level state, observes the process-wide scope
//! - `wait_for_code_start` / `wait_for_code_finish`: ordering scopes for collaborators
//!   (never taken by the run-loop), observe this macro's scope
//! - the source's own exclusive-access region: reads and closes
//!
//! No two of them are held together across an await by the same party, except
//! the fill-time abort, which closes the source while holding `lock`.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::bootstrap::ConfigStep;
use super::completion::{self, Completion, FinishFuture, FinishOutcome};
use super::runtime::MacroRuntime;
use crate::codes::{Code, CodeChannel, CodeFlags};
use crate::error::{MacroError, ReadError};
use crate::source::{self, CodeSource, SharedSource};

/// Controller of one running macro or configuration file.
pub struct MacroFile {
    /// Self reference handed to codes as their (non-owning) owner link.
    me: Weak<MacroFile>,
    pub(super) runtime: Arc<MacroRuntime>,

    file_name: String,
    channel: CodeChannel,
    source_connection: u32,
    nested: bool,
    is_config: bool,
    is_config_override: bool,

    pub(super) source: Option<SharedSource>,
    cancel: CancellationToken,

    lock: Mutex<()>,
    code_start: Mutex<()>,
    code_finish: Mutex<()>,

    executing: AtomicBool,
    just_started: AtomicBool,
    pausable: AtomicBool,
    aborted: AtomicBool,
    disposed: AtomicBool,

    /// Lazily created finish signal. `executing` and `disposed` change only
    /// while this is held, so creating and resolving never race.
    completion: parking_lot::Mutex<Option<Completion>>,
}

impl MacroFile {
    /// Opens `physical_path` and starts executing it.
    ///
    /// `file_name` is the name used in messages; `nested` tells whether the
    /// macro was started from within another code; `source_connection` is the
    /// IPC connection that requested it (0 = none).
    ///
    /// A missing file is not an error: the controller is returned inert with
    /// [`file_opened`](Self::file_opened) `== false`.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime (the run-loop is spawned).
    pub fn new(
        runtime: &Arc<MacroRuntime>,
        file_name: impl Into<String>,
        physical_path: impl AsRef<Path>,
        channel: CodeChannel,
        nested: bool,
        source_connection: u32,
    ) -> Arc<Self> {
        let file_name = file_name.into();
        let path = physical_path.as_ref();
        let cfg = runtime.config();

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let is_config = !nested && cfg.is_config_file(name);
        let is_config_override = nested && cfg.is_config_override(name);

        let source = match runtime.opener().open(path, channel) {
            Ok(src) => {
                info!("Starting macro file {} on channel {}", file_name, channel);
                Some(source::shared(src))
            }
            Err(e) if e.is_not_found() => {
                if channel == CodeChannel::Daemon {
                    trace!("Macro file {} not found", file_name);
                } else {
                    info!("Macro file {} not found", file_name);
                }
                None
            }
            Err(e) => {
                error!(error = %e, "Failed to start macro file {}: {}", file_name, e.as_message());
                None
            }
        };

        let launch = source.is_some() || (is_config && cfg.is_config_fallback(name));

        let this = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            runtime: Arc::clone(runtime),
            file_name,
            channel,
            source_connection,
            nested,
            is_config,
            is_config_override,
            source,
            cancel: runtime.shutdown_token().child_token(),
            lock: Mutex::new(()),
            code_start: Mutex::new(()),
            code_finish: Mutex::new(()),
            executing: AtomicBool::new(launch),
            just_started: AtomicBool::new(launch),
            pausable: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            completion: parking_lot::Mutex::new(None),
        });

        if launch {
            tokio::spawn(Arc::clone(&this).run());
        }
        this
    }

    // ---------------------------
    // Queries
    // ---------------------------

    /// Name of the file being executed.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Last path component of the file name, used in output lines.
    pub(super) fn display_name(&self) -> String {
        Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone())
    }

    pub fn channel(&self) -> CodeChannel {
        self.channel
    }

    pub fn source_connection(&self) -> u32 {
        self.source_connection
    }

    /// Whether this macro was started from within another code.
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Whether this is the startup configuration file (or its fallback).
    pub fn is_config(&self) -> bool {
        self.is_config
    }

    /// Whether this is the configuration override file run as a nested macro.
    pub fn is_config_override(&self) -> bool {
        self.is_config_override
    }

    /// Whether a source could be opened.
    pub fn file_opened(&self) -> bool {
        self.source.is_some()
    }

    /// True from construction until the run-loop exits.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// True until the owner has observed the first code.
    pub fn just_started(&self) -> bool {
        self.just_started.load(Ordering::Acquire)
    }

    pub fn set_just_started(&self, value: bool) {
        self.just_started.store(value, Ordering::Release);
    }

    /// Whether a pause request may interrupt this macro.
    pub fn is_pausable(&self) -> bool {
        self.pausable.load(Ordering::Acquire)
    }

    pub fn set_pausable(&self, value: bool) {
        self.pausable.store(value, Ordering::Release);
    }

    /// Scope cancelled when this macro is aborted or disposed, or on shutdown.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // ---------------------------
    // Locks
    // ---------------------------

    /// Locks this controller, blocking the current thread.
    ///
    /// Meant for synchronous callers (e.g. inside `spawn_blocking`); blocking a
    /// runtime worker with it stalls that worker.
    pub fn lock(&self) -> Result<MutexGuard<'_, ()>, MacroError> {
        futures::executor::block_on(self.lock_async())
    }

    /// Locks this controller. Fails once the process-wide scope is cancelled.
    pub async fn lock_async(&self) -> Result<MutexGuard<'_, ()>, MacroError> {
        acquire(&self.lock, self.runtime.shutdown_token()).await
    }

    /// Waits until a new code may be started in order.
    ///
    /// Needed when a flush is requested on the channel while this macro is
    /// about to start a nested macro.
    pub async fn wait_for_code_start(&self) -> Result<MutexGuard<'_, ()>, MacroError> {
        acquire(&self.code_start, &self.cancel).await
    }

    /// Waits until a code may be finished in order.
    pub async fn wait_for_code_finish(&self) -> Result<MutexGuard<'_, ()>, MacroError> {
        acquire(&self.code_finish, &self.cancel).await
    }

    // ---------------------------
    // Abort / finish / dispose
    // ---------------------------

    /// Aborts this macro, blocking the current thread while the source closes.
    ///
    /// No-op when disposed. When already aborted, only waits until the source
    /// is closed, so the source is closed whenever any abort call returns.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context; use
    /// [`abort_async`](Self::abort_async) there.
    pub fn abort(&self) {
        if self.is_disposed() {
            return;
        }
        let first = self.begin_abort();
        if let Some(src) = &self.source {
            close_once(src.blocking_lock().as_mut());
        }
        if first {
            info!("Aborted macro file {}", self.file_name);
        }
    }

    /// Aborts this macro. Same contract as [`abort`](Self::abort).
    pub async fn abort_async(&self) {
        if self.is_disposed() {
            return;
        }
        let first = self.begin_abort();
        if let Some(src) = &self.source {
            close_once(src.lock().await.as_mut());
        }
        if first {
            info!("Aborted macro file {}", self.file_name);
        }
    }

    /// Performs the one-time abort transition. Returns `false` if another
    /// caller already did.
    fn begin_abort(&self) -> bool {
        if self.aborted.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Returns a future that resolves once the run-loop has exited.
    ///
    /// Resolves immediately if the macro never started. The future is always
    /// resolved eventually: with [`FinishOutcome::Completed`] when the run-loop
    /// ends, or [`FinishOutcome::Cancelled`] when the macro is disposed first.
    /// Stop the macro with [`abort`](Self::abort), not by dropping this future.
    pub fn wait_for_finish(&self) -> FinishFuture {
        let mut slot = self.completion.lock();
        if !self.is_executing() {
            return completion::resolved(FinishOutcome::Completed);
        }
        if self.is_disposed() {
            return completion::resolved(FinishOutcome::Cancelled);
        }
        slot.get_or_insert_with(Completion::new).waiter()
    }

    /// Run-loop exit bookkeeping: stop executing and release waiters.
    pub(super) async fn finish(&self) {
        let _guard = self.lock_async().await.ok();

        let pending = {
            let mut slot = self.completion.lock();
            self.executing.store(false, Ordering::Release);
            slot.take()
        };
        if !self.is_aborted() {
            info!("Finished macro file {}", self.file_name);
        }
        if let Some(completion) = pending {
            completion.resolve(FinishOutcome::Completed);
        }
    }

    /// Releases the cancellation scope and the source. Idempotent.
    ///
    /// Waiters still pending are resolved as [`FinishOutcome::Cancelled`];
    /// a run-loop still in progress observes the cancelled scope and unwinds.
    pub fn dispose(&self) {
        let pending = {
            let mut slot = self.completion.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            slot.take()
        };

        self.cancel.cancel();
        if let Some(src) = &self.source {
            // Held by a reader that is unwinding; the handle goes away with `self`.
            if let Ok(mut src) = src.try_lock() {
                src.close();
            }
        }
        if let Some(completion) = pending {
            completion.resolve(FinishOutcome::Cancelled);
        }
        debug!("Disposed macro file {}", self.file_name);
    }

    // ---------------------------
    // Reading
    // ---------------------------

    /// Returns the next code to execute, or `None` when there is no more.
    ///
    /// While `step` is not [`ConfigStep::Done`] the bootstrap codes are
    /// synthesized instead of reading from the source.
    pub(crate) async fn read_next(&self, step: &mut ConfigStep) -> Result<Option<Code>, ReadError> {
        let code = match step.advance(self.channel, self.runtime.hostname()) {
            Some(code) => Some(code),
            None => self.read_source().await?,
        };
        Ok(code.map(|c| self.stamp(c)))
    }

    async fn read_source(&self) -> Result<Option<Code>, ReadError> {
        let Some(src) = &self.source else {
            return Ok(None);
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReadError::Canceled),
            res = async { src.lock().await.read_code().await } => res,
        }
    }

    /// Marks `code` as belonging to this macro.
    fn stamp(&self, mut code: Code) -> Code {
        code.cancellation = self.cancel.clone();
        code.file_position = None;
        code.flags |= CodeFlags::FROM_MACRO;
        if self.is_config {
            code.flags |= CodeFlags::FROM_CONFIG;
        }
        if self.is_config_override {
            code.flags |= CodeFlags::FROM_CONFIG_OVERRIDE;
        }
        if self.nested {
            code.flags |= CodeFlags::NESTED_MACRO;
        }
        code.macro_file = Some(self.me.clone());
        code.source_connection = self.source_connection;
        code
    }
}

/// Closes `src` unless an earlier caller already did.
fn close_once(src: &mut dyn CodeSource) {
    if !src.is_closed() {
        src.close();
    }
}

/// Locks `mutex` unless `token` fires first.
async fn acquire<'a>(
    mutex: &'a Mutex<()>,
    token: &CancellationToken,
) -> Result<MutexGuard<'a, ()>, MacroError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(MacroError::Canceled),
        guard = mutex.lock() => Ok(guard),
    }
}

impl fmt::Debug for MacroFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroFile")
            .field("file_name", &self.file_name)
            .field("channel", &self.channel)
            .field("nested", &self.nested)
            .field("is_config", &self.is_config)
            .field("is_config_override", &self.is_config_override)
            .field("file_opened", &self.file_opened())
            .field("is_executing", &self.is_executing())
            .field("is_aborted", &self.is_aborted())
            .field("is_disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::core::{Config, FinishOutcome};
    use crate::testing::{
        Behavior, Harness, OpenScript, ScriptedExecutor, ScriptedOpener, ScriptedSource, code,
        finished, until,
    };

    fn source(lines: &[&str]) -> Arc<ScriptedOpener> {
        ScriptedOpener::new(OpenScript::Source(ScriptedSource::lines(lines)))
    }

    #[tokio::test]
    async fn starts_and_drains_in_read_order_with_stamped_codes() {
        let exec = ScriptedExecutor::new();
        let h = Harness::new(exec.clone(), source(&["G28", "G29 S1", "M400"]));

        let mf = h.start("homeall.g", true);
        assert!(mf.file_opened());
        assert!(mf.is_executing());
        assert!(mf.just_started());

        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
        assert!(!mf.is_executing());
        assert!(!mf.is_aborted());
        assert_eq!(exec.started(), ["G28", "G29", "M400"]);
        assert_eq!(exec.completed(), ["G28", "G29", "M400"]);

        for c in exec.started_codes() {
            assert!(c.flags.contains(CodeFlags::FROM_MACRO | CodeFlags::NESTED_MACRO));
            assert!(!c.flags.intersects(CodeFlags::FROM_CONFIG | CodeFlags::FROM_CONFIG_OVERRIDE));
            assert!(c.log_output);
            assert_eq!(c.source_connection, 7);
            assert_eq!(c.file_position, None);
            let owner = c.owning_macro().expect("owner alive");
            assert!(Arc::ptr_eq(&owner, &mf));
        }
    }

    #[tokio::test]
    async fn drains_in_start_order_regardless_of_latency() {
        let exec = ScriptedExecutor::new()
            .on("G1", Behavior::DelayThenFail(Duration::from_millis(50), "Slow", "first"))
            .on("G2", Behavior::Fail("Fast", "second"));
        let mut h = Harness::new(exec.clone(), source(&["G1", "G2"]));

        let mf = h.start("order.g", false);
        finished(&mf).await;

        assert_eq!(exec.started(), ["G1", "G2"]);
        assert_eq!(exec.completed(), ["G2", "G1"]);
        assert_eq!(
            h.drain_output(),
            [
                "Failed to execute G1 in order.g: [Slow] first",
                "Failed to execute G2 in order.g: [Fast] second",
            ]
        );
    }

    #[tokio::test]
    async fn config_without_source_yields_bootstrap_codes_once() {
        let h = Harness::new(
            ScriptedExecutor::new(),
            ScriptedOpener::new(OpenScript::NotFound),
        );
        let mf = h.start("config.g", false);
        assert!(mf.is_config());
        assert!(!mf.file_opened());
        assert!(!mf.is_executing());

        let mut step = ConfigStep::initial(mf.is_config());
        let host = mf.read_next(&mut step).await.unwrap().expect("hostname code");
        assert_eq!(host.to_string(), "M550 P\"test-host\"");
        assert!(host.internally_processed);
        assert!(host.flags.contains(CodeFlags::FROM_MACRO | CodeFlags::FROM_CONFIG));

        let clock = mf.read_next(&mut step).await.unwrap().expect("datetime code");
        assert_eq!(clock.to_short_string(), "M905");
        assert!(clock.parameter('P').is_some() && clock.parameter('S').is_some());
        assert!(clock.internally_processed);

        assert!(mf.read_next(&mut step).await.unwrap().is_none());
        assert!(mf.read_next(&mut step).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn config_fallback_runs_without_source() {
        let exec = ScriptedExecutor::new();
        let h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::NotFound));

        let mf = h.start("config.g.bak", false);
        assert!(!mf.file_opened());
        assert!(mf.is_executing());

        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
        assert_eq!(exec.started(), ["M550", "M905"]);
    }

    #[tokio::test]
    async fn config_file_sends_bootstrap_before_its_codes() {
        let exec = ScriptedExecutor::new();
        let h = Harness::new(exec.clone(), source(&["M98 P\"network.g\""]));

        let mf = h.start("config.g", false);
        finished(&mf).await;

        assert_eq!(exec.started(), ["M550", "M905", "M98"]);
        for c in exec.started_codes() {
            assert!(c.flags.contains(CodeFlags::FROM_CONFIG));
        }
    }

    #[tokio::test]
    async fn nested_config_names_are_classified_by_nesting() {
        let exec = ScriptedExecutor::new();
        let h = Harness::new(exec.clone(), source(&["M501"]));
        let mf = h.start("config-override.g", true);
        assert!(mf.is_config_override());
        assert!(!mf.is_config());
        finished(&mf).await;
        let flags = exec.started_codes()[0].flags;
        assert!(flags.contains(CodeFlags::FROM_CONFIG_OVERRIDE | CodeFlags::NESTED_MACRO));

        let h = Harness::new(ScriptedExecutor::new(), source(&["G28"]));
        let nested_config = h.start("config.g", true);
        assert!(!nested_config.is_config());
        let top_override = Harness::new(ScriptedExecutor::new(), source(&["G28"]))
            .start("config-override.g", false);
        assert!(!top_override.is_config_override());
    }

    #[tokio::test]
    async fn read_failure_closes_source_and_drains_queued_codes() {
        let src = ScriptedSource::new(vec![
            Ok(code("G1")),
            Ok(code("G2")),
            Err(ReadError::Io(io::Error::other("disk gone"))),
            Ok(code("G3")),
        ]);
        let probe = src.probe();
        let exec = ScriptedExecutor::new();
        let mut h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::Source(src)));

        let mf = h.start("sub/homeall.g", false);
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);

        assert_eq!(exec.completed(), ["G1", "G2"]);
        assert_eq!(probe.closes(), 1);
        assert!(!mf.is_aborted());
        assert_eq!(
            h.drain_output(),
            ["Failed to read code from macro homeall.g: disk gone"]
        );
    }

    #[tokio::test]
    async fn drain_cancellation_is_silent_and_failure_reported_once() {
        let exec = ScriptedExecutor::new()
            .on("G1", Behavior::Cancelled)
            .on("G2", Behavior::Fail("IOException", "boom"))
            .on("G3", Behavior::Delay(Duration::from_millis(10)));
        let mut h = Harness::new(exec.clone(), source(&["G1", "G2", "G3"]));

        let mf = h.start("pause.g", false);
        finished(&mf).await;

        assert_eq!(exec.completed(), ["G1", "G2", "G3"]);
        assert_eq!(
            h.drain_output(),
            ["Failed to execute G2 in pause.g: [IOException] boom"]
        );
    }

    #[tokio::test]
    async fn parse_failure_names_the_file() {
        let exec = ScriptedExecutor::new().on("M587", Behavior::Parse("Missing S parameter"));
        let mut h = Harness::new(exec, source(&["M587", "G4 S1"]));

        let mf = h.start("network.g", false);
        finished(&mf).await;

        assert_eq!(h.drain_output(), ["Missing S parameter of network.g"]);
    }

    #[tokio::test]
    async fn abort_async_is_idempotent() {
        let src = ScriptedSource::lines(&["G1"]).hanging();
        let probe = src.probe();
        let exec = ScriptedExecutor::new().on("G1", Behavior::UntilCancelled);
        let mut h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::Source(src)));

        let mf = h.start("long.g", false);
        until(|| exec.started().len() == 1).await;

        mf.abort_async().await;
        assert!(mf.is_aborted());
        assert!(mf.cancellation_token().is_cancelled());
        assert_eq!(probe.closes(), 1);

        mf.abort_async().await;
        assert_eq!(probe.closes(), 1);

        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
        assert!(mf.is_aborted());
        assert_eq!(probe.closes(), 1);
        assert!(h.drain_output().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_forms_work_off_the_runtime() {
        let src = ScriptedSource::lines(&["G1"]).hanging();
        let probe = src.probe();
        let exec = ScriptedExecutor::new().on("G1", Behavior::UntilCancelled);
        let h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::Source(src)));

        let mf = h.start("long.g", false);
        until(|| exec.started().len() == 1).await;

        let blocking = Arc::clone(&mf);
        tokio::task::spawn_blocking(move || {
            assert!(blocking.lock().is_ok());
            blocking.abort();
            blocking.abort();
        })
        .await
        .expect("blocking abort");

        assert!(mf.is_aborted());
        assert_eq!(probe.closes(), 1);
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
    }

    #[tokio::test]
    async fn dispose_before_completion_cancels_waiters() {
        let exec = ScriptedExecutor::new().on("G1", Behavior::UntilCancelled);
        let h = Harness::new(
            exec.clone(),
            ScriptedOpener::new(OpenScript::Source(ScriptedSource::lines(&["G1"]).hanging())),
        );

        let mf = h.start("long.g", false);
        let wait = mf.wait_for_finish();
        until(|| exec.started().len() == 1).await;

        mf.dispose();
        mf.dispose();
        assert!(mf.is_disposed());
        assert_eq!(wait.await, FinishOutcome::Cancelled);

        mf.abort_async().await;
        assert!(!mf.is_aborted());

        until(|| !mf.is_executing()).await;
        assert_eq!(exec.started(), ["G1"]);
    }

    #[tokio::test]
    async fn missing_or_unreadable_file_is_inert() {
        for script in [OpenScript::NotFound, OpenScript::Fail] {
            let exec = ScriptedExecutor::new();
            let h = Harness::new(exec.clone(), ScriptedOpener::new(script));

            let mf = h.start("missing.g", false);
            assert!(!mf.file_opened());
            assert!(!mf.is_executing());
            assert!(!mf.just_started());
            assert_eq!(mf.wait_for_finish().await, FinishOutcome::Completed);

            tokio::task::yield_now().await;
            assert!(exec.started().is_empty());
        }
    }

    #[tokio::test]
    async fn runtime_shutdown_stops_every_macro() {
        let exec = ScriptedExecutor::new().on("G1", Behavior::UntilCancelled);
        let h = Harness::new(
            exec.clone(),
            ScriptedOpener::new(OpenScript::Source(ScriptedSource::lines(&["G1"]).hanging())),
        );

        let mf = h.start("long.g", false);
        until(|| exec.started().len() == 1).await;

        h.runtime.shutdown();
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
        assert!(mf.cancellation_token().is_cancelled());
        assert!(!mf.is_aborted());
    }

    #[tokio::test]
    async fn ordering_scopes_follow_the_macro_scope() {
        let exec = ScriptedExecutor::new().on("G1", Behavior::UntilCancelled);
        let h = Harness::new(
            exec.clone(),
            ScriptedOpener::new(OpenScript::Source(ScriptedSource::lines(&["G1"]).hanging())),
        );
        let mf = h.start("long.g", false);

        {
            let _start = mf.wait_for_code_start().await.expect("start scope");
            let _finish = mf.wait_for_code_finish().await.expect("finish scope");
        }

        mf.abort_async().await;
        assert!(matches!(mf.wait_for_code_start().await, Err(MacroError::Canceled)));
        assert!(matches!(mf.wait_for_code_finish().await, Err(MacroError::Canceled)));
        assert!(mf.lock_async().await.is_ok());

        finished(&mf).await;
        h.runtime.shutdown();
        assert!(matches!(mf.lock_async().await, Err(MacroError::Canceled)));
    }

    #[tokio::test]
    async fn look_ahead_is_bounded() {
        let cfg = Config {
            buffered_macro_codes: 2,
            ..Config::default()
        };
        let mut exec = ScriptedExecutor::new();
        for c in ["G1", "G2", "G3", "G4", "G5"] {
            exec = exec.on(c, Behavior::Gated);
        }
        let h = Harness::with_config(cfg, exec.clone(), source(&["G1", "G2", "G3", "G4", "G5"]));

        let mf = h.start("gated.g", false);
        until(|| exec.started().len() == 2).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(exec.started(), ["G1", "G2"]);

        exec.open_gate(5);
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
        assert_eq!(exec.started(), ["G1", "G2", "G3", "G4", "G5"]);
    }

    #[tokio::test]
    async fn aborted_code_finishes_its_cleanup_before_the_macro_ends() {
        let exec = ScriptedExecutor::new().on("G1", Behavior::UnwindSlowly(Duration::from_millis(20)));
        let h = Harness::new(
            exec.clone(),
            ScriptedOpener::new(OpenScript::Source(ScriptedSource::lines(&["G1"]).hanging())),
        );

        let mf = h.start("long.g", false);
        until(|| exec.started().len() == 1).await;

        mf.abort_async().await;
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
        assert_eq!(exec.completed(), ["G1"]);
    }

    #[tokio::test]
    async fn code_may_abort_its_own_macro() {
        let src = ScriptedSource::lines(&["M99"]).hanging();
        let probe = src.probe();
        let exec = ScriptedExecutor::new().on("M99", Behavior::AbortOwner);
        let mut h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::Source(src)));

        let mf = h.start("stop.g", false);
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);

        assert!(mf.is_aborted());
        assert_eq!(exec.completed(), ["M99"]);
        assert_eq!(probe.closes(), 1);
        assert!(h.drain_output().is_empty());
    }

    #[tokio::test]
    async fn source_cancellation_during_fill_aborts() {
        let src = ScriptedSource::new(vec![
            Ok(code("G1")),
            Err(ReadError::Canceled),
            Ok(code("G2")),
        ]);
        let probe = src.probe();
        let exec = ScriptedExecutor::new();
        let mut h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::Source(src)));

        let mf = h.start("interrupted.g", false);
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);

        assert!(mf.is_aborted());
        assert!(mf.cancellation_token().is_cancelled());
        assert_eq!(probe.closes(), 1);
        assert_eq!(exec.started(), ["G1"]);
        assert!(h.drain_output().is_empty());
    }

    #[tokio::test]
    async fn concurrent_aborts_both_return_with_source_closed() {
        let src = ScriptedSource::lines(&["G1"]).hanging();
        let probe = src.probe();
        let exec = ScriptedExecutor::new().on("G1", Behavior::UntilCancelled);
        let h = Harness::new(exec.clone(), ScriptedOpener::new(OpenScript::Source(src)));

        let mf = h.start("long.g", false);
        until(|| exec.started().len() == 1).await;

        tokio::join!(
            async {
                mf.abort_async().await;
                assert_eq!(probe.closes(), 1);
            },
            async {
                mf.abort_async().await;
                assert_eq!(probe.closes(), 1);
            },
        );
        assert!(mf.is_aborted());
        assert_eq!(finished(&mf).await, FinishOutcome::Completed);
    }

    #[tokio::test]
    async fn owner_settable_flags() {
        let h = Harness::new(ScriptedExecutor::new(), source(&["G1"]));
        let mf = h.start("flags.g", false);

        assert!(!mf.is_pausable());
        mf.set_pausable(true);
        assert!(mf.is_pausable());

        mf.set_just_started(false);
        assert!(!mf.just_started());
        finished(&mf).await;
    }
}
