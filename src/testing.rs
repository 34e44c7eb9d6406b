//! Scripted collaborators for controller tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, broadcast};

use crate::{
    Code, CodeChannel, CodeError, CodeExecutor, CodeFuture, CodeSource, Config, MacroFile,
    MacroRuntime, Message, OpenError, OutputBus, ReadError, SourceOpener, parse_line,
};

/// How [`ScriptedExecutor`] completes a code, keyed by its short form.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    Succeed,
    Delay(Duration),
    DelayThenFail(Duration, &'static str, &'static str),
    Fail(&'static str, &'static str),
    Parse(&'static str),
    Cancelled,
    UntilCancelled,
    /// Waits for cancellation, then spends the given time cleaning up.
    UnwindSlowly(Duration),
    /// Aborts the macro the code belongs to, then succeeds.
    AbortOwner,
    Gated,
}

/// Executor that records start and completion order.
pub(crate) struct ScriptedExecutor {
    behaviors: Mutex<HashMap<String, Behavior>>,
    started: Mutex<Vec<Arc<Code>>>,
    completed: Arc<Mutex<Vec<String>>>,
    gate: Arc<Semaphore>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            started: Mutex::new(Vec::new()),
            completed: Arc::new(Mutex::new(Vec::new())),
            gate: Arc::new(Semaphore::new(0)),
        })
    }

    pub(crate) fn on(self: &Arc<Self>, short: &str, behavior: Behavior) -> Arc<Self> {
        self.behaviors.lock().insert(short.to_string(), behavior);
        Arc::clone(self)
    }

    /// Lets `n` gated codes complete.
    pub(crate) fn open_gate(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().iter().map(|c| c.to_short_string()).collect()
    }

    pub(crate) fn started_codes(&self) -> Vec<Arc<Code>> {
        self.started.lock().clone()
    }

    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

impl CodeExecutor for ScriptedExecutor {
    fn execute(&self, code: Arc<Code>) -> CodeFuture {
        let short = code.to_short_string();
        let behavior = self
            .behaviors
            .lock()
            .get(&short)
            .copied()
            .unwrap_or(Behavior::Succeed);
        self.started.lock().push(Arc::clone(&code));

        let completed = Arc::clone(&self.completed);
        let gate = Arc::clone(&self.gate);
        let token = code.cancellation.clone();

        Box::pin(async move {
            let res = match behavior {
                Behavior::Succeed => Ok(Message::success("")),
                Behavior::Delay(d) => tokio::select! {
                    _ = tokio::time::sleep(d) => Ok(Message::success("")),
                    _ = token.cancelled() => Err(CodeError::Canceled),
                },
                Behavior::DelayThenFail(d, kind, msg) => {
                    tokio::time::sleep(d).await;
                    Err(CodeError::fail(kind, msg))
                }
                Behavior::Fail(kind, msg) => Err(CodeError::fail(kind, msg)),
                Behavior::Parse(msg) => Err(CodeError::parse(msg)),
                Behavior::Cancelled => Err(CodeError::Canceled),
                Behavior::UntilCancelled => {
                    token.cancelled().await;
                    Err(CodeError::Canceled)
                }
                Behavior::UnwindSlowly(d) => {
                    token.cancelled().await;
                    tokio::time::sleep(d).await;
                    Err(CodeError::Canceled)
                }
                Behavior::AbortOwner => {
                    if let Some(owner) = code.owning_macro() {
                        owner.abort_async().await;
                    }
                    Ok(Message::success(""))
                }
                Behavior::Gated => tokio::select! {
                    permit = gate.acquire() => {
                        if let Ok(permit) = permit {
                            permit.forget();
                        }
                        Ok(Message::success(""))
                    }
                    _ = token.cancelled() => Err(CodeError::Canceled),
                },
            };
            completed.lock().push(short);
            res
        })
    }
}

/// Counts reads and closes of a [`ScriptedSource`] after it moved into a controller.
#[derive(Clone, Default)]
pub(crate) struct SourceProbe {
    closes: Arc<AtomicUsize>,
}

impl SourceProbe {
    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Source yielding a fixed script of results.
pub(crate) struct ScriptedSource {
    script: VecDeque<Result<Code, ReadError>>,
    hang: bool,
    closed: bool,
    probe: SourceProbe,
}

impl ScriptedSource {
    pub(crate) fn new(script: Vec<Result<Code, ReadError>>) -> Self {
        Self {
            script: script.into(),
            hang: false,
            closed: false,
            probe: SourceProbe::default(),
        }
    }

    /// Source of the given code lines.
    pub(crate) fn lines(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| Ok(code(l))).collect())
    }

    /// Pends forever once the script is exhausted instead of ending the stream.
    pub(crate) fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub(crate) fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl CodeSource for ScriptedSource {
    async fn read_code(&mut self) -> Result<Option<Code>, ReadError> {
        if self.closed {
            return Ok(None);
        }
        match self.script.pop_front() {
            Some(res) => res.map(Some),
            None if self.hang => futures::future::pending().await,
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// What [`ScriptedOpener`] returns for the next open.
pub(crate) enum OpenScript {
    Source(ScriptedSource),
    NotFound,
    Fail,
}

pub(crate) struct ScriptedOpener {
    next: Mutex<Option<OpenScript>>,
}

impl ScriptedOpener {
    pub(crate) fn new(script: OpenScript) -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(Some(script)),
        })
    }
}

impl SourceOpener for ScriptedOpener {
    fn open(&self, path: &Path, _channel: CodeChannel) -> Result<Box<dyn CodeSource>, OpenError> {
        match self.next.lock().take() {
            Some(OpenScript::Source(src)) => Ok(Box::new(src)),
            Some(OpenScript::Fail) => Err(OpenError::from_io(
                path,
                io::Error::other("permission denied"),
            )),
            Some(OpenScript::NotFound) | None => Err(OpenError::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parses one line into a code.
pub(crate) fn code(line: &str) -> Code {
    parse_line(line, CodeChannel::File)
        .expect("valid code line")
        .expect("non-blank code line")
}

/// Runtime wired to scripted collaborators plus an output receiver.
pub(crate) struct Harness {
    pub(crate) runtime: Arc<MacroRuntime>,
    output: broadcast::Receiver<Message>,
}

impl Harness {
    pub(crate) fn new(executor: Arc<ScriptedExecutor>, opener: Arc<ScriptedOpener>) -> Self {
        Self::with_config(Config::default(), executor, opener)
    }

    pub(crate) fn with_config(
        cfg: Config,
        executor: Arc<ScriptedExecutor>,
        opener: Arc<ScriptedOpener>,
    ) -> Self {
        let cfg = Config {
            hostname: Some("test-host".into()),
            ..cfg
        };
        let bus = OutputBus::new(64);
        let output = bus.subscribe();
        let runtime = MacroRuntime::builder(cfg, executor)
            .with_output(Arc::new(bus))
            .with_opener(opener)
            .build();
        Self { runtime, output }
    }

    /// Starts `name` (as `/sys/<name>`) on the file channel from connection 7.
    pub(crate) fn start(&self, name: &str, nested: bool) -> Arc<MacroFile> {
        MacroFile::new(
            &self.runtime,
            name,
            Path::new("/sys").join(name),
            CodeChannel::File,
            nested,
            7,
        )
    }

    /// Output lines published so far.
    pub(crate) fn drain_output(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(msg) = self.output.try_recv() {
            lines.push(msg.content.to_string());
        }
        lines
    }
}

/// Waits for `mf` to finish, failing the test after a generous timeout.
pub(crate) async fn finished(mf: &MacroFile) -> crate::FinishOutcome {
    tokio::time::timeout(Duration::from_secs(5), mf.wait_for_finish())
        .await
        .expect("macro did not finish in time")
}

/// Polls `cond` until it holds, failing the test after a generous timeout.
pub(crate) async fn until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}
