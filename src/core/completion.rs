//! # One-shot completion signal of a macro.
//!
//! A [`Completion`] pairs a `oneshot` sender with a shared receiver future.
//! Any number of waiters clone the [`FinishFuture`]; resolving consumes the
//! sender, so a second resolution cannot be expressed. Dropping an
//! unresolved completion resolves its waiters as [`FinishOutcome::Cancelled`].

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use tokio::sync::oneshot;

/// How a wait for a macro ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The run-loop reached its own end (including after an abort).
    Completed,
    /// The macro was disposed before its run-loop finished.
    Cancelled,
}

/// Future returned by [`MacroFile::wait_for_finish`](crate::MacroFile::wait_for_finish).
///
/// Cloneable; always resolves.
pub type FinishFuture = Shared<BoxFuture<'static, FinishOutcome>>;

/// Unresolved completion signal.
pub(crate) struct Completion {
    tx: oneshot::Sender<FinishOutcome>,
    rx: FinishFuture,
}

impl Completion {
    pub(crate) fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        let rx = rx
            .map(|res| res.unwrap_or(FinishOutcome::Cancelled))
            .boxed()
            .shared();
        Self { tx, rx }
    }

    /// Returns a future resolving together with this signal.
    pub(crate) fn waiter(&self) -> FinishFuture {
        self.rx.clone()
    }

    /// Resolves every waiter with `outcome`.
    pub(crate) fn resolve(self, outcome: FinishOutcome) {
        let _ = self.tx.send(outcome);
    }
}

/// Returns an already resolved finish future.
pub(crate) fn resolved(outcome: FinishOutcome) -> FinishFuture {
    future::ready(outcome).boxed().shared()
}
