//! # Code execution boundary and function-backed executor.
//!
//! [`CodeExecutor`] turns one [`Code`] into a machine operation. The
//! controller calls [`CodeExecutor::execute`] in read order; the synchronous
//! part of that call is where execution is *initiated*, so implementations
//! that enqueue work for the firmware must do so before returning. The
//! returned [`CodeFuture`] is then driven on its own task while the controller
//! keeps reading ahead.
//!
//! [`ExecutorFn`] wraps a closure `F: Fn(Arc<Code>) -> Fut`, producing a fresh
//! future per code.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use codevisor::{Code, CodeError, ExecutorFn, ExecutorRef, Message};
//!
//! let exec: ExecutorRef = ExecutorFn::arc(|code: Arc<Code>| async move {
//!     Ok::<_, CodeError>(Message::success(format!("{code} ok")))
//! });
//! # let _ = exec;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::codes::Code;
use crate::error::CodeError;
use crate::events::Message;

/// Boxed execution future returned by [`CodeExecutor::execute`].
pub type CodeFuture = BoxFuture<'static, Result<Message, CodeError>>;

/// Shared handle to an executor.
pub type ExecutorRef = Arc<dyn CodeExecutor>;

/// # Executes codes against the machine.
///
/// Implementations must observe [`Code::cancellation`] and resolve with
/// [`CodeError::Canceled`] promptly once it fires.
pub trait CodeExecutor: Send + Sync + 'static {
    /// Initiates execution of `code` and returns its completion future.
    fn execute(&self, code: Arc<Code>) -> CodeFuture;
}

/// Function-backed executor.
#[derive(Debug)]
pub struct ExecutorFn<F> {
    f: F,
}

impl<F> ExecutorFn<F> {
    /// Creates a new function-backed executor.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the executor and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> CodeExecutor for ExecutorFn<F>
where
    F: Fn(Arc<Code>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Message, CodeError>> + Send + 'static,
{
    fn execute(&self, code: Arc<Code>) -> CodeFuture {
        Box::pin((self.f)(code))
    }
}
