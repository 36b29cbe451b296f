//! Units of work executed by a host

use std::any::Any;
use std::fmt;
use std::future::Future;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

/// A deferred callable, run exactly once on a host's worker thread
///
/// `'env` bounds everything the unit borrows; the host guarantees the unit
/// has finished before `run_until_complete` returns.
pub enum UnitOfWork<'env> {
    /// Plain closure
    Sync(Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'env>),
    /// Closure producing a future, polled to completion on the worker
    Async(Box<dyn FnOnce() -> LocalBoxFuture<'env, anyhow::Result<()>> + Send + 'env>),
}

impl<'env> UnitOfWork<'env> {
    /// Wrap a synchronous closure
    pub fn sync<F>(work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'env,
    {
        Self::Sync(Box::new(work))
    }

    /// Wrap a closure returning a future
    ///
    /// The future itself is created on the worker and need not be `Send`.
    pub fn from_async<F, Fut>(work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'env,
        Fut: Future<Output = anyhow::Result<()>> + 'env,
    {
        Self::Async(Box::new(move || work().boxed_local()))
    }

    /// Whether this unit is asynchronous
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    pub(crate) fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Sync(work) => work(),
            Self::Async(work) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(work())
            }
        }
    }
}

impl fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("UnitOfWork::Sync"),
            Self::Async(_) => f.write_str("UnitOfWork::Async"),
        }
    }
}

/// How a unit of work ended
pub enum Completion {
    /// Returned `Ok`
    Succeeded,
    /// Returned `Err`
    Failed(anyhow::Error),
    /// Panicked; carries the payload for `std::panic::resume_unwind`
    Panicked(Box<dyn Any + Send + 'static>),
}

impl Completion {
    /// Whether the unit returned `Ok`
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Panic message, when the payload is a string
    #[must_use]
    pub fn panic_message(&self) -> Option<&str> {
        match self {
            Self::Panicked(payload) => payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str)),
            _ => None,
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
            Self::Panicked(_) => f
                .debug_tuple("Panicked")
                .field(&self.panic_message().unwrap_or("<non-string payload>"))
                .finish(),
        }
    }
}
