//! Headless host
//!
//! A [`ThreadHost`] owns one logical execution context: a dedicated worker
//! thread that runs exactly one [`UnitOfWork`] and then exits. The caller
//! blocks on the join, so nothing it does afterwards can race the unit.

use std::io;
use std::thread;

use tracing::{debug, info_span, warn};

use crate::error::HostError;
use crate::work::{Completion, UnitOfWork};

/// Host lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostState {
    /// Constructed, nothing run yet
    Idle,
    /// A unit is executing on the worker
    Running,
    /// The worker has exited
    Exited,
    /// Torn down; terminal
    Disposed,
}

/// A host that runs units of work on its own execution context
pub trait Host {
    /// Identity used for thread naming and log correlation
    fn identity(&self) -> &str;

    /// Current lifecycle state
    fn state(&self) -> HostState;

    /// Run `unit` to completion, blocking until the host loop has exited
    ///
    /// # Errors
    /// Returns [`HostError`] if the host is not idle or the worker cannot be
    /// started. Failures of the unit itself are reported through
    /// [`Completion`], not as an error.
    fn run<'env>(&mut self, unit: UnitOfWork<'env>) -> Result<Completion, HostError>;

    /// Release the host; terminal
    ///
    /// # Errors
    /// Returns [`HostError::InvalidState`] if already disposed
    fn dispose(&mut self) -> Result<(), HostError>;
}

/// [`Host`] backed by a scoped worker thread
#[derive(Debug)]
pub struct ThreadHost {
    identity: String,
    state: HostState,
}

impl ThreadHost {
    /// Create an idle host for `identity`
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: HostState::Idle,
        }
    }

    /// Schedule `unit` for the next run of the host loop
    ///
    /// # Errors
    /// Returns [`HostError::InvalidState`] unless the host is idle
    pub fn schedule<'h, 'env>(
        &'h mut self,
        unit: UnitOfWork<'env>,
    ) -> Result<Scheduled<'h, 'env>, HostError> {
        self.expect_state(HostState::Idle, "schedule")?;
        Ok(Scheduled { host: self, unit })
    }

    /// Worker thread name; NUL bytes, which threads cannot carry, become `_`
    fn thread_name(&self) -> String {
        format!("host-{}", self.identity.replace('\0', "_"))
    }

    fn expect_state(&self, expected: HostState, operation: &'static str) -> Result<(), HostError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HostError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl Host for ThreadHost {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn state(&self) -> HostState {
        self.state
    }

    fn run<'env>(&mut self, unit: UnitOfWork<'env>) -> Result<Completion, HostError> {
        self.schedule(unit)?.run_until_complete()
    }

    fn dispose(&mut self) -> Result<(), HostError> {
        if self.state == HostState::Disposed {
            return Err(HostError::InvalidState {
                operation: "dispose",
                state: self.state,
            });
        }
        self.state = HostState::Disposed;
        debug!(identity = %self.identity, "host disposed");
        Ok(())
    }
}

impl Drop for ThreadHost {
    fn drop(&mut self) {
        if self.state != HostState::Disposed {
            warn!(identity = %self.identity, state = ?self.state, "host dropped without dispose");
        }
    }
}

/// A unit bound to its host, waiting for the loop to start
#[must_use = "a scheduled unit does nothing until run_until_complete is called"]
pub struct Scheduled<'h, 'env> {
    host: &'h mut ThreadHost,
    unit: UnitOfWork<'env>,
}

impl Scheduled<'_, '_> {
    /// Start the host loop, run the unit, and wait for the loop to exit
    ///
    /// The host leaves [`HostState::Running`] before this returns, whatever
    /// the outcome of the unit.
    ///
    /// # Errors
    /// Returns [`HostError::Spawn`] if the worker thread cannot be started
    pub fn run_until_complete(self) -> Result<Completion, HostError> {
        let Self { host, unit } = self;
        let span = info_span!("host", identity = %host.identity, is_async = unit.is_async());
        let name = host.thread_name();

        host.state = HostState::Running;
        let joined = thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name(name)
                .spawn_scoped(scope, move || span.in_scope(|| unit.execute()))?;
            Ok::<_, io::Error>(worker.join())
        });
        host.state = HostState::Exited;

        let completion = match joined.map_err(HostError::Spawn)? {
            Ok(Ok(())) => Completion::Succeeded,
            Ok(Err(err)) => Completion::Failed(err),
            Err(payload) => Completion::Panicked(payload),
        };
        debug!(identity = %host.identity, ?completion, "host loop exited");
        Ok(completion)
    }
}
