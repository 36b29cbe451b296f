//! Per-test lifecycle state machine
//!
//! `Created → DirectoryResolved → DatabaseOpen → BodyExecuting →
//! DatabaseClosed → Compacted → Disposed`. No state may be skipped, and a
//! failing body still moves through every teardown state.

use serde::Serialize;

use crate::error::LifecycleError;

/// Where a test run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleState {
    /// Nothing acquired yet
    Created,
    /// Test directory exists
    DirectoryResolved,
    /// Database handle open
    DatabaseOpen,
    /// Body running on the host
    BodyExecuting,
    /// Database handle closed
    DatabaseClosed,
    /// Compaction step finished
    Compacted,
    /// Host disposed; terminal
    Disposed,
}

impl LifecycleState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 7] = [
        Self::Created,
        Self::DirectoryResolved,
        Self::DatabaseOpen,
        Self::BodyExecuting,
        Self::DatabaseClosed,
        Self::Compacted,
        Self::Disposed,
    ];

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Disposed
    }
}

/// Validates a lifecycle transition.
///
/// Returns an error for anything but the immediate successor. With the
/// `strict-debug` feature an illegal transition panics instead.
///
/// # Errors
/// Returns [`LifecycleError::IllegalTransition`] if `to` does not follow `from`
pub fn validate_transition(from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal lifecycle transition attempted: {from:?} -> {to:?}");

        #[cfg(not(feature = "strict-debug"))]
        Err(LifecycleError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: LifecycleState) -> Vec<LifecycleState> {
    use LifecycleState::*;
    match from {
        Created => vec![DirectoryResolved],
        DirectoryResolved => vec![DatabaseOpen],
        DatabaseOpen => vec![BodyExecuting],
        BodyExecuting => vec![DatabaseClosed],
        DatabaseClosed => vec![Compacted],
        Compacted => vec![Disposed],
        Disposed => vec![],
    }
}

/// A state plus the path taken to reach it
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    state: LifecycleState,
    visited: Vec<LifecycleState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: LifecycleState::Created,
            visited: vec![LifecycleState::Created],
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    pub(crate) fn advance(&mut self, to: LifecycleState) -> Result<(), LifecycleError> {
        validate_transition(self.state, to)?;
        self.state = to;
        self.visited.push(to);
        Ok(())
    }

    pub(crate) fn into_visited(self) -> Vec<LifecycleState> {
        self.visited
    }
}
