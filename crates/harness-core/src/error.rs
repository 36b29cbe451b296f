//! Error types for the harness
//!
//! Only [`HarnessError::TestBody`] is the test's own failure; every other
//! variant means the harness could not provide an isolated environment or
//! was driven out of order.

use std::path::PathBuf;

use harness_host::HostError;
use harness_store::StoreError;

use crate::state::LifecycleState;

/// Main harness error type
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Isolated storage could not be provided
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// Database could not be opened
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Host could not run the test body
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Lifecycle driven out of order
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// The test body returned an error
    #[error("test body failed: {0:#}")]
    TestBody(#[source] anyhow::Error),
}

impl HarnessError {
    /// Whether the failure came from the test body rather than the harness
    #[inline]
    #[must_use]
    pub fn is_test_failure(&self) -> bool {
        matches!(self, Self::TestBody(_))
    }
}

/// Storage sandbox errors
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Filesystem refused to create or delete part of the sandbox
    #[error("sandbox i/o error at {path}: {source}")]
    Io {
        /// Path being created or removed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Identity cannot be used as a directory name
    #[error("invalid test identity {0:?}")]
    InvalidIdentity(String),
}

impl SandboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lifecycle state machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Transition not permitted from the current state
    #[error("illegal lifecycle transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: LifecycleState,
        /// Requested state
        to: LifecycleState,
    },
}
