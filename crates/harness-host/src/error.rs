//! Error types for the host runner

use crate::host::HostState;

/// Failures of the host itself, as opposed to the unit it runs
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Operation not valid in the host's current state
    #[error("cannot {operation} while host is {state:?}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// State the host was in
        state: HostState,
    },

    /// Worker thread could not be started
    #[error("failed to spawn host worker: {0}")]
    Spawn(#[source] std::io::Error),
}
