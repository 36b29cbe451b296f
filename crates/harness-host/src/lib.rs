//! Harness Host
//!
//! Minimal headless host: one worker thread, one unit of work, blocking
//! join. Synchronous and asynchronous units are both supported; async units
//! are driven by a current-thread `tokio` runtime on the worker, so every
//! continuation finishes before the host loop exits.
//!
//! # Example
//!
//! ```rust
//! use harness_host::{Host, ThreadHost, UnitOfWork};
//!
//! let mut host = ThreadHost::new("example");
//! let completion = host
//!     .run(UnitOfWork::from_async(|| async { Ok(()) }))
//!     .unwrap();
//! assert!(completion.is_success());
//! host.dispose().unwrap();
//! ```

pub mod error;
pub mod host;
pub mod work;

// Re-exports
pub use error::HostError;
pub use host::{Host, HostState, Scheduled, ThreadHost};
pub use work::{Completion, UnitOfWork};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
