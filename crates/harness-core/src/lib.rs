//! Harness Core
//!
//! Per-test isolation for code that persists into an embedded document
//! database:
//! - **StorageSandbox**: one wiped root per process, one directory per test
//! - **TestHarness**: opens a fresh database, runs the body on a headless
//!   host, then closes, measures, compacts and disposes, always in that order
//!
//! # Example
//!
//! ```rust,ignore
//! use harness_core::{test_identity, TestHarness};
//! use harness_model::{build_catalog_graph, build_variant_source};
//!
//! #[test]
//! fn stores_catalog() {
//!     let mut harness = TestHarness::default();
//!     harness
//!         .run(&test_identity!(), |store, _storage| {
//!             build_catalog_graph(&build_variant_source()).persist(store)?;
//!             Ok(())
//!         })
//!         .unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod sandbox;
pub mod state;

// Re-exports
pub use config::HarnessConfig;
pub use error::{HarnessError, LifecycleError, SandboxError};
pub use harness::{TeardownReport, TestHarness};
pub use sandbox::StorageSandbox;
pub use state::{allowed_transitions, validate_transition, LifecycleState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing harnessed tests
    pub use crate::{test_identity, HarnessConfig, HarnessError, TeardownReport, TestHarness};
    pub use futures::future::LocalBoxFuture;
    pub use harness_store::{Document, DocumentStore, NativeStorage, Storage};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of the enclosing function, usable as a sandbox directory name
///
/// Expands to a `String` such as `my_crate.tests.stores_catalog`. Closure
/// and async-block frames are skipped.
#[macro_export]
macro_rules! test_identity {
    () => {{
        fn __marker() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let path = __type_name_of(__marker);
        $crate::identity_from_path(path.strip_suffix("::__marker").unwrap_or(path))
    }};
}

/// Turn a Rust item path into an identity
///
/// `::` separators become `.` and compiler-generated `{{closure}}` segments
/// are dropped.
#[must_use]
pub fn identity_from_path(path: &str) -> String {
    path.split("::")
        .filter(|segment| !segment.starts_with('{'))
        .collect::<Vec<_>>()
        .join(".")
}
