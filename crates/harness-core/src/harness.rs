//! Test lifecycle controller
//!
//! [`TestHarness`] gives each test body a fresh database in its own sandbox
//! directory, runs the body on a [`ThreadHost`], and then tears everything
//! down in a fixed order:
//!
//! 1. close the database
//! 2. measure the file
//! 3. compact it
//! 4. measure again
//! 5. dispose the host
//!
//! Teardown runs whether the body returned `Ok`, returned `Err`, or
//! panicked. Teardown failures are logged and never replace the body's
//! own result.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use harness_host::{Completion, Host, HostError, ThreadHost, UnitOfWork};
use harness_store::{DocumentStore, NativeStorage, Storage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::sandbox::StorageSandbox;
use crate::state::{Lifecycle, LifecycleState};

/// Diagnostics recorded by a finished test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Identity the run was keyed by
    pub identity: String,
    /// Test directory
    pub directory: PathBuf,
    /// Backing database file
    pub database_path: PathBuf,
    /// File size after close, before compaction (0 if unreadable)
    pub size_before_compaction: u64,
    /// File size after compaction (0 if unreadable)
    pub size_after_compaction: u64,
    /// Whether a smaller compacted file replaced the original
    pub compacted: bool,
    /// Whether the body returned `Ok`
    pub body_succeeded: bool,
    /// Every lifecycle state visited, in order
    pub states: Vec<LifecycleState>,
}

impl TeardownReport {
    /// Final lifecycle state
    #[must_use]
    pub fn final_state(&self) -> Option<LifecycleState> {
        self.states.last().copied()
    }

    /// Report as a JSON object
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Everything acquired before the body runs
struct Session {
    identity: String,
    lifecycle: Lifecycle,
    storage: NativeStorage,
    store: DocumentStore,
}

/// Per-test database lifecycle controller
#[derive(Debug)]
pub struct TestHarness {
    config: HarnessConfig,
    sandbox: Arc<StorageSandbox>,
    last_report: Option<TeardownReport>,
}

impl TestHarness {
    /// Create a harness over an explicit sandbox
    #[must_use]
    pub fn new(config: HarnessConfig, sandbox: Arc<StorageSandbox>) -> Self {
        Self {
            config,
            sandbox,
            last_report: None,
        }
    }

    /// Create a harness from configuration alone
    ///
    /// Uses a dedicated sandbox when `sandbox_root` is set, otherwise the
    /// process-wide one.
    #[must_use]
    pub fn from_config(config: HarnessConfig) -> Self {
        let sandbox = match &config.sandbox_root {
            Some(root) => Arc::new(StorageSandbox::new(root)),
            None => StorageSandbox::process_wide(),
        };
        Self::new(config, sandbox)
    }

    /// Harness configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Sandbox the harness resolves directories in
    #[inline]
    #[must_use]
    pub fn sandbox(&self) -> &Arc<StorageSandbox> {
        &self.sandbox
    }

    /// Report of the most recent run that reached the body
    ///
    /// Also set when the body failed or panicked.
    #[inline]
    #[must_use]
    pub fn last_report(&self) -> Option<&TeardownReport> {
        self.last_report.as_ref()
    }

    /// Run a synchronous test body against a fresh database
    ///
    /// A panic inside `body` is resumed on the caller after teardown.
    ///
    /// # Errors
    /// Returns [`HarnessError::TestBody`] if `body` fails, or another
    /// [`HarnessError`] if the isolated environment cannot be set up
    pub fn run<F>(&mut self, identity: &str, body: F) -> Result<TeardownReport, HarnessError>
    where
        F: FnOnce(&DocumentStore, &NativeStorage) -> anyhow::Result<()> + Send,
    {
        let mut session = self.begin(identity)?;
        let mut host = ThreadHost::new(identity);

        session.lifecycle.advance(LifecycleState::BodyExecuting)?;
        let completion = {
            let (store, storage) = (&session.store, &session.storage);
            host.run(UnitOfWork::sync(move || body(store, storage)))
        };

        self.finish(session, host, completion)
    }

    /// Run an asynchronous test body against a fresh database
    ///
    /// The body is awaited to completion on the host's execution context
    /// before the database is closed.
    ///
    /// ```rust,ignore
    /// harness.run_async("async_case", |store, _storage| {
    ///     Box::pin(async move {
    ///         tokio::task::yield_now().await;
    ///         store.insert(&document)?;
    ///         Ok(())
    ///     })
    /// })?;
    /// ```
    ///
    /// # Errors
    /// Same as [`Self::run`]
    pub fn run_async<F>(&mut self, identity: &str, body: F) -> Result<TeardownReport, HarnessError>
    where
        F: for<'a> FnOnce(&'a DocumentStore, &'a NativeStorage) -> LocalBoxFuture<'a, anyhow::Result<()>>
            + Send,
    {
        let mut session = self.begin(identity)?;
        let mut host = ThreadHost::new(identity);

        session.lifecycle.advance(LifecycleState::BodyExecuting)?;
        let completion = {
            let (store, storage) = (&session.store, &session.storage);
            host.run(UnitOfWork::Async(Box::new(move || body(store, storage))))
        };

        self.finish(session, host, completion)
    }

    fn begin(&self, identity: &str) -> Result<Session, HarnessError> {
        let mut lifecycle = Lifecycle::new();

        let storage = self.sandbox.directory_for(identity)?;
        lifecycle.advance(LifecycleState::DirectoryResolved)?;

        let store = DocumentStore::open(&storage, &self.config.client_label)?;
        lifecycle.advance(LifecycleState::DatabaseOpen)?;

        info!(
            identity,
            path = %storage.full_path(store.filename()).display(),
            "running test using database file"
        );

        Ok(Session {
            identity: identity.to_owned(),
            lifecycle,
            storage,
            store,
        })
    }

    fn finish(
        &mut self,
        session: Session,
        mut host: ThreadHost,
        completion: Result<Completion, HostError>,
    ) -> Result<TeardownReport, HarnessError> {
        let Session {
            identity,
            mut lifecycle,
            storage,
            store,
        } = session;
        let filename = store.filename().to_owned();
        let database_path = store.path().to_path_buf();
        debug!(identity = %identity, from = ?lifecycle.state(), "tearing down");

        store.close();
        lifecycle.advance(LifecycleState::DatabaseClosed)?;

        let size_before_compaction = file_size(&storage, &filename);
        info!(identity = %identity, bytes = size_before_compaction, "final database size");

        let compacted = if self.config.compact_on_teardown {
            match DocumentStore::compact_file(&database_path) {
                Ok(compacted) => compacted,
                Err(err) => {
                    warn!(identity = %identity, error = %err, "database compaction failed");
                    false
                }
            }
        } else {
            debug!(identity = %identity, "compaction disabled");
            false
        };
        lifecycle.advance(LifecycleState::Compacted)?;

        let size_after_compaction = file_size(&storage, &filename);
        info!(identity = %identity, bytes = size_after_compaction, "final database size after compaction");

        if let Err(err) = host.dispose() {
            warn!(identity = %identity, error = %err, "host dispose failed");
        }
        lifecycle.advance(LifecycleState::Disposed)?;

        let body_succeeded = matches!(completion, Ok(Completion::Succeeded));
        let report = TeardownReport {
            identity,
            directory: storage.root().to_path_buf(),
            database_path,
            size_before_compaction,
            size_after_compaction,
            compacted,
            body_succeeded,
            states: lifecycle.into_visited(),
        };
        if let Ok(json) = report.to_json() {
            debug!(report = %json, "teardown report");
        }
        self.last_report = Some(report.clone());

        match completion? {
            Completion::Succeeded => Ok(report),
            Completion::Failed(err) => Err(HarnessError::TestBody(err)),
            Completion::Panicked(payload) => std::panic::resume_unwind(payload),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        crate::logging::init();
        Self::from_config(HarnessConfig::from_env())
    }
}

/// Size of `filename` in `storage`, or 0 if it cannot be read
///
/// The database may still be locked by the platform right after close; a
/// failed read is recorded as 0 and never fails the test.
fn file_size(storage: &NativeStorage, filename: &str) -> u64 {
    let measured = storage
        .get_stream(filename)
        .and_then(|stream| stream.map_or(Ok(0), |file| file.metadata().map(|m| m.len())));
    match measured {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(filename, error = %err, "database size unavailable");
            0
        }
    }
}
