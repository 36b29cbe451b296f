//! Storage sandbox
//!
//! One root directory per sandbox, wiped on first use, with a child
//! directory per test identity. Test directories are never deleted by the
//! harness; they stay for post-mortem inspection until the next process
//! wipes the root.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use harness_store::{NativeStorage, Storage};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::error::SandboxError;

static PROCESS_WIDE: OnceCell<Arc<StorageSandbox>> = OnceCell::new();

/// Isolated per-test directories below a single root
#[derive(Debug)]
pub struct StorageSandbox {
    root: PathBuf,
    initialized: Mutex<bool>,
    directories: DashMap<String, PathBuf>,
}

impl StorageSandbox {
    /// Create an uninitialized sandbox rooted at `root`
    ///
    /// Nothing touches the filesystem until [`Self::initialize`] or
    /// [`Self::directory_for`] is called. Two sandboxes sharing a root will
    /// wipe each other's directories; use [`Self::process_wide`] to share one.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: Mutex::new(false),
            directories: DashMap::new(),
        }
    }

    /// The sandbox shared by the whole process
    ///
    /// Rooted at [`HarnessConfig::from_env`]'s resolved root, read once.
    pub fn process_wide() -> Arc<Self> {
        PROCESS_WIDE
            .get_or_init(|| Arc::new(Self::new(HarnessConfig::from_env().resolved_sandbox_root())))
            .clone()
    }

    /// Sandbox root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root has been wiped yet
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }

    /// Create the root and delete everything inside it, once
    ///
    /// # Errors
    /// Returns [`SandboxError::Io`] if the root cannot be created or emptied.
    /// A failed initialization is retried on the next call.
    pub fn initialize(&self) -> Result<(), SandboxError> {
        let mut initialized = self.initialized.lock();
        if *initialized {
            return Ok(());
        }

        fs::create_dir_all(&self.root).map_err(|e| SandboxError::io(&self.root, e))?;
        let entries = fs::read_dir(&self.root).map_err(|e| SandboxError::io(&self.root, e))?;
        let mut removed = 0usize;
        for entry in entries {
            let path = entry.map_err(|e| SandboxError::io(&self.root, e))?.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| SandboxError::io(&path, e))?;
            removed += 1;
        }

        *initialized = true;
        info!(root = %self.root.display(), removed, "sandbox initialized");
        Ok(())
    }

    /// Storage rooted at `<root>/<identity>`, created if absent
    ///
    /// Initializes the sandbox on first use. Repeated calls with the same
    /// identity return storages with the same root.
    ///
    /// # Errors
    /// Returns [`SandboxError::InvalidIdentity`] for identities that are
    /// empty, `.`/`..`, or contain path separators or NUL, and
    /// [`SandboxError::Io`] if the directory cannot be created
    pub fn directory_for(&self, identity: &str) -> Result<NativeStorage, SandboxError> {
        validate_identity(identity)?;
        self.initialize()?;

        let storage = NativeStorage::new(&self.root)
            .storage_for_directory(identity)
            .map_err(|e| SandboxError::io(self.root.join(identity), e))?;

        self.directories
            .entry(identity.to_owned())
            .or_insert_with(|| {
                debug!(identity, path = %storage.root().display(), "test directory created");
                storage.root().to_path_buf()
            });
        Ok(storage)
    }

    /// Identities that have been handed a directory, sorted
    #[must_use]
    pub fn known_identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = self.directories.iter().map(|e| e.key().clone()).collect();
        identities.sort();
        identities
    }
}

fn validate_identity(identity: &str) -> Result<(), SandboxError> {
    let invalid = identity.is_empty()
        || identity == "."
        || identity == ".."
        || identity.contains(['/', '\\', '\0']);
    if invalid {
        Err(SandboxError::InvalidIdentity(identity.to_owned()))
    } else {
        Ok(())
    }
}
