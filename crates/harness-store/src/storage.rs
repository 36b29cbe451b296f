//! Directory-scoped storage accessors
//!
//! A [`Storage`] resolves filenames relative to its own root directory and
//! can hand out child storages for subdirectories.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// File access rooted at a single directory
pub trait Storage: Send + Sync {
    /// Root directory of this storage
    fn root(&self) -> &Path;

    /// Storage rooted at `<root>/<name>`, creating the directory if absent
    ///
    /// # Errors
    /// Returns the underlying error if the directory cannot be created
    fn storage_for_directory(&self, name: &str) -> io::Result<Self>
    where
        Self: Sized;

    /// Absolute path of `filename` inside this storage
    fn full_path(&self, filename: &str) -> PathBuf {
        self.root().join(filename)
    }

    /// Whether `filename` exists inside this storage
    fn exists(&self, filename: &str) -> bool {
        self.full_path(filename).exists()
    }

    /// Open `filename` for reading
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Returns any open error other than not-found
    fn get_stream(&self, filename: &str) -> io::Result<Option<File>> {
        match File::open(self.full_path(filename)) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Recursively delete the directory `path` inside this storage
    ///
    /// Deleting a directory that does not exist is a no-op.
    ///
    /// # Errors
    /// Returns the underlying error if removal fails
    fn delete_directory(&self, path: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.full_path(path)) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// [`Storage`] backed directly by the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStorage {
    root: PathBuf,
}

impl NativeStorage {
    /// Create a storage rooted at `root`
    ///
    /// The directory is not created until something is written below it.
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Storage for NativeStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn storage_for_directory(&self, name: &str) -> io::Result<Self> {
        let root = self.root.join(name);
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}
