//! Harness Store
//!
//! File-backed document storage for isolated persistence tests.
//!
//! # Overview
//!
//! - **Storage**: directory-scoped file accessor (`NativeStorage`)
//! - **DocumentStore**: JSON documents in a single [redb](https://docs.rs/redb) file
//! - **Document**: trait binding a type to its collection and key
//!
//! # Example
//!
//! ```rust,ignore
//! use harness_store::{DocumentStore, NativeStorage, Storage};
//!
//! let storage = NativeStorage::new("/tmp/example").storage_for_directory("case")?;
//! let store = DocumentStore::open(&storage, "client")?;
//! store.insert(&my_document)?;
//! let path = store.path().to_path_buf();
//! store.close();
//! DocumentStore::compact_file(&path)?;
//! ```

pub mod document;
pub mod error;
pub mod storage;

// Re-exports
pub use document::{database_filename, Document, DocumentStore, WriteBatch, DATABASE_EXTENSION};
pub use error::StoreError;
pub use storage::{NativeStorage, Storage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
