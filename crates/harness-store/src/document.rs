//! JSON document store on top of redb
//!
//! Each [`Document`] type lives in its own redb table named after its
//! collection. Values are the document's JSON encoding, keyed by
//! [`Document::key`].
//!
//! # File Layout
//!
//! Opening a store with label `client` inside a storage creates
//! `<storage root>/client.redb`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError, TableHandle,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::storage::Storage;

/// Extension of every database file created by [`DocumentStore::open`]
pub const DATABASE_EXTENSION: &str = "redb";

/// Backing filename for a logical database label
#[must_use]
pub fn database_filename(label: &str) -> String {
    format!("{label}.{DATABASE_EXTENSION}")
}

/// A type persisted as a JSON document
pub trait Document: Serialize + DeserializeOwned {
    /// Collection (table) name
    const COLLECTION: &'static str;

    /// Primary key, unique within the collection
    fn key(&self) -> String;
}

fn table_of<D: Document>() -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(D::COLLECTION)
}

/// Handle to an open database file
///
/// Owned by whoever opened it. [`DocumentStore::close`] consumes the handle,
/// so a closed store cannot be used or closed again.
#[derive(Debug)]
pub struct DocumentStore {
    db: Database,
    label: String,
    filename: String,
    path: PathBuf,
}

impl DocumentStore {
    /// Open (or create) the database `label` inside `storage`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or is locked
    #[instrument(skip(storage), fields(root = %storage.root().display()))]
    pub fn open(storage: &impl Storage, label: &str) -> Result<Self, StoreError> {
        let filename = database_filename(label);
        let path = storage.full_path(&filename);

        let db = Database::create(&path)?;
        debug!(path = %path.display(), "database opened");

        Ok(Self {
            db,
            label: label.to_owned(),
            filename,
            path,
        })
    }

    /// Logical label the store was opened with
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Backing filename relative to the storage root
    #[inline]
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Absolute path of the backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace a single document
    ///
    /// # Errors
    /// Returns an error if encoding or the write transaction fails
    pub fn insert<D: Document>(&self, document: &D) -> Result<(), StoreError> {
        self.write(|batch| batch.put(document))
    }

    /// Insert or replace several documents in one transaction
    ///
    /// # Errors
    /// Returns an error if any document fails; nothing is committed then
    pub fn insert_all<'a, D, I>(&self, documents: I) -> Result<usize, StoreError>
    where
        D: Document + 'a,
        I: IntoIterator<Item = &'a D>,
    {
        self.write(|batch| {
            let mut written = 0;
            for document in documents {
                batch.put(document)?;
                written += 1;
            }
            Ok(written)
        })
    }

    /// Run `f` inside a single write transaction
    ///
    /// The transaction commits only if `f` returns `Ok`.
    ///
    /// # Errors
    /// Returns the error from `f` or from the commit
    pub fn write<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut WriteBatch<'_>) -> Result<R, StoreError>,
    {
        let txn = self.db.begin_write()?;
        let out = {
            let mut batch = WriteBatch { txn: &txn };
            f(&mut batch)?
        };
        txn.commit()?;
        Ok(out)
    }

    /// Fetch one document by key
    ///
    /// # Errors
    /// Returns an error if the read or decoding fails
    pub fn get<D: Document>(&self, key: &str) -> Result<Option<D>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table_of::<D>()) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All documents of a collection, in key order
    ///
    /// # Errors
    /// Returns an error if the read or decoding fails
    pub fn all<D: Document>(&self) -> Result<Vec<D>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table_of::<D>()) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut documents = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            documents.push(serde_json::from_slice(value.value())?);
        }
        Ok(documents)
    }

    /// Number of documents in a collection
    ///
    /// # Errors
    /// Returns an error if the read fails
    pub fn count<D: Document>(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read()?;
        match txn.open_table(table_of::<D>()) {
            Ok(table) => Ok(table.len()?),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove one document by key, returning whether it existed
    ///
    /// # Errors
    /// Returns an error if the write transaction fails
    pub fn remove<D: Document>(&self, key: &str) -> Result<bool, StoreError> {
        self.write(|batch| batch.remove::<D>(key))
    }

    /// Close the database, releasing the file
    pub fn close(self) {
        let Self { db, path, .. } = self;
        drop(db);
        debug!(path = %path.display(), "database closed");
    }

    /// Compact a closed database file in place
    ///
    /// The live tables are rebuilt into a fresh sibling file, which replaces
    /// the original only when it is strictly smaller. Otherwise the original
    /// bytes are restored, so the file never grows. Returns whether the file
    /// was replaced.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened (for example while it
    /// is still held open elsewhere), the rebuild fails, or the files cannot
    /// be swapped
    #[instrument]
    pub fn compact_file(path: &Path) -> Result<bool, StoreError> {
        let before = file_len(path)?;
        let backup = sibling(path, "bak");
        let rebuilt = sibling(path, "tmp");
        remove_if_exists(&rebuilt)?;
        fs::copy(path, &backup).map_err(|e| StoreError::io(&backup, e))?;

        // Opening takes the file lock, so a file still in use is refused here
        // before anything is swapped.
        let source = match Database::open(path) {
            Ok(db) => db,
            Err(err) => {
                remove_if_exists(&backup)?;
                return Err(err.into());
            }
        };
        let copied = rebuild_into(&source, &rebuilt);
        drop(source);

        let after = match copied.and_then(|()| file_len(&rebuilt)) {
            Ok(len) => len,
            Err(err) => {
                remove_if_exists(&rebuilt)?;
                replace(&backup, path)?;
                return Err(err);
            }
        };

        let compacted = after < before;
        if compacted {
            replace(&rebuilt, path)?;
            remove_if_exists(&backup)?;
        } else {
            remove_if_exists(&rebuilt)?;
            replace(&backup, path)?;
        }
        debug!(before, after, compacted, "compaction finished");
        Ok(compacted)
    }
}

/// Copy every table of `source` into a new database at `target`
fn rebuild_into(source: &Database, target: &Path) -> Result<(), StoreError> {
    let mut fresh = Database::create(target)?;
    let read = source.begin_read()?;
    let write = fresh.begin_write()?;
    for handle in read.list_tables()? {
        let definition: TableDefinition<'_, &'static str, &'static [u8]> =
            TableDefinition::new(handle.name());
        let from = read.open_table(definition)?;
        let mut to = write.open_table(definition)?;
        for entry in from.iter()? {
            let (key, value) = entry?;
            to.insert(key.value(), value.value())?;
        }
    }
    write.commit()?;
    fresh.compact()?;
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn file_len(path: &Path) -> Result<u64, StoreError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| StoreError::io(path, e))
}

fn replace(from: &Path, to: &Path) -> Result<(), StoreError> {
    fs::rename(from, to).map_err(|e| StoreError::io(to, e))
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::io(path, err)),
    }
}

/// Writes staged inside [`DocumentStore::write`]
pub struct WriteBatch<'t> {
    txn: &'t WriteTransaction,
}

impl WriteBatch<'_> {
    /// Insert or replace a document
    ///
    /// # Errors
    /// Returns an error if encoding or the table write fails
    pub fn put<D: Document>(&mut self, document: &D) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(document)?;
        let key = document.key();
        let mut table = self.txn.open_table(table_of::<D>())?;
        table.insert(key.as_str(), bytes.as_slice())?;
        Ok(())
    }

    /// Remove a document, returning whether it existed
    ///
    /// # Errors
    /// Returns an error if the table write fails
    pub fn remove<D: Document>(&mut self, key: &str) -> Result<bool, StoreError> {
        let mut table = self.txn.open_table(table_of::<D>())?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NativeStorage;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        body: String,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn key(&self) -> String {
            format!("{:08}", self.id)
        }
    }

    fn note(id: u32) -> Note {
        Note {
            id,
            body: format!("note {id}"),
        }
    }

    #[test]
    fn filename_derives_from_label() {
        assert_eq!(database_filename("client"), "client.redb");
    }

    #[test]
    fn empty_collection_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();

        assert_eq!(store.count::<Note>().unwrap(), 0);
        assert!(store.all::<Note>().unwrap().is_empty());
        assert!(store.get::<Note>("00000001").unwrap().is_none());
    }

    #[test]
    fn insert_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();

        store.insert(&note(1)).unwrap();

        assert_eq!(store.get::<Note>("00000001").unwrap(), Some(note(1)));
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn insert_all_returns_count_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();
        let notes = vec![note(3), note(1), note(2)];

        assert_eq!(store.insert_all(&notes).unwrap(), 3);

        let ids: Vec<u32> = store.all::<Note>().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn failed_write_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();

        let result: Result<(), StoreError> = store.write(|batch| {
            batch.put(&note(1))?;
            Err(StoreError::io(
                "synthetic",
                std::io::Error::new(std::io::ErrorKind::Other, "abort"),
            ))
        });

        assert!(result.is_err());
        assert_eq!(store.count::<Note>().unwrap(), 0);
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();
        store.insert(&note(7)).unwrap();

        assert!(store.remove::<Note>("00000007").unwrap());
        assert!(!store.remove::<Note>("00000007").unwrap());
    }

    #[test]
    fn compact_requires_closed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();
        store.insert(&note(1)).unwrap();
        let path = store.path().to_path_buf();

        assert!(DocumentStore::compact_file(&path).is_err());
        assert!(!dir.path().join("client.redb.bak").exists());

        store.close();
        assert!(DocumentStore::compact_file(&path).is_ok());
    }

    fn file_len_of(path: &Path) -> u64 {
        fs::metadata(path).unwrap().len()
    }

    /// One transaction per note, then `removed` of them deleted one by one
    fn churned_store(dir: &Path, inserted: u32, removed: u32) -> PathBuf {
        let store = DocumentStore::open(&NativeStorage::new(dir), "client").unwrap();
        for id in 0..inserted {
            store.insert(&note(id)).unwrap();
        }
        for id in 0..removed {
            store.remove::<Note>(&note(id).key()).unwrap();
        }
        let path = store.path().to_path_buf();
        store.close();
        path
    }

    #[test]
    fn compaction_never_grows_file() {
        for (inserted, removed) in [(1, 0), (50, 0), (400, 0), (1000, 0), (1000, 900)] {
            let dir = tempfile::tempdir().unwrap();
            let path = churned_store(dir.path(), inserted, removed);
            let before = file_len_of(&path);

            DocumentStore::compact_file(&path).unwrap();

            let after = file_len_of(&path);
            assert!(after <= before, "{inserted}/{removed}: grew from {before} to {after}");

            let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();
            assert_eq!(store.count::<Note>().unwrap(), u64::from(inserted - removed));
            store.close();
        }
    }

    #[test]
    fn repeated_compaction_leaves_size_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = churned_store(dir.path(), 300, 100);

        DocumentStore::compact_file(&path).unwrap();
        let settled = file_len_of(&path);
        let compacted_again = DocumentStore::compact_file(&path).unwrap();

        if !compacted_again {
            assert_eq!(file_len_of(&path), settled);
        }
        assert!(file_len_of(&path) <= settled);
        assert!(!dir.path().join("client.redb.tmp").exists());
        assert!(!dir.path().join("client.redb.bak").exists());
    }

    #[test]
    fn compaction_keeps_every_collection() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Tag(String);

        impl Document for Tag {
            const COLLECTION: &'static str = "tags";

            fn key(&self) -> String {
                self.0.clone()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = churned_store(dir.path(), 200, 150);
        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();
        store.insert(&Tag("kept".to_owned())).unwrap();
        store.close();

        DocumentStore::compact_file(&path).unwrap();

        let store = DocumentStore::open(&NativeStorage::new(dir.path()), "client").unwrap();
        assert_eq!(store.get::<Tag>("kept").unwrap(), Some(Tag("kept".to_owned())));
        assert_eq!(store.get::<Note>("00000199").unwrap(), Some(note(199)));
        assert_eq!(store.count::<Note>().unwrap(), 50);
        store.close();
    }
}
