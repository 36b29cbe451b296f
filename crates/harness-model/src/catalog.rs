//! Catalog domain types
//!
//! A [`CatalogGraph`] is one [`CatalogEntry`] with its [`Variant`]s and
//! [`FileAsset`]s. Children refer to the entry by id rather than by pointer,
//! so the graph persists as three flat collections.

use harness_store::{Document, DocumentStore, StoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::ContentHash;

/// Rule-set a variant is defined against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSource {
    /// Numeric identifier
    pub id: u32,
    /// Short machine-facing name
    pub short_name: String,
    /// Human-facing name
    pub name: String,
    /// Whether the rule-set can be used
    pub available: bool,
}

/// Free-text metadata of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Display title
    pub title: String,
    /// Credited author
    pub artist: String,
}

/// Parent of a catalog graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Entry id
    pub id: Uuid,
    /// Descriptive metadata
    pub metadata: EntryMetadata,
}

/// One variant of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant id
    pub id: Uuid,
    /// Back-reference to the owning [`CatalogEntry`]
    pub entry_id: Uuid,
    /// Position within the entry, starting at 0
    pub position: usize,
    /// Display label
    pub label: String,
    /// Rule-set the variant is defined against
    pub source: VariantSource,
}

/// Whether a file belongs to a specific variant or to the entry as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FileRole {
    /// Definition file of one variant
    Primary,
    /// Shared supporting file
    Auxiliary,
}

/// A named file attached to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    /// Owning entry
    pub entry_id: Uuid,
    /// Name the entry refers to the file by
    pub filename: String,
    /// Hash of the file content
    pub hash: ContentHash,
    /// Primary or auxiliary
    pub role: FileRole,
}

impl Document for CatalogEntry {
    const COLLECTION: &'static str = "catalog_entries";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for Variant {
    const COLLECTION: &'static str = "variants";

    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Document for FileAsset {
    const COLLECTION: &'static str = "file_assets";

    fn key(&self) -> String {
        self.hash.to_string()
    }
}

/// An entry together with its variants and files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogGraph {
    /// Parent entry
    pub entry: CatalogEntry,
    /// Variants in position order
    pub variants: Vec<Variant>,
    /// Primary files first, then auxiliary files
    pub files: Vec<FileAsset>,
}

impl CatalogGraph {
    /// Files with the given role
    pub fn files_with_role(&self, role: FileRole) -> impl Iterator<Item = &FileAsset> {
        self.files.iter().filter(move |f| f.role == role)
    }

    /// Write the whole graph in one transaction
    ///
    /// # Errors
    /// Returns an error if any write fails; nothing is committed then
    pub fn persist(&self, store: &DocumentStore) -> Result<(), StoreError> {
        store.write(|batch| {
            batch.put(&self.entry)?;
            for variant in &self.variants {
                batch.put(variant)?;
            }
            for file in &self.files {
                batch.put(file)?;
            }
            Ok(())
        })
    }

    /// Read back the graph rooted at `entry_id`
    ///
    /// Variants come back in position order and files ordered by role, then
    /// filename. Returns `None` when the entry does not exist.
    ///
    /// # Errors
    /// Returns an error if a read or decode fails
    pub fn load(store: &DocumentStore, entry_id: Uuid) -> Result<Option<Self>, StoreError> {
        let Some(entry) = store.get::<CatalogEntry>(&entry_id.to_string())? else {
            return Ok(None);
        };

        let mut variants: Vec<Variant> = store
            .all::<Variant>()?
            .into_iter()
            .filter(|v| v.entry_id == entry_id)
            .collect();
        variants.sort_by_key(|v| v.position);

        let mut files: Vec<FileAsset> = store
            .all::<FileAsset>()?
            .into_iter()
            .filter(|f| f.entry_id == entry_id)
            .collect();
        files.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.filename.cmp(&b.filename)));

        Ok(Some(Self {
            entry,
            variants,
            files,
        }))
    }
}
