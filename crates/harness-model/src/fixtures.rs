//! Fixture builders
//!
//! Pure constructors for catalog graphs used as test input. The shape of
//! every graph is fixed; ids and file hashes are fresh on every call.

use uuid::Uuid;

use crate::catalog::{CatalogEntry, CatalogGraph, EntryMetadata, FileAsset, FileRole, Variant, VariantSource};
use crate::hash::ContentHash;

/// Variant labels, in position order
pub const VARIANT_LABELS: [&str; 4] = ["Easy", "Normal", "Hard", "Insane"];

/// Number of auxiliary files attached to every built graph
pub const AUXILIARY_FILE_COUNT: usize = 8;

/// Filename of the primary file for a variant label
#[must_use]
pub fn primary_filename(label: &str) -> String {
    format!("entry [{}].chart", label.to_lowercase())
}

/// Filename of the auxiliary file at `index`
#[must_use]
pub fn auxiliary_filename(index: usize) -> String {
    format!("sample{index}.wav")
}

/// The rule-set every fixture variant is defined against
#[must_use]
pub fn build_variant_source() -> VariantSource {
    VariantSource {
        id: 0,
        short_name: "standard".to_owned(),
        name: "Standard".to_owned(),
        available: true,
    }
}

/// A file asset with a fresh random hash
#[must_use]
pub fn create_file_asset(entry_id: Uuid, filename: impl Into<String>, role: FileRole) -> FileAsset {
    FileAsset {
        entry_id,
        filename: filename.into(),
        hash: ContentHash::random(),
        role,
    }
}

/// One entry with four variants, four primary files and eight auxiliary files
#[must_use]
pub fn build_catalog_graph(source: &VariantSource) -> CatalogGraph {
    let entry = CatalogEntry {
        id: Uuid::new_v4(),
        metadata: EntryMetadata {
            title: "Lantern Road".to_owned(),
            artist: "Mira Holt".to_owned(),
        },
    };

    let variants = VARIANT_LABELS
        .iter()
        .enumerate()
        .map(|(position, label)| Variant {
            id: Uuid::new_v4(),
            entry_id: entry.id,
            position,
            label: (*label).to_owned(),
            source: source.clone(),
        })
        .collect();

    let primary = VARIANT_LABELS
        .iter()
        .map(|label| create_file_asset(entry.id, primary_filename(label), FileRole::Primary));
    let auxiliary = (0..AUXILIARY_FILE_COUNT)
        .map(|i| create_file_asset(entry.id, auxiliary_filename(i), FileRole::Auxiliary));
    let files = primary.chain(auxiliary).collect();

    CatalogGraph {
        entry,
        variants,
        files,
    }
}
