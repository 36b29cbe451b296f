//! Harness Model
//!
//! Catalog domain types and the fixture builders that produce them.
//!
//! # Example
//!
//! ```rust
//! use harness_model::{build_catalog_graph, build_variant_source, FileRole};
//!
//! let graph = build_catalog_graph(&build_variant_source());
//! assert_eq!(graph.variants.len(), 4);
//! assert_eq!(graph.files_with_role(FileRole::Auxiliary).count(), 8);
//! ```

pub mod catalog;
pub mod fixtures;
pub mod hash;

// Re-exports
pub use catalog::{CatalogEntry, CatalogGraph, EntryMetadata, FileAsset, FileRole, Variant, VariantSource};
pub use fixtures::{
    auxiliary_filename, build_catalog_graph, build_variant_source, create_file_asset,
    primary_filename, AUXILIARY_FILE_COUNT, VARIANT_LABELS,
};
pub use hash::{ContentHash, HashError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
