//! Testing utilities for the catalog harness workspace
//!
//! Shared harness constructors and catalog assertions.

#![allow(missing_docs)]

use std::sync::Arc;

use harness_core::{HarnessConfig, StorageSandbox, TestHarness};
use harness_model::{CatalogEntry, CatalogGraph, FileAsset, FileRole, Variant, VARIANT_LABELS};
use harness_store::DocumentStore;
use tempfile::TempDir;

/// A harness whose sandbox lives in a fresh temp dir
///
/// Keep the `TempDir` alive for as long as the harness is used.
pub fn temp_harness() -> (TestHarness, TempDir) {
    temp_harness_with(HarnessConfig::new())
}

pub fn temp_harness_with(config: HarnessConfig) -> (TestHarness, TempDir) {
    harness_core::logging::init();
    let dir = tempfile::tempdir().unwrap();
    let config = config.with_sandbox_root(dir.path());
    let sandbox = Arc::new(StorageSandbox::new(dir.path()));
    (TestHarness::new(config, sandbox), dir)
}

pub fn assert_entry_count(store: &DocumentStore, expected: u64) {
    assert_eq!(store.count::<CatalogEntry>().unwrap(), expected, "catalog entry count");
}

pub fn assert_variant_count(store: &DocumentStore, expected: u64) {
    assert_eq!(store.count::<Variant>().unwrap(), expected, "variant count");
}

pub fn assert_file_asset_count(store: &DocumentStore, expected: u64) {
    assert_eq!(store.count::<FileAsset>().unwrap(), expected, "file asset count");
}

/// Checks the fixed shape every built catalog graph must have
pub fn assert_graph_shape(graph: &CatalogGraph) {
    let labels: Vec<&str> = graph.variants.iter().map(|v| v.label.as_str()).collect();
    assert_eq!(labels, VARIANT_LABELS.to_vec());
    assert!(graph.variants.iter().all(|v| v.entry_id == graph.entry.id));
    assert_eq!(graph.files_with_role(FileRole::Primary).count(), 4);
    assert_eq!(graph.files_with_role(FileRole::Auxiliary).count(), 8);

    let mut hashes: Vec<_> = graph.files.iter().map(|f| f.hash).collect();
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), graph.files.len(), "file hashes must be distinct");
}
