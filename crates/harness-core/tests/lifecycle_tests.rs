use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use harness_core::{test_identity, HarnessConfig, HarnessError, LifecycleState, TestHarness};
use harness_model::{
    build_catalog_graph, build_variant_source, CatalogEntry, CatalogGraph, FileAsset, Variant,
};
use harness_store::{Document, DocumentStore, NativeStorage, Storage};
use harness_test_utils::{
    assert_entry_count, assert_file_asset_count, assert_graph_shape, assert_variant_count,
    temp_harness, temp_harness_with,
};
use pretty_assertions::assert_eq;

fn reopen(harness: &TestHarness, directory: &std::path::Path) -> DocumentStore {
    DocumentStore::open(&NativeStorage::new(directory), &harness.config().client_label).unwrap()
}

#[test]
fn test_persisted_graph_is_readable_after_teardown() {
    let (mut harness, _dir) = temp_harness();
    let graph = build_catalog_graph(&build_variant_source());
    assert_graph_shape(&graph);
    let entry_id = graph.entry.id;

    let report = harness
        .run("persist_and_reopen", |store, _storage| {
            graph.persist(store)?;
            Ok(())
        })
        .unwrap();

    let store = reopen(&harness, &report.directory);
    assert_entry_count(&store, 1);
    assert_variant_count(&store, 4);
    assert_file_asset_count(&store, 12);

    let loaded = CatalogGraph::load(&store, entry_id).unwrap().unwrap();
    assert_eq!(loaded.variants, graph.variants);
    store.close();
}

#[test]
fn test_successful_run_visits_every_state_once() {
    let (mut harness, _dir) = temp_harness();

    let report = harness.run("every_state", |_store, _storage| Ok(())).unwrap();

    assert_eq!(report.states, LifecycleState::ALL.to_vec());
    assert_eq!(report.final_state(), Some(LifecycleState::Disposed));
    assert!(report.body_succeeded);
    assert_eq!(harness.last_report(), Some(&report));
}

#[test]
fn test_distinct_identities_are_isolated() {
    let (mut harness, _dir) = temp_harness();
    let graph = build_catalog_graph(&build_variant_source());

    let first = harness
        .run("isolation_writer", |store, _storage| {
            graph.persist(store)?;
            Ok(())
        })
        .unwrap();
    let second = harness
        .run("isolation_reader", |store, _storage| {
            anyhow::ensure!(store.count::<CatalogEntry>()? == 0, "saw another test's data");
            Ok(())
        })
        .unwrap();

    assert_ne!(first.directory, second.directory);
    assert_ne!(first.database_path, second.database_path);
    assert_eq!(
        harness.sandbox().known_identities(),
        vec!["isolation_reader".to_owned(), "isolation_writer".to_owned()]
    );
}

#[test]
fn test_same_identity_reuses_directory() {
    let (mut harness, _dir) = temp_harness();
    let graph = build_catalog_graph(&build_variant_source());

    let first = harness
        .run("rerun", |store, _storage| {
            graph.persist(store)?;
            Ok(())
        })
        .unwrap();
    let second = harness
        .run("rerun", |store, _storage| {
            anyhow::ensure!(store.count::<CatalogEntry>()? == 1);
            Ok(())
        })
        .unwrap();

    assert_eq!(first.directory, second.directory);
}

/// Persist `graphs` fixture graphs one transaction each, then delete every
/// document belonging to the first `deleted` of them
fn churn(store: &DocumentStore, graphs: usize, deleted: usize) -> anyhow::Result<()> {
    let source = build_variant_source();
    let built: Vec<CatalogGraph> = (0..graphs).map(|_| build_catalog_graph(&source)).collect();
    for graph in &built {
        graph.persist(store)?;
    }
    for graph in built.iter().take(deleted) {
        store.write(|batch| {
            batch.remove::<CatalogEntry>(&graph.entry.key())?;
            for variant in &graph.variants {
                batch.remove::<Variant>(&variant.key())?;
            }
            for file in &graph.files {
                batch.remove::<FileAsset>(&file.key())?;
            }
            Ok(())
        })?;
    }
    Ok(())
}

#[test]
fn test_compaction_does_not_grow_file() {
    let (mut harness, _dir) = temp_harness();

    for (graphs, deleted) in [(1, 0), (50, 0), (100, 0), (200, 0), (200, 180)] {
        let identity = format!("compaction_{graphs}_{deleted}");
        let report = harness
            .run(&identity, |store, _storage| churn(store, graphs, deleted))
            .unwrap();

        assert!(report.size_before_compaction > 0, "{identity}: empty file");
        assert!(
            report.size_after_compaction <= report.size_before_compaction,
            "{identity}: grew from {} to {}",
            report.size_before_compaction,
            report.size_after_compaction
        );

        let store = reopen(&harness, &report.directory);
        assert_entry_count(&store, (graphs - deleted) as u64);
        assert_variant_count(&store, 4 * (graphs - deleted) as u64);
        assert_file_asset_count(&store, 12 * (graphs - deleted) as u64);
        store.close();
    }
}

#[test]
fn test_second_compaction_keeps_size() {
    let (mut harness, _dir) = temp_harness();

    let first = harness
        .run("recompaction", |store, _storage| churn(store, 100, 50))
        .unwrap();
    let second = harness.run("recompaction", |_store, _storage| Ok(())).unwrap();

    assert!(second.size_after_compaction <= second.size_before_compaction);
    if !second.compacted {
        assert_eq!(second.size_after_compaction, second.size_before_compaction);
    }
    assert_eq!(first.database_path, second.database_path);
}

#[test]
fn test_compaction_can_be_disabled() {
    let (mut harness, _dir) = temp_harness_with(HarnessConfig::new().with_compaction(false));

    let report = harness
        .run("no_compaction", |store, _storage| {
            build_catalog_graph(&build_variant_source()).persist(store)?;
            Ok(())
        })
        .unwrap();

    assert!(!report.compacted);
    assert_eq!(report.size_before_compaction, report.size_after_compaction);
    assert_eq!(report.final_state(), Some(LifecycleState::Disposed));
}

#[test]
fn test_body_storage_is_scoped_to_test_directory() {
    let (mut harness, dir) = temp_harness();

    let report = harness
        .run("scoped_storage", |store, storage| {
            anyhow::ensure!(storage.root() == dir.path().join("scoped_storage"));
            anyhow::ensure!(storage.exists(store.filename()));
            std::fs::write(storage.full_path("attachment.bin"), b"payload")?;
            Ok(())
        })
        .unwrap();

    assert!(report.directory.join("attachment.bin").exists());
    assert_eq!(report.database_path, report.directory.join("client.redb"));
}

#[test]
fn test_body_error_still_tears_down() {
    let (mut harness, _dir) = temp_harness();

    let err = harness
        .run("sync_failure", |store, _storage| {
            build_catalog_graph(&build_variant_source()).persist(store)?;
            anyhow::bail!("expected failure")
        })
        .unwrap_err();

    assert!(err.is_test_failure());
    assert!(err.to_string().contains("expected failure"));

    let report = harness.last_report().unwrap().clone();
    assert!(!report.body_succeeded);
    assert_eq!(report.states, LifecycleState::ALL.to_vec());

    let store = reopen(&harness, &report.directory);
    assert_entry_count(&store, 1);
    store.close();
}

#[test]
fn test_async_body_runs_to_completion_before_close() {
    let (mut harness, _dir) = temp_harness();
    let graph = build_catalog_graph(&build_variant_source());

    let report = harness
        .run_async("async_persist", |store, _storage| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                graph.persist(store)?;
                tokio::task::yield_now().await;
                Ok(())
            })
        })
        .unwrap();

    let store = reopen(&harness, &report.directory);
    assert_entry_count(&store, 1);
    assert_variant_count(&store, 4);
    assert_file_asset_count(&store, 12);
    store.close();
}

#[test]
fn test_async_failure_reaches_disposed() {
    let (mut harness, _dir) = temp_harness();

    let result = harness.run_async("async_failure", |_store, _storage| {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Err(anyhow::anyhow!("async body failed"))
        })
    });

    assert!(matches!(result, Err(HarnessError::TestBody(_))));
    let report = harness.last_report().unwrap();
    assert_eq!(report.final_state(), Some(LifecycleState::Disposed));

    // the database file is released: it can be opened and closed again
    let store = reopen(&harness, &report.directory);
    store.close();
    NativeStorage::new(report.directory.parent().unwrap())
        .delete_directory("async_failure")
        .unwrap();
}

#[test]
fn test_panic_is_resumed_after_teardown() {
    let (mut harness, _dir) = temp_harness();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        harness.run("sync_panic", |_store, _storage| {
            panic!("assertion failed inside body");
        })
    }));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"assertion failed inside body"));

    let report = harness.last_report().unwrap();
    assert_eq!(report.states, LifecycleState::ALL.to_vec());
    assert!(!report.body_succeeded);

    let store = reopen(&harness, &report.directory);
    store.close();
}

#[test]
fn test_async_panic_is_resumed_after_teardown() {
    let (mut harness, _dir) = temp_harness();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        harness.run_async("async_panic", |store, _storage| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                build_catalog_graph(&build_variant_source()).persist(store)?;
                if store.count::<CatalogEntry>()? == 1 {
                    panic!("assertion failed inside async body");
                }
                Ok(())
            })
        })
    }));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"assertion failed inside async body"));

    let report = harness.last_report().unwrap();
    assert_eq!(report.states, LifecycleState::ALL.to_vec());
    assert!(!report.body_succeeded);

    let store = reopen(&harness, &report.directory);
    assert_entry_count(&store, 1);
    store.close();
}

#[test]
fn test_invalid_identity_never_reaches_body() {
    let (mut harness, _dir) = temp_harness();

    let result = harness.run("../escape", |_store, _storage| {
        panic!("body must not run");
    });

    assert!(matches!(result, Err(HarnessError::Sandbox(_))));
    assert!(harness.last_report().is_none());
}

#[test]
fn test_identity_macro_keys_directory() {
    let (mut harness, dir) = temp_harness();
    let identity = test_identity!();

    let report = harness.run(&identity, |_store, _storage| Ok(())).unwrap();

    assert_eq!(identity, "lifecycle_tests.test_identity_macro_keys_directory");
    assert_eq!(report.directory, dir.path().join(&identity));
}
