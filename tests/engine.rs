//! End-to-end tests over a temporary filesystem store: config loading,
//! rebuild, atomic publication, and the full query pipeline.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use perk_harness::config::{load_config, Config};
use perk_harness::error::QueryError;
use perk_harness::index::IndexManager;
use perk_harness::models::Query;
use perk_harness::pipeline::{Pipeline, PipelineParams};
use perk_harness::store::DocumentStore;
use perk_harness::store_fs::FilesystemStore;

fn write_fixtures(docs_dir: &Path) {
    fs::create_dir_all(docs_dir).unwrap();
    fs::write(
        docs_dir.join("best_western.txt"),
        "Best Western Hotels\n\
         Save 20% off your stay at participating hotels.\n\
         Code: BW-SAVE20\n\
         How to use: book online or call with the code.\n\
         Bonus: free breakfast on weekends\n",
    )
    .unwrap();
    fs::write(
        docs_dir.join("marriott.txt"),
        "Marriott Hotels\n15% discount on hotel stays for employees.\n",
    )
    .unwrap();
    fs::write(
        docs_dir.join("staples.txt"),
        "Staples Office Supplies\n10% off office supplies in store.\n",
    )
    .unwrap();
    fs::write(
        docs_dir.join("chipotle.txt"),
        "Chipotle\n15% discount on meals at the restaurant.\n",
    )
    .unwrap();
    // Claims to be a PDF but is not; extraction must skip it without
    // failing the rebuild.
    fs::write(docs_dir.join("corrupt.pdf"), b"this is not a pdf").unwrap();
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let docs_dir = tmp.path().join("docs");
    write_fixtures(&docs_dir);

    let config_path = tmp.path().join("perk.toml");
    fs::write(
        &config_path,
        format!(
            r#"[store.filesystem]
root = "{}"
include_globs = ["**/*.txt", "**/*.pdf"]

[indexing]
max_concurrent = 4
max_retries = 0

[scoring]
min_score = 15.0
search_limit = 50
final_limit = 12

[pipeline]
timeout_ms = 5000
"#,
            docs_dir.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    (tmp, config)
}

fn engine(config: &Config) -> (Arc<IndexManager>, Pipeline) {
    let store = FilesystemStore::new(config.store.filesystem.as_ref().unwrap()).unwrap();
    let manager = Arc::new(IndexManager::new(
        Arc::new(store) as Arc<dyn DocumentStore>,
        &config.indexing,
    ));
    let pipeline = Pipeline::new(Arc::clone(&manager), PipelineParams::from_config(config));
    (manager, pipeline)
}

#[tokio::test]
async fn query_before_first_rebuild_is_not_ready() {
    let (_tmp, config) = setup();
    let (_manager, pipeline) = engine(&config);

    let err = pipeline
        .run(Query::new("hotel", None).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::IndexNotReady);
}

#[tokio::test]
async fn rebuild_skips_corrupt_document_and_indexes_the_rest() {
    let (_tmp, config) = setup();
    let (manager, _pipeline) = engine(&config);

    let snapshot = manager.rebuild().await.unwrap();

    assert_eq!(snapshot.records.len(), 4);
    assert!(snapshot.record("corrupt.pdf#0").is_none());
    assert_eq!(snapshot.diagnostics.len(), 1);
    assert_eq!(snapshot.diagnostics[0].document_id, "corrupt.pdf");

    let status = manager.status();
    assert!(status.ready);
    assert_eq!(status.generation, 1);
    assert_eq!(status.document_count, 4);
    assert_eq!(status.rebuild_error_count, 1);
    assert!(status.last_rebuild_time.is_some());
}

#[tokio::test]
async fn hotel_query_ranks_hotel_records_and_drops_staples() {
    let (_tmp, config) = setup();
    let (manager, pipeline) = engine(&config);
    manager.rebuild().await.unwrap();

    let result = pipeline
        .run(Query::new("hotel", None).unwrap())
        .await
        .unwrap();

    assert!(!result.degraded);
    assert_eq!(result.total_found, 2);
    let names: Vec<&str> = result.results.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"Best Western Hotels"));
    assert!(names.contains(&"Marriott Hotels"));
    assert!(!names.iter().any(|n| n.contains("Staples")));
}

#[tokio::test]
async fn exact_name_query_scores_100_and_ranks_first() {
    let (_tmp, config) = setup();
    let (manager, pipeline) = engine(&config);
    manager.rebuild().await.unwrap();

    let result = pipeline
        .run(Query::new("Best Western Hotels", None).unwrap())
        .await
        .unwrap();

    assert_eq!(result.results[0].name, "Best Western Hotels");
    assert_eq!(result.results[0].score, 100.0);
    assert_eq!(result.results[0].discount, "20%");
    assert_eq!(result.results[0].code.as_deref(), Some("BW-SAVE20"));
    assert_eq!(
        result.results[0].bonus.as_deref(),
        Some("free breakfast on weekends")
    );
}

#[tokio::test]
async fn dining_hint_boosts_dining_without_excluding_others() {
    let (_tmp, config) = setup();
    let (manager, pipeline) = engine(&config);
    manager.rebuild().await.unwrap();

    let result = pipeline
        .run(Query::new("discount", Some("dining".to_string())).unwrap())
        .await
        .unwrap();

    // Both the dining and non-dining matches are present; only the dining
    // one carries the +20 bias.
    assert_eq!(result.total_found, 2);
    assert_eq!(result.results[0].name, "Chipotle");
    assert_eq!(result.results[0].score, 80.0);
    assert_eq!(result.results[1].name, "Marriott Hotels");
    assert_eq!(result.results[1].score, 60.0);
}

#[tokio::test]
async fn identical_queries_are_idempotent() {
    let (_tmp, config) = setup();
    let (manager, pipeline) = engine(&config);
    manager.rebuild().await.unwrap();

    let query = Query::new("hotel discount", Some("Travel".to_string())).unwrap();
    let first = pipeline.run(query.clone()).await.unwrap();
    let second = pipeline.run(query).await.unwrap();

    assert_eq!(first.total_found, second.total_found);
    let names =
        |r: &perk_harness::models::PipelineResult| -> Vec<String> {
            r.results.iter().map(|i| i.name.clone()).collect()
        };
    let scores = |r: &perk_harness::models::PipelineResult| -> Vec<f64> {
        r.results.iter().map(|i| i.score).collect()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(scores(&first), scores(&second));
}

#[tokio::test]
async fn new_document_appears_only_after_refresh() {
    let (tmp, config) = setup();
    let (manager, pipeline) = engine(&config);
    manager.rebuild().await.unwrap();

    let held = manager.current().unwrap();

    fs::write(
        tmp.path().join("docs").join("hertz.txt"),
        "Hertz Rental Cars\n25% off car rentals for business travel.\n",
    )
    .unwrap();

    // Not visible until a rebuild publishes a new generation.
    let before = pipeline
        .run(Query::new("rental cars", None).unwrap())
        .await
        .unwrap();
    assert_eq!(before.total_found, 0);

    let gen2 = manager.rebuild().await.unwrap();
    assert_eq!(gen2.generation, 2);

    let after = pipeline
        .run(Query::new("rental cars", None).unwrap())
        .await
        .unwrap();
    assert_eq!(after.total_found, 1);
    assert_eq!(after.results[0].name, "Hertz Rental Cars");

    // The previously held snapshot is untouched by the swap.
    assert_eq!(held.generation, 1);
    assert!(held.record("hertz.txt#0").is_none());
}

#[tokio::test]
async fn unreachable_root_fails_rebuild_but_not_queries() {
    let (tmp, config) = setup();
    let (manager, pipeline) = engine(&config);
    manager.rebuild().await.unwrap();

    fs::remove_dir_all(tmp.path().join("docs")).unwrap();

    assert!(manager.rebuild().await.is_err());
    let status = manager.status();
    assert!(status.ready, "previous snapshot still serves");
    assert!(status.stale);

    let result = pipeline
        .run(Query::new("hotel", None).unwrap())
        .await
        .unwrap();
    assert_eq!(result.total_found, 2);
}

#[tokio::test]
async fn categories_reflect_indexed_records() {
    let (_tmp, config) = setup();
    let (manager, _pipeline) = engine(&config);

    let snapshot = manager.rebuild().await.unwrap();

    let travel = snapshot.by_category.get("Travel").unwrap();
    assert!(travel.contains("best_western.txt#0"));
    assert!(travel.contains("marriott.txt#0"));
    assert!(snapshot.by_category.get("Dining").unwrap().contains("chipotle.txt#0"));

    // Every bucket member resolves to a record with that category.
    for (category, members) in &snapshot.by_category {
        for id in members {
            assert_eq!(&snapshot.record(id).unwrap().category, category);
        }
    }
}
