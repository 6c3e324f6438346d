//! Search flow tests
//!
//! Drive `search_datasets::handle` directly against the in-memory store and a
//! scripted provider, covering the local path, the backfill path and how filters
//! apply to both.

mod helpers;

use helpers::{listing_item, ScriptedProvider, TestApp};
use medcat_server::features::search::queries::search_datasets::handle;
use medcat_server::features::search::{SearchDatasetsError, SearchDatasetsQuery};
use medcat_server::filters::resolve::Relation;
use medcat_server::provider::MetadataOutcome;
use medcat_server::store::CatalogStore;
use serde_json::json;

#[tokio::test]
async fn test_local_hits_are_filtered_and_ordered() {
    let app = TestApp::new(ScriptedProvider::empty());
    app.create_dataset("Lungs CT small", Some(500)).await;
    app.create_dataset("Lungs CT large", Some(5000)).await;

    let query = SearchDatasetsQuery::new("lungs")
        .with_filter("ordering", json!(["size", "desc"]))
        .with_filter("size_min", json!(1000));

    let response = handle(&app.state, query).await.unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].size, Some(5000));
    assert_eq!(app.provider.list_calls(), 0);
}

#[tokio::test]
async fn test_ordering_is_applied_to_local_hits() {
    let app = TestApp::new(ScriptedProvider::empty());
    app.create_dataset("Brain MRI a", Some(10)).await;
    app.create_dataset("Brain MRI b", Some(30)).await;
    app.create_dataset("Brain MRI c", Some(20)).await;

    let query = SearchDatasetsQuery::new("brain").with_filter("ordering", json!("size,asc"));
    let response = handle(&app.state, query).await.unwrap();

    let sizes: Vec<_> = response.results.iter().map(|d| d.size).collect();
    assert_eq!(sizes, vec![Some(10), Some(20), Some(30)]);
}

#[tokio::test]
async fn test_local_match_never_calls_provider() {
    let provider = ScriptedProvider::with_listing(vec![listing_item(
        "owner/remote",
        "Remote lungs",
        10,
        &[],
    )]);
    let app = TestApp::new(provider);
    app.create_dataset("Chest X-Ray", None).await;

    // matching is case-insensitive
    let response = handle(&app.state, SearchDatasetsQuery::new("chest x-ray"))
        .await
        .unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(app.provider.list_calls(), 0);
    assert_eq!(app.provider.metadata_calls(), 0);
}

#[tokio::test]
async fn test_empty_provider_returns_empty_result() {
    let app = TestApp::new(ScriptedProvider::empty());

    let query = SearchDatasetsQuery::new("pancreas").with_filter("size_min", json!(1));
    let response = handle(&app.state, query).await.unwrap();

    assert_eq!(response.count, 0);
    assert!(response.results.is_empty());
    assert_eq!(app.provider.list_calls(), 1);
    assert_eq!(app.store.dataset_count().await, 0);
}

#[tokio::test]
async fn test_backfill_creates_only_missing_tags() {
    let provider = ScriptedProvider::with_listing(vec![
        listing_item("a/one", "Lung nodules", 100, &["lung", "ct"]),
        listing_item("b/two", "Thorax scans", 200, &["ct", "mri"]),
        listing_item("c/three", "Pulmonary set", 300, &["lung"]),
    ]);
    let app = TestApp::new(provider);
    app.store.seed_lookups(Some(Relation::Tags), &["lung"]).await;

    let response = handle(&app.state, SearchDatasetsQuery::new("thorax"))
        .await
        .unwrap();

    assert_eq!(response.count, 3);
    assert_eq!(app.provider.metadata_calls(), 3);

    // three distinct names, one already present
    let options = app.store.filter_options().await.unwrap();
    let mut tags: Vec<_> = options.tags.iter().map(|t| t.name.as_str()).collect();
    tags.sort_unstable();
    assert_eq!(tags, vec!["ct", "lung", "mri"]);

    // 2 + 2 + 1 links
    assert_eq!(app.store.tag_link_count().await, 5);
}

#[tokio::test]
async fn test_backfilled_rows_are_served_locally_next_time() {
    let provider =
        ScriptedProvider::with_listing(vec![listing_item("a/one", "Kidney stones", 100, &[])]);
    let app = TestApp::new(provider);

    let first = handle(&app.state, SearchDatasetsQuery::new("kidney"))
        .await
        .unwrap();
    let second = handle(&app.state, SearchDatasetsQuery::new("kidney"))
        .await
        .unwrap();

    assert_eq!(first.count, 1);
    assert_eq!(second.count, 1);
    assert_eq!(first.results[0].id, second.results[0].id);
    assert_eq!(app.provider.list_calls(), 1);
    assert_eq!(app.store.dataset_count().await, 1);
}

#[tokio::test]
async fn test_metadata_error_discards_whole_batch() {
    let provider = ScriptedProvider::with_listing(vec![
        listing_item("a/one", "Retina one", 1, &["eye"]),
        listing_item("b/two", "Retina two", 2, &["eye"]),
        listing_item("c/three", "Retina three", 3, &["eye"]),
    ])
    .metadata("b/two", MetadataOutcome::Error("403 - Forbidden".to_string()));
    let app = TestApp::new(provider);

    let response = handle(&app.state, SearchDatasetsQuery::new("retina"))
        .await
        .unwrap();

    assert_eq!(response.count, 0);
    // processing stopped at the failing item
    assert_eq!(app.provider.metadata_calls(), 2);
    assert_eq!(app.store.dataset_count().await, 0);
    assert_eq!(app.store.tag_link_count().await, 0);
}

#[tokio::test]
async fn test_long_external_title_is_truncated() {
    let long_title = format!("Skin lesions {}", "x".repeat(600));
    let provider =
        ScriptedProvider::with_listing(vec![listing_item("a/long", &long_title, 1, &[])]);
    let app = TestApp::new(provider);

    let response = handle(&app.state, SearchDatasetsQuery::new("lesions"))
        .await
        .unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].title.chars().count(), 500);
}

#[tokio::test]
async fn test_area_extracted_from_description() {
    let provider = ScriptedProvider::with_listing(vec![
        listing_item("a/liver", "Abdomen CT", 1, &[]),
        listing_item("b/none", "Abdomen misc", 2, &[]),
    ])
    .describe("a/liver", "Contrast CT of the liver and kidneys");
    let app = TestApp::new(provider);

    let response = handle(
        &app.state,
        SearchDatasetsQuery::new("abdomen").with_filter("ordering", json!("title")),
    )
    .await
    .unwrap();

    assert_eq!(response.count, 2);
    assert_eq!(response.results[0].anatomical_area_name.as_deref(), Some("liver"));
    assert_eq!(response.results[1].anatomical_area_name.as_deref(), Some("unknown"));
}

#[tokio::test]
async fn test_filters_apply_to_backfilled_rows() {
    let provider = ScriptedProvider::with_listing(vec![
        listing_item("a/one", "Cardiac one", 100, &["mri", "cardiology"]),
        listing_item("b/two", "Cardiac two", 200, &["ct"]),
        listing_item("c/three", "Cardiac three", 300, &["mri"]),
    ]);
    let app = TestApp::new(provider);

    let query = SearchDatasetsQuery::new("cardiac")
        .with_filter("tags_list", json!(["mri", "cardiology"]))
        .with_filter("ordering", json!(["size", "desc"]));
    let response = handle(&app.state, query).await.unwrap();

    // distinct keeps one row per dataset despite the two matching tags
    let sizes: Vec<_> = response.results.iter().map(|d| d.size).collect();
    assert_eq!(sizes, vec![Some(300), Some(100)]);
    assert_eq!(app.store.dataset_count().await, 3);
}

#[tokio::test]
async fn test_invalid_filter_fails_before_any_io() {
    let provider = ScriptedProvider::with_listing(vec![listing_item("a/one", "Bone", 1, &[])]);
    let app = TestApp::new(provider);

    let query = SearchDatasetsQuery::new("bone").with_filter("colour", json!("red"));
    let result = handle(&app.state, query).await;

    assert!(matches!(result, Err(SearchDatasetsError::Filter(_))));
    assert_eq!(app.provider.list_calls(), 0);
    assert_eq!(app.store.dataset_count().await, 0);
}

#[tokio::test]
async fn test_excluded_parameter_is_ignored() {
    let app = TestApp::new(ScriptedProvider::empty());
    app.create_dataset("Spine MRI", Some(5)).await;

    let query = SearchDatasetsQuery::new("spine").with_filter("size_ex", json!(5));
    let response = handle(&app.state, query).await.unwrap();

    assert_eq!(response.count, 1);
}
