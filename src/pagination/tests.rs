//! Tests for pagination module

use super::*;
use crate::config::{ErrorMessageOverrides, LabelOverrides, MinMessage, PaginateOptions, PaginatorConfig, ResolvedOptions};
use crate::engine::{AggregationEngine, MemoryEngine};
use crate::error::{BoxError, Error};
use crate::pipeline::{Pipeline, Stage};
use crate::types::{Document, Limit};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_case::test_case;

fn numbered(count: usize) -> Vec<Value> {
    (1..=count).map(|i| json!({"_id": i, "n": i, "even": i % 2 == 0})).collect()
}

/// Memory engine that records every pipeline it is asked to run
#[derive(Default)]
struct RecordingEngine {
    inner: MemoryEngine,
    calls: Mutex<Vec<Pipeline>>,
}

impl RecordingEngine {
    fn new(documents: Vec<Value>) -> Self {
        Self {
            inner: MemoryEngine::new(documents),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Pipeline> {
        self.calls.lock().unwrap().clone()
    }

    /// The recorded pipeline that does not end in a count stage
    fn fetched(&self) -> Pipeline {
        self.calls()
            .into_iter()
            .find(|p| !matches!(p.stages().last(), Some(Stage::Count(_))))
            .expect("no fetch recorded")
    }
}

#[async_trait]
impl AggregationEngine for RecordingEngine {
    async fn aggregate(&self, pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError> {
        self.calls.lock().unwrap().push(pipeline.clone());
        self.inner.aggregate(pipeline).await
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[tokio::test]
async fn test_middle_page() {
    let engine = Arc::new(RecordingEngine::new(numbered(25)));
    let paginator = Paginator::new(Arc::clone(&engine));

    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(2).limit(10))
        .await
        .unwrap();

    assert_eq!(
        result.meta,
        PageMeta {
            total_docs: 25,
            limit: Limit::Count(10),
            page: 2,
            total_pages: 3,
            next_page: Some(3),
            prev_page: Some(1),
            has_next_page: true,
            has_prev_page: true,
        }
    );
    assert_eq!(result.docs.len(), 10);
    assert_eq!(result.docs[0]["_id"], 11);
    assert_eq!(
        engine.fetched().stages(),
        &[Stage::Skip(10), Stage::Limit(10)]
    );
}

#[tokio::test]
async fn test_short_first_page() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(5)));

    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(1).limit(10))
        .await
        .unwrap();

    assert_eq!(result.docs.len(), 5);
    assert_eq!(result.meta.total_pages, 1);
    assert_eq!(result.meta.next_page, None);
    assert_eq!(result.meta.prev_page, None);
    assert!(!result.meta.has_next_page);
    assert!(!result.meta.has_prev_page);
}

#[tokio::test]
async fn test_unlimited_returns_everything() {
    let engine = Arc::new(RecordingEngine::new(numbered(30)));
    let paginator = Paginator::new(Arc::clone(&engine));

    let result = paginator
        .paginate(
            &Pipeline::new(),
            &PaginateOptions::new().unlimited().sort(json!({"n": -1})),
        )
        .await
        .unwrap();

    assert_eq!(result.docs.len(), 30);
    assert_eq!(result.docs[0]["n"], 30);
    assert_eq!(result.meta.total_pages, 1);
    assert_eq!(result.meta.limit, Limit::Unlimited);
    assert_eq!(result.meta.next_page, None);
    assert_eq!(
        engine.fetched().stages(),
        &[Stage::sort(json!({"n": -1}))]
    );
}

#[tokio::test]
async fn test_full_last_page_still_offers_next() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(20)));

    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(2).limit(10))
        .await
        .unwrap();
    assert_eq!(result.meta.total_pages, 2);
    assert_eq!(result.meta.next_page, Some(3));

    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(3).limit(10))
        .await
        .unwrap();
    assert!(result.docs.is_empty());
    assert_eq!(result.meta.next_page, None);
    assert_eq!(result.meta.prev_page, Some(2));
}

#[tokio::test]
async fn test_no_matches() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(4)));
    let base = Pipeline::new().stage(Stage::match_(json!({"n": {"$gt": 100}})));

    let result = paginator.paginate(&base, &PaginateOptions::new()).await.unwrap();
    assert_eq!(result.meta.total_docs, 0);
    assert_eq!(result.meta.total_pages, 0);
    assert_eq!(result.meta.limit, Limit::Count(12));
    assert!(result.docs.is_empty());
}

#[test_case(2, 10, 10 => Some(3); "full page")]
#[test_case(2, 9, 10 => None; "short page")]
#[test_case(i64::MAX, 1, 1 => None; "no successor page")]
fn test_next_page(page: i64, docs_len: usize, limit: i64) -> Option<i64> {
    PageMeta::derive(100, docs_len, page, Limit::Count(limit)).next_page
}

/// Engine answering every pipeline with the same single document
struct SingleDocEngine;

#[async_trait]
impl AggregationEngine for SingleDocEngine {
    async fn aggregate(&self, _pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError> {
        Ok(vec![json!({"_id": 1})])
    }
}

#[tokio::test]
async fn test_full_page_at_largest_page_number() {
    let result = Paginator::new(SingleDocEngine)
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(i64::MAX).limit(1))
        .await
        .unwrap();

    assert_eq!(result.docs.len(), 1);
    assert_eq!(result.meta.page, i64::MAX);
    assert_eq!(result.meta.next_page, None);
    assert!(!result.meta.has_next_page);
    assert_eq!(result.meta.prev_page, Some(i64::MAX - 1));
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test_case(PaginateOptions::new().page(-1); "negative page")]
#[test_case(PaginateOptions::new().page("-3"); "negative page text")]
#[tokio::test]
async fn test_invalid_page_never_reaches_engine(options: PaginateOptions) {
    let engine = Arc::new(RecordingEngine::new(numbered(3)));
    let paginator = Paginator::new(Arc::clone(&engine));

    let err = paginator.paginate(&Pipeline::new(), &options).await.unwrap_err();
    assert!(matches!(err, Error::InvalidPage { .. }));
    assert_eq!(err.to_string(), crate::config::DEFAULT_PAGE_MIN_MESSAGE);
    assert!(engine.calls().is_empty());
}

#[test_case(PaginateOptions::new().limit(0); "zero limit")]
#[test_case(PaginateOptions::new().limit(-5); "negative limit")]
#[test_case(PaginateOptions::new().limit("abc"); "unparsable limit")]
#[tokio::test]
async fn test_invalid_limit_never_reaches_engine(options: PaginateOptions) {
    let engine = Arc::new(RecordingEngine::new(numbered(3)));
    let paginator = Paginator::new(Arc::clone(&engine));

    let err = paginator.paginate(&Pipeline::new(), &options).await.unwrap_err();
    assert!(matches!(err, Error::InvalidLimit { .. }));
    assert!(err.is_validation());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_page_checked_before_limit() {
    let paginator = Paginator::new(MemoryEngine::default());
    let err = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(-1).limit(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPage { .. }));
}

#[tokio::test]
async fn test_lenient_page_coercion() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(3)));

    for page in ["abc", "0"] {
        let result = paginator
            .paginate(&Pipeline::new(), &PaginateOptions::new().page(page))
            .await
            .unwrap();
        assert_eq!(result.meta.page, 1);
    }
}

#[tokio::test]
async fn test_custom_error_messages() {
    let paginator = Paginator::new(MemoryEngine::default());
    let options = PaginateOptions::new().limit(0).error_messages(ErrorMessageOverrides {
        page: None,
        limit: Some(MinMessage {
            min: Some("limit must be positive".to_string()),
        }),
    });

    let err = paginator.paginate(&Pipeline::new(), &options).await.unwrap_err();
    assert_eq!(err.to_string(), "limit must be positive");
}

// ============================================================================
// Stage Composition Tests
// ============================================================================

#[test_case(1, 10 => 0; "first page")]
#[test_case(2, 10 => 10; "second page")]
#[test_case(4, 7 => 21; "fourth page")]
#[test_case(i64::MAX, i64::MAX => i64::MAX as u64; "saturates")]
fn test_skip_count(page: i64, limit: i64) -> u64 {
    skip_count(page, limit)
}

#[test_case(25, Limit::Count(10) => 3; "partial last page")]
#[test_case(20, Limit::Count(10) => 2; "exact fit")]
#[test_case(0, Limit::Count(10) => 0; "empty")]
#[test_case(1, Limit::Count(1) => 1; "single")]
#[test_case(0, Limit::Unlimited => 1; "unlimited is one page")]
#[test_case(500, Limit::Unlimited => 1; "unlimited with docs")]
fn test_total_pages(total_docs: u64, limit: Limit) -> u64 {
    total_pages(total_docs, limit)
}

#[test]
fn test_stage_order() {
    let options = ResolvedOptions::resolve(
        &PaginateOptions::default(),
        &PaginateOptions::new()
            .page(3)
            .limit(5)
            .projection(json!({"n": 1}))
            .sort(json!({"n": 1})),
    );

    assert_eq!(
        pagination_stages(&options),
        vec![
            Stage::sort(json!({"n": 1})),
            Stage::Skip(10),
            Stage::Limit(5),
            Stage::project(json!({"n": 1})),
        ]
    );
}

#[test]
fn test_stage_order_without_optional_stages() {
    let options = ResolvedOptions::default();
    assert_eq!(
        pagination_stages(&options),
        vec![Stage::Skip(0), Stage::Limit(12)]
    );

    let options = ResolvedOptions::resolve(
        &PaginateOptions::default(),
        &PaginateOptions::new().unlimited().projection(json!({"n": 0})),
    );
    assert_eq!(
        pagination_stages(&options),
        vec![Stage::project(json!({"n": 0}))]
    );
}

#[tokio::test]
async fn test_caller_stages_precede_pagination() {
    let engine = Arc::new(RecordingEngine::new(numbered(10)));
    let paginator = Paginator::new(Arc::clone(&engine));
    let base = Pipeline::new().stage(Stage::match_(json!({"even": true})));

    let result = paginator
        .paginate(
            &base,
            &PaginateOptions::new()
                .limit(2)
                .sort(json!({"n": -1}))
                .projection(json!({"n": 1, "_id": 0})),
        )
        .await
        .unwrap();

    assert_eq!(result.docs, vec![json!({"n": 10}), json!({"n": 8})]);
    assert_eq!(result.meta.total_docs, 5);
    assert_eq!(base.len(), 1);

    let calls = engine.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&base.with_count("totalDocs")));
    assert_eq!(
        engine.fetched().to_value(),
        json!([
            {"$match": {"even": true}},
            {"$sort": {"n": -1}},
            {"$skip": 0},
            {"$limit": 2},
            {"$project": {"n": 1, "_id": 0}}
        ])
    );
}

// ============================================================================
// Output Shape Tests
// ============================================================================

#[tokio::test]
async fn test_nested_output_shape() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(3)));
    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().limit(2).projection(json!({"_id": 1})))
        .await
        .unwrap();

    assert_eq!(
        result.to_value(),
        json!({
            "paginator": {
                "totalDocs": 3,
                "limit": 2,
                "page": 1,
                "totalPages": 2,
                "nextPage": 2,
                "prevPage": null,
                "hasPrevPage": false,
                "hasNextPage": true
            },
            "docs": [{"_id": 1}, {"_id": 2}]
        })
    );
}

#[tokio::test]
async fn test_meta_toggle_only_changes_shape() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(7)));
    let base = PaginateOptions::new().page(2).limit(3);

    let nested = paginator.paginate(&Pipeline::new(), &base).await.unwrap();
    let flat = paginator
        .paginate(&Pipeline::new(), &base.clone().flat())
        .await
        .unwrap();
    assert_eq!(nested.meta, flat.meta);
    assert_eq!(nested.docs, flat.docs);

    let nested = nested.to_value();
    let flat = flat.to_value();
    for key in ["totalDocs", "limit", "page", "totalPages", "nextPage", "prevPage", "hasPrevPage", "hasNextPage"] {
        assert_eq!(nested["paginator"][key], flat[key], "field {key}");
    }
    assert_eq!(nested["docs"], flat["docs"]);
    assert!(flat.get("paginator").is_none());
}

#[tokio::test]
async fn test_custom_labels() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(2)));
    let options = PaginateOptions::new().labels(LabelOverrides {
        total_docs: Some("itemCount".to_string()),
        docs: Some("items".to_string()),
        has_next_page: Some("more".to_string()),
        meta: Some("pageInfo".to_string()),
        ..Default::default()
    });

    let value = serde_json::to_value(paginator.paginate(&Pipeline::new(), &options).await.unwrap()).unwrap();
    assert_eq!(value["pageInfo"]["itemCount"], 2);
    assert_eq!(value["pageInfo"]["more"], false);
    assert_eq!(value["pageInfo"]["page"], 1);
    assert_eq!(value["items"].as_array().unwrap().len(), 2);
    assert!(value.get("docs").is_none());
}

#[tokio::test]
async fn test_unlimited_reports_sentinel_limit() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(2)));
    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().limit("unlimited").flat())
        .await
        .unwrap();
    let value = result.to_value();
    assert_eq!(value["limit"], -1);
    assert_eq!(value["totalPages"], 1);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[tokio::test]
async fn test_paginator_config_defaults_apply() {
    let config = PaginatorConfig::new(PaginateOptions::new().limit(4).sort(json!({"n": -1})));
    let paginator = Paginator::new(MemoryEngine::new(numbered(10))).with_config(config);

    let result = paginator.paginate(&Pipeline::new(), &PaginateOptions::new()).await.unwrap();
    assert_eq!(result.meta.limit, Limit::Count(4));
    assert_eq!(result.docs[0]["n"], 10);

    let result = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().limit(2))
        .await
        .unwrap();
    assert_eq!(result.docs.len(), 2);
    assert_eq!(paginator.config().defaults.limit, Some(4.into()));
}

#[tokio::test]
async fn test_paginate_ext() {
    let engine = MemoryEngine::new(numbered(6));
    let result = engine
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(2).limit(4))
        .await
        .unwrap();
    assert_eq!(result.docs.len(), 2);
    assert_eq!(result.meta.prev_page, Some(1));
    assert_eq!(result.into_docs()[0]["_id"], 5);
}

// ============================================================================
// Execution Tests
// ============================================================================

/// Engine whose calls each wait until the other one has started
struct RendezvousEngine {
    inner: MemoryEngine,
    barrier: tokio::sync::Barrier,
}

#[async_trait]
impl AggregationEngine for RendezvousEngine {
    async fn aggregate(&self, pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError> {
        self.barrier.wait().await;
        self.inner.aggregate(pipeline).await
    }
}

#[tokio::test]
async fn test_count_and_fetch_run_concurrently() {
    let paginator = Paginator::new(RendezvousEngine {
        inner: MemoryEngine::new(numbered(5)),
        barrier: tokio::sync::Barrier::new(2),
    });

    // Sequential execution would park forever on the barrier
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        paginator.paginate(&Pipeline::new(), &PaginateOptions::new().limit(2)),
    )
    .await
    .expect("count and fetch were not issued concurrently")
    .unwrap();
    assert_eq!(result.meta.total_docs, 5);
}

/// Engine failing only on count pipelines
struct FailingCountEngine(MemoryEngine);

#[async_trait]
impl AggregationEngine for FailingCountEngine {
    async fn aggregate(&self, pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError> {
        if matches!(pipeline.stages().last(), Some(Stage::Count(_))) {
            return Err("count unavailable".into());
        }
        self.0.aggregate(pipeline).await
    }
}

#[tokio::test]
async fn test_engine_failure_fails_whole_call() {
    let paginator = Paginator::new(FailingCountEngine(MemoryEngine::new(numbered(5))));
    let err = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_engine());
    assert_eq!(err.to_string(), "count unavailable");
}

#[tokio::test]
async fn test_engine_error_from_caller_stage() {
    let paginator = Paginator::new(MemoryEngine::new(numbered(5)));
    let base = Pipeline::new().stage(Stage::Other(json!({"$group": {"_id": "$even"}})));
    let err = paginator.paginate(&base, &PaginateOptions::new()).await.unwrap_err();
    assert!(err.is_engine());
}

#[tokio::test]
async fn test_timeout_fails_whole_call() {
    let engine = MemoryEngine::new(numbered(5)).with_latency(Duration::from_millis(500));
    let paginator = Paginator::new(engine);

    let err = paginator
        .paginate(
            &Pipeline::new(),
            &PaginateOptions::new().timeout(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 20 }));
}

#[tokio::test]
async fn test_timeout_not_hit() {
    let engine = MemoryEngine::new(numbered(5)).with_latency(Duration::from_millis(5));
    let paginator = Paginator::new(engine);

    let result = paginator
        .paginate(
            &Pipeline::new(),
            &PaginateOptions::new().timeout(Duration::from_secs(5)),
        )
        .await;
    tokio_test::assert_ok!(result);
}
