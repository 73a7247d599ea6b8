//! Integration tests against the public API
//!
//! Tests the full flow: options → validation → stage composition →
//! concurrent count/fetch → labeled page output

use async_trait::async_trait;
use pipeline_paginate::{
    AggregationEngine, BoxError, Document, Error, LabelOverrides, MemoryEngine, PaginateExt,
    PaginateOptions, Paginator, PaginatorConfig, Pipeline, Stage,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn orders() -> Vec<Value> {
    (1..=25)
        .map(|i| {
            json!({
                "_id": i,
                "customer": if i % 5 == 0 { "acme" } else { "globex" },
                "total": i * 10,
                "status": if i % 2 == 0 { "shipped" } else { "pending" }
            })
        })
        .collect()
}

/// Engine counting how often it was called
struct CountingEngine {
    inner: MemoryEngine,
    calls: AtomicUsize,
}

#[async_trait]
impl AggregationEngine for CountingEngine {
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(pipeline).await
    }
}

// ============================================================================
// End-to-end Pagination
// ============================================================================

#[tokio::test]
async fn test_walk_every_page() {
    let paginator = Paginator::new(MemoryEngine::new(orders()));
    let options = PaginateOptions::new().limit(10).sort(json!({"_id": 1}));

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let result = paginator
            .paginate(&Pipeline::new(), &options.clone().page(page))
            .await
            .unwrap();
        assert_eq!(result.meta.total_pages, 3);
        seen.extend(result.docs.iter().map(|d| d["_id"].as_i64().unwrap()));

        match result.meta.next_page {
            Some(next) => page = next,
            None => break,
        }
    }

    assert_eq!(seen, (1..=25).collect::<Vec<_>>());
    assert_eq!(page, 3);
}

#[tokio::test]
async fn test_filtered_pipeline_with_projection() {
    let paginator = Paginator::new(MemoryEngine::new(orders()));
    let base = Pipeline::from_value(&json!([
        {"$match": {"status": "shipped"}},
        {"$match": {"total": {"$gte": 100}}}
    ]))
    .unwrap();

    let result = paginator
        .paginate(
            &base,
            &PaginateOptions::new()
                .page(2)
                .limit(3)
                .sort(json!({"total": -1}))
                .projection(json!({"total": 1, "_id": 0})),
        )
        .await
        .unwrap();

    // shipped with total >= 100: ids 10,12,...,24 → 8 documents
    assert_eq!(result.meta.total_docs, 8);
    assert_eq!(result.meta.total_pages, 3);
    assert_eq!(
        result.docs,
        vec![json!({"total": 180}), json!({"total": 160}), json!({"total": 140})]
    );
    assert_eq!(result.meta.next_page, Some(3));
    assert_eq!(result.meta.prev_page, Some(1));
}

#[tokio::test]
async fn test_serialized_flat_output() {
    let engine = MemoryEngine::new(orders());
    let base = Pipeline::new().stage(Stage::match_(json!({"customer": "acme"})));

    let page = engine
        .paginate(&base, &PaginateOptions::new().flat().projection(json!({"_id": 1})))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&page).unwrap(),
        json!({
            "totalDocs": 5,
            "limit": 12,
            "page": 1,
            "totalPages": 1,
            "nextPage": null,
            "prevPage": null,
            "hasPrevPage": false,
            "hasNextPage": false,
            "docs": [{"_id": 5}, {"_id": 10}, {"_id": 15}, {"_id": 20}, {"_id": 25}]
        })
    );
}

#[tokio::test]
async fn test_config_file_defaults_with_call_override() {
    let config = PaginatorConfig::from_yaml_str(
        r"
limit: 5
customLabels:
  docs: orders
  totalDocs: count
  meta: pagination
errorMessages:
  page:
    min: Page must be 1 or greater
",
    )
    .unwrap();
    let paginator = Paginator::new(MemoryEngine::new(orders())).with_config(config);

    let value = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page("5"))
        .await
        .unwrap()
        .to_value();
    assert_eq!(value["pagination"]["count"], 25);
    assert_eq!(value["pagination"]["totalPages"], 5);
    assert_eq!(value["pagination"]["nextPage"], 6);
    assert_eq!(value["orders"].as_array().unwrap().len(), 5);

    let options = PaginateOptions::new().limit(25).labels(LabelOverrides {
        docs: Some("rows".to_string()),
        ..Default::default()
    });
    let value = paginator.paginate(&Pipeline::new(), &options).await.unwrap().to_value();
    assert_eq!(value["pagination"]["count"], 25);
    assert_eq!(value["rows"].as_array().unwrap().len(), 25);

    let err = paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new().page(-2))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Page must be 1 or greater");
}

// ============================================================================
// Failure Modes
// ============================================================================

#[tokio::test]
async fn test_validation_happens_before_io() {
    let engine = Arc::new(CountingEngine {
        inner: MemoryEngine::new(orders()),
        calls: AtomicUsize::new(0),
    });
    let paginator = Paginator::new(Arc::clone(&engine));

    for options in [
        PaginateOptions::new().page(-1),
        PaginateOptions::new().limit(0),
        PaginateOptions::new().limit("ten"),
    ] {
        let err = paginator.paginate(&Pipeline::new(), &options).await.unwrap_err();
        assert!(err.is_validation(), "{err:?}");
    }
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);

    paginator
        .paginate(&Pipeline::new(), &PaginateOptions::new())
        .await
        .unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_engine_error_surfaces_verbatim() {
    let paginator = Paginator::new(MemoryEngine::new(orders()));
    let base = Pipeline::from_value(&json!([{"$unwind": "$items"}])).unwrap();

    let err = paginator
        .paginate(&base, &PaginateOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert_eq!(err.to_string(), "Unsupported pipeline stage: $unwind");
}

#[tokio::test]
async fn test_concurrent_calls_share_nothing() {
    let paginator = Arc::new(Paginator::new(MemoryEngine::new(orders())));
    let base = Pipeline::new();

    let handles: Vec<_> = (1..=3)
        .map(|page| {
            let paginator = Arc::clone(&paginator);
            let base = base.clone();
            tokio::spawn(async move {
                paginator
                    .paginate(&base, &PaginateOptions::new().page(page).limit(10))
                    .await
            })
        })
        .collect();

    let mut lengths = Vec::new();
    for handle in handles {
        lengths.push(handle.await.unwrap().unwrap().docs.len());
    }
    assert_eq!(lengths, vec![10, 10, 5]);
    assert!(base.is_empty());
}
