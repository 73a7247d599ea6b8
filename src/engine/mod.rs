//! Aggregation engine module
//!
//! The seam between pagination and whatever actually runs pipelines.
//!
//! # Overview
//!
//! The engine module provides:
//! - `AggregationEngine` - the external engine: run a pipeline, collect documents
//! - `PipelineExecutor` - stateless adapter issuing count and fetch requests
//! - `MemoryEngine` - in-process engine over a vector of documents

mod memory;

pub use memory::{MemoryEngine, MemoryEngineError};

use crate::error::{BoxError, Error, Result};
use crate::pipeline::{Pipeline, COUNT_FIELD};
use crate::types::Document;
use async_trait::async_trait;
use std::sync::Arc;

/// An aggregation engine able to execute a pipeline
#[async_trait]
pub trait AggregationEngine: Send + Sync {
    /// Execute `pipeline` and collect every resulting document, in order
    async fn aggregate(&self, pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError>;
}

#[async_trait]
impl<E: AggregationEngine + ?Sized> AggregationEngine for Arc<E> {
    async fn aggregate(&self, pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError> {
        (**self).aggregate(pipeline).await
    }
}

#[async_trait]
impl<E: AggregationEngine + ?Sized> AggregationEngine for &E {
    async fn aggregate(&self, pipeline: &Pipeline) -> std::result::Result<Vec<Document>, BoxError> {
        (**self).aggregate(pipeline).await
    }
}

/// Issues the two read operations pagination needs against an engine.
///
/// Holds no state beyond the engine handle and never takes ownership of
/// the pipelines it is given.
#[derive(Debug, Clone)]
pub struct PipelineExecutor<E> {
    engine: E,
}

impl<E: AggregationEngine> PipelineExecutor<E> {
    /// Create a new executor over an engine
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Get the underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Count the documents produced by `base`.
    ///
    /// Runs `base` terminated by a count stage. An empty result, or a record
    /// lacking the count field, means zero matches.
    pub async fn count(&self, base: &Pipeline) -> Result<u64> {
        let counted = base.with_count(COUNT_FIELD);
        let records = self
            .engine
            .aggregate(&counted)
            .await
            .map_err(Error::Engine)?;

        let total = records
            .first()
            .and_then(|record| record.get(COUNT_FIELD))
            .and_then(|n| n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)))
            .unwrap_or(0);
        Ok(total)
    }

    /// Run `pipeline` and return its documents in engine order
    pub async fn fetch(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        self.engine.aggregate(pipeline).await.map_err(Error::Engine)
    }
}
