//! Page-based pagination over aggregation pipelines

use super::types::{PageMeta, PageResult};
use crate::config::{ErrorMessages, PaginateOptions, PaginatorConfig, ResolvedOptions};
use crate::engine::{AggregationEngine, PipelineExecutor};
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, Stage};
use crate::types::Limit;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Paginates pipelines against one aggregation engine
#[derive(Debug, Clone)]
pub struct Paginator<E> {
    /// Issues count and fetch requests
    executor: PipelineExecutor<E>,
    /// Defaults applied beneath every call's options
    config: PaginatorConfig,
}

impl<E: AggregationEngine> Paginator<E> {
    /// Create a paginator with built-in defaults
    pub fn new(engine: E) -> Self {
        Self {
            executor: PipelineExecutor::new(engine),
            config: PaginatorConfig::default(),
        }
    }

    /// Set process-level defaults
    #[must_use]
    pub fn with_config(mut self, config: PaginatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults applied beneath every call
    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Adapter issuing count and fetch requests
    pub fn executor(&self) -> &PipelineExecutor<E> {
        &self.executor
    }

    /// Fetch one page of `base` and describe where it sits.
    ///
    /// Options are validated before the engine is touched. Counting `base`
    /// and fetching the paged pipeline then run concurrently; if either
    /// fails, or the deadline passes, the whole call fails.
    pub async fn paginate(&self, base: &Pipeline, options: &PaginateOptions) -> Result<PageResult> {
        let options = self.config.resolve(options);
        validate(options.page, options.limit, &options.error_messages)?;

        let augmented = base.extended(pagination_stages(&options));
        debug!(
            "Paginating page {} (limit {}) over {} base stages, {} total",
            options.page,
            options.limit,
            base.len(),
            augmented.len()
        );

        let work = async {
            futures::try_join!(self.executor.count(base), self.executor.fetch(&augmented))
        };
        let (total_docs, docs) = match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, work).await.map_err(|_| {
                let timeout_ms = timeout.as_millis() as u64;
                warn!("Pagination of page {} timed out after {}ms", options.page, timeout_ms);
                Error::Timeout { timeout_ms }
            })??,
            None => work.await?,
        };

        let meta = PageMeta::derive(total_docs, docs.len(), options.page, options.limit);
        debug!(
            "Page {} of {}: {} docs, next {:?}, prev {:?}",
            meta.page,
            meta.total_pages,
            docs.len(),
            meta.next_page,
            meta.prev_page
        );

        Ok(PageResult {
            meta,
            docs,
            labels: options.labels,
        })
    }
}

/// Reject page numbers and page sizes below 1
pub fn validate(page: i64, limit: Limit, messages: &ErrorMessages) -> Result<()> {
    if page <= 0 {
        return Err(Error::invalid_page(&messages.page_min));
    }
    if let Limit::Count(n) = limit {
        if n <= 0 {
            return Err(Error::invalid_limit(&messages.limit_min));
        }
    }
    Ok(())
}

/// Documents to skip before `page`
pub fn skip_count(page: i64, limit: i64) -> u64 {
    if page <= 1 {
        return 0;
    }
    (page - 1).saturating_mul(limit).max(0) as u64
}

/// Stages appended after the caller's pipeline, in order: sort, skip,
/// limit, projection. Projection goes last so it cannot hide fields the
/// earlier stages read.
pub fn pagination_stages(options: &ResolvedOptions) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(4);

    if let Some(sort) = &options.sort {
        stages.push(Stage::sort(sort.clone()));
    }

    if let Limit::Count(limit) = options.limit {
        stages.push(Stage::Skip(skip_count(options.page, limit)));
        stages.push(Stage::Limit(limit.max(0) as u64));
    }

    if let Some(projection) = &options.projection {
        stages.push(Stage::project(projection.clone()));
    }

    stages
}

/// Paginate straight from an engine handle, using built-in defaults
#[async_trait]
pub trait PaginateExt: AggregationEngine {
    /// See [`Paginator::paginate`]
    async fn paginate(&self, base: &Pipeline, options: &PaginateOptions) -> Result<PageResult>;
}

#[async_trait]
impl<E: AggregationEngine> PaginateExt for E {
    async fn paginate(&self, base: &Pipeline, options: &PaginateOptions) -> Result<PageResult> {
        Paginator::new(self).paginate(base, options).await
    }
}
