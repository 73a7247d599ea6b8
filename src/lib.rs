// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # pipeline-paginate
//!
//! Page-based pagination for document-database aggregation pipelines.
//!
//! Given a pipeline that is already built and a requested page, the crate
//! counts the matching documents, appends sort/skip/limit/projection stages,
//! fetches the page and returns it with navigation metadata whose output
//! keys the caller can rename.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeline_paginate::{MemoryEngine, PaginateOptions, Paginator, Pipeline, Stage};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> pipeline_paginate::Result<()> {
//!     let engine = MemoryEngine::new(load_documents());
//!     let paginator = Paginator::new(engine);
//!
//!     let base = Pipeline::new().stage(Stage::match_(json!({"status": "active"})));
//!     let options = PaginateOptions::new().page(2).limit(10).sort(json!({"createdAt": -1}));
//!
//!     let page = paginator.paginate(&base, &options).await?;
//!     println!("{}", serde_json::to_string_pretty(&page)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Paginator                           │
//! │  resolve options → validate → append stages → derive meta    │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ try_join
//!               ┌────────────────┴────────────────┐
//!        count(base + $count)              fetch(base + suffix)
//!               └────────────────┬────────────────┘
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │          PipelineExecutor  →  AggregationEngine              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and numeric coercion
pub mod types;

/// Aggregation stages and pipelines
pub mod pipeline;

/// Aggregation engine seam and executor adapter
pub mod engine;

/// Options, defaults and their resolution
pub mod config;

/// Pagination over pipelines
pub mod pagination;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{BoxError, Error, Result};
pub use types::*;

pub use config::{LabelOverrides, Labels, PaginateOptions, PaginatorConfig};
pub use engine::{AggregationEngine, MemoryEngine, PipelineExecutor};
pub use pagination::{PageMeta, PageResult, PaginateExt, Paginator};
pub use pipeline::{Pipeline, Stage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
