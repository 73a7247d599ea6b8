//! Pagination module
//!
//! Page-based pagination layered onto an existing aggregation pipeline.
//!
//! # Overview
//!
//! A call validates page and limit, appends sort/skip/limit/projection stages
//! to the caller's pipeline, then counts the base pipeline and fetches the
//! augmented one concurrently. The two results are combined into a
//! [`PageResult`] whose output keys follow the configured labels.

mod paginator;
mod types;

pub use paginator::{pagination_stages, skip_count, validate, PaginateExt, Paginator};
pub use types::{total_pages, PageMeta, PageResult};

#[cfg(test)]
mod tests;
