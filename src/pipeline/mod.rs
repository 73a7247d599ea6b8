//! Pipeline module
//!
//! Aggregation stages and the ordered pipelines built from them.
//!
//! # Overview
//!
//! A [`Pipeline`] is the caller's query prior to pagination. Pagination never
//! edits it in place: [`Pipeline::extended`] returns a new pipeline with the
//! pagination suffix appended after every caller-supplied stage.

mod types;

pub use types::{Pipeline, Stage, COUNT_FIELD};
