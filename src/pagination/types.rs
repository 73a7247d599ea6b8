//! Pagination types
//!
//! Navigation metadata and the page result handed back to callers.

use crate::config::Labels;
use crate::types::{Document, JsonObject, JsonValue, Limit};
use serde::{Serialize, Serializer};

/// Navigation metadata for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    /// Documents matched by the base pipeline
    pub total_docs: u64,
    /// Requested page size
    pub limit: Limit,
    /// Current page, 1-based
    pub page: i64,
    pub total_pages: u64,
    /// Next page, when the current page came back full
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    /// Derive navigation metadata.
    ///
    /// `next_page` is offered only when the fetched page is exactly full; it
    /// does not consult `total_docs`, so a full last page still reports a
    /// next page that will come back empty. A page with no representable
    /// successor has no next page.
    pub fn derive(total_docs: u64, docs_len: usize, page: i64, limit: Limit) -> Self {
        let total_pages = total_pages(total_docs, limit);
        let next_page = match limit {
            Limit::Count(n) if docs_len as i64 == n => page.checked_add(1),
            _ => None,
        };
        let prev_page = Some(page - 1).filter(|p| *p > 0);

        Self {
            total_docs,
            limit,
            page,
            total_pages,
            next_page,
            prev_page,
            has_next_page: next_page.is_some(),
            has_prev_page: prev_page.is_some(),
        }
    }

    /// Write the metadata fields into `out` under the given labels
    fn write_into(&self, labels: &Labels, out: &mut JsonObject) {
        out.insert(labels.total_docs.clone(), self.total_docs.into());
        out.insert(labels.limit.clone(), self.limit.as_i64().into());
        out.insert(labels.page.clone(), self.page.into());
        out.insert(labels.total_pages.clone(), self.total_pages.into());
        out.insert(labels.next_page.clone(), self.next_page.into());
        out.insert(labels.prev_page.clone(), self.prev_page.into());
        out.insert(labels.has_prev_page.clone(), self.has_prev_page.into());
        out.insert(labels.has_next_page.clone(), self.has_next_page.into());
    }
}

/// `ceil(total_docs / limit)`; a single page when unlimited
pub fn total_pages(total_docs: u64, limit: Limit) -> u64 {
    match limit {
        Limit::Count(n) if n > 0 => total_docs.div_ceil(n as u64),
        Limit::Count(_) => 0,
        Limit::Unlimited => 1,
    }
}

/// One page of documents plus its navigation metadata.
///
/// Serializes into the labeled output shape: metadata nested under the
/// meta label next to the docs, or flattened beside them when the meta
/// label is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub meta: PageMeta,
    pub docs: Vec<Document>,
    pub labels: Labels,
}

impl PageResult {
    /// Build the labeled output document
    pub fn to_value(&self) -> JsonValue {
        let mut out = JsonObject::new();
        match &self.labels.meta {
            Some(meta_label) => {
                let mut meta = JsonObject::new();
                self.meta.write_into(&self.labels, &mut meta);
                out.insert(meta_label.clone(), JsonValue::Object(meta));
            }
            None => self.meta.write_into(&self.labels, &mut out),
        }
        out.insert(self.labels.docs.clone(), JsonValue::Array(self.docs.clone()));
        JsonValue::Object(out)
    }

    /// Take the documents, dropping the metadata
    pub fn into_docs(self) -> Vec<Document> {
        self.docs
    }
}

impl Serialize for PageResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
