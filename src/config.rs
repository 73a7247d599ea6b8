//! Pagination options and their resolution
//!
//! Options come from three layers, merged without mutating any of them:
//! built-in defaults, then the process-level [`PaginatorConfig`], then
//! the per-call [`PaginateOptions`]. A field supplied by a later layer wins.

use crate::error::{Error, Result};
use crate::types::{coerce_limit, coerce_page, JsonValue, Limit, NumberLike, ProjectionSpec, SortSpec};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default page number
pub const DEFAULT_PAGE: i64 = 1;

/// Default page size
pub const DEFAULT_LIMIT: i64 = 12;

/// Default key the metadata is nested under
pub const DEFAULT_META_LABEL: &str = "paginator";

/// Default message for a page number below 1
pub const DEFAULT_PAGE_MIN_MESSAGE: &str = "El numero de pagina no puede ser menor a 1";

/// Default message for a page size below 1
pub const DEFAULT_LIMIT_MIN_MESSAGE: &str = "El limite de pagina no puede ser menor a 1";

// ============================================================================
// Labels
// ============================================================================

/// Output key for each field of a page result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labels {
    pub total_docs: String,
    pub limit: String,
    pub page: String,
    pub total_pages: String,
    pub docs: String,
    pub next_page: String,
    pub prev_page: String,
    pub has_prev_page: String,
    pub has_next_page: String,
    /// Key the metadata is nested under; `None` flattens it into the top level
    pub meta: Option<String>,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            total_docs: "totalDocs".to_string(),
            limit: "limit".to_string(),
            page: "page".to_string(),
            total_pages: "totalPages".to_string(),
            docs: "docs".to_string(),
            next_page: "nextPage".to_string(),
            prev_page: "prevPage".to_string(),
            has_prev_page: "hasPrevPage".to_string(),
            has_next_page: "hasNextPage".to_string(),
            meta: Some(DEFAULT_META_LABEL.to_string()),
        }
    }
}

/// Partial label table; unset entries inherit from the layer below
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_docs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_prev_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next_page: Option<String>,
    /// `Some("")` requests the flattened shape. In documents `null` and
    /// `false` mean the same thing.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_meta_label"
    )]
    pub meta: Option<String>,
}

fn deserialize_meta_label<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(label) => Ok(Some(label)),
        JsonValue::Null | JsonValue::Bool(false) => Ok(Some(String::new())),
        other => Err(D::Error::custom(format!(
            "meta label must be a string, null or false, got {other}"
        ))),
    }
}

impl LabelOverrides {
    /// Layer `over` on top of `self`
    #[must_use]
    pub fn layer(&self, over: &LabelOverrides) -> LabelOverrides {
        LabelOverrides {
            total_docs: over.total_docs.clone().or_else(|| self.total_docs.clone()),
            limit: over.limit.clone().or_else(|| self.limit.clone()),
            page: over.page.clone().or_else(|| self.page.clone()),
            total_pages: over.total_pages.clone().or_else(|| self.total_pages.clone()),
            docs: over.docs.clone().or_else(|| self.docs.clone()),
            next_page: over.next_page.clone().or_else(|| self.next_page.clone()),
            prev_page: over.prev_page.clone().or_else(|| self.prev_page.clone()),
            has_prev_page: over.has_prev_page.clone().or_else(|| self.has_prev_page.clone()),
            has_next_page: over.has_next_page.clone().or_else(|| self.has_next_page.clone()),
            meta: over.meta.clone().or_else(|| self.meta.clone()),
        }
    }

    /// Apply these overrides to a complete label table
    pub fn apply(&self, base: Labels) -> Labels {
        Labels {
            total_docs: self.total_docs.clone().unwrap_or(base.total_docs),
            limit: self.limit.clone().unwrap_or(base.limit),
            page: self.page.clone().unwrap_or(base.page),
            total_pages: self.total_pages.clone().unwrap_or(base.total_pages),
            docs: self.docs.clone().unwrap_or(base.docs),
            next_page: self.next_page.clone().unwrap_or(base.next_page),
            prev_page: self.prev_page.clone().unwrap_or(base.prev_page),
            has_prev_page: self.has_prev_page.clone().unwrap_or(base.has_prev_page),
            has_next_page: self.has_next_page.clone().unwrap_or(base.has_next_page),
            meta: match &self.meta {
                Some(meta) if meta.is_empty() => None,
                Some(meta) => Some(meta.clone()),
                None => base.meta,
            },
        }
    }
}

// ============================================================================
// Error messages
// ============================================================================

/// Messages carried by validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    pub page_min: String,
    pub limit_min: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            page_min: DEFAULT_PAGE_MIN_MESSAGE.to_string(),
            limit_min: DEFAULT_LIMIT_MIN_MESSAGE.to_string(),
        }
    }
}

/// `{ min }` message group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
}

/// Partial message table, shaped `{ page: { min }, limit: { min } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorMessageOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<MinMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<MinMessage>,
}

impl ErrorMessageOverrides {
    fn page_min(&self) -> Option<&String> {
        self.page.as_ref().and_then(|m| m.min.as_ref())
    }

    fn limit_min(&self) -> Option<&String> {
        self.limit.as_ref().and_then(|m| m.min.as_ref())
    }

    /// Layer `over` on top of `self`
    #[must_use]
    pub fn layer(&self, over: &ErrorMessageOverrides) -> ErrorMessageOverrides {
        ErrorMessageOverrides {
            page: over.page_min().or(self.page_min()).map(|min| MinMessage {
                min: Some(min.clone()),
            }),
            limit: over.limit_min().or(self.limit_min()).map(|min| MinMessage {
                min: Some(min.clone()),
            }),
        }
    }

    /// Apply these overrides to a complete message table
    pub fn apply(&self, base: ErrorMessages) -> ErrorMessages {
        ErrorMessages {
            page_min: self.page_min().cloned().unwrap_or(base.page_min),
            limit_min: self.limit_min().cloned().unwrap_or(base.limit_min),
        }
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Options for a single pagination call; every field is optional.
///
/// `sort` and `projection` distinguish "inherit" (`None`) from "clear"
/// (`Some(None)`), so a call can switch off a process-level default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawOptions")]
pub struct PaginateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<NumberLike>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<NumberLike>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Option<SortSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Option<ProjectionSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_messages: Option<ErrorMessageOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// `{ page, limit }` group accepted under the `paginator` key
#[derive(Debug, Default, Deserialize)]
struct PageRequest {
    #[serde(default)]
    page: Option<NumberLike>,
    #[serde(default)]
    limit: Option<NumberLike>,
}

/// Document shape of options, including the nested and aliased spellings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawOptions {
    page: Option<NumberLike>,
    limit: Option<NumberLike>,
    paginator: Option<PageRequest>,
    #[serde(deserialize_with = "deserialize_clearable")]
    sort: Option<Option<SortSpec>>,
    #[serde(alias = "project", deserialize_with = "deserialize_clearable")]
    projection: Option<Option<ProjectionSpec>>,
    #[serde(alias = "customLabels")]
    labels: Option<LabelOverrides>,
    error_messages: Option<ErrorMessageOverrides>,
    timeout_ms: Option<u64>,
}

/// Present-but-null becomes `Some(None)`; absence is left to `default`
fn deserialize_clearable<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Option<JsonValue>>, D::Error> {
    Option::<JsonValue>::deserialize(deserializer).map(Some)
}

impl From<RawOptions> for PaginateOptions {
    fn from(raw: RawOptions) -> Self {
        let nested = raw.paginator.unwrap_or_default();
        Self {
            page: raw.page.or(nested.page),
            limit: raw.limit.or(nested.limit),
            sort: raw.sort,
            projection: raw.projection,
            labels: raw.labels,
            error_messages: raw.error_messages,
            timeout_ms: raw.timeout_ms,
        }
    }
}

impl PaginateOptions {
    /// Create empty options (everything inherited)
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, page: impl Into<NumberLike>) -> Self {
        self.page = Some(page.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: impl Into<NumberLike>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Return every matching document on one page
    #[must_use]
    pub fn unlimited(self) -> Self {
        self.limit(Limit::Unlimited)
    }

    #[must_use]
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(Some(sort));
        self
    }

    /// Drop any inherited sort
    #[must_use]
    pub fn no_sort(mut self) -> Self {
        self.sort = Some(None);
        self
    }

    #[must_use]
    pub fn projection(mut self, projection: ProjectionSpec) -> Self {
        self.projection = Some(Some(projection));
        self
    }

    /// Drop any inherited projection
    #[must_use]
    pub fn no_projection(mut self) -> Self {
        self.projection = Some(None);
        self
    }

    #[must_use]
    pub fn labels(mut self, labels: LabelOverrides) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Nest metadata under `label`; an empty label flattens it
    #[must_use]
    pub fn meta_label(mut self, label: impl Into<String>) -> Self {
        let mut labels = self.labels.unwrap_or_default();
        labels.meta = Some(label.into());
        self.labels = Some(labels);
        self
    }

    /// Flatten metadata into the top level of the result
    #[must_use]
    pub fn flat(self) -> Self {
        self.meta_label("")
    }

    #[must_use]
    pub fn error_messages(mut self, messages: ErrorMessageOverrides) -> Self {
        self.error_messages = Some(messages);
        self
    }

    /// Fail the call if count and fetch have not both finished in time
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Layer `over` on top of `self`, producing a new value
    #[must_use]
    pub fn layer(&self, over: &PaginateOptions) -> PaginateOptions {
        let labels = match (&self.labels, &over.labels) {
            (Some(base), Some(top)) => Some(base.layer(top)),
            (base, top) => top.clone().or_else(|| base.clone()),
        };
        let error_messages = match (&self.error_messages, &over.error_messages) {
            (Some(base), Some(top)) => Some(base.layer(top)),
            (base, top) => top.clone().or_else(|| base.clone()),
        };

        PaginateOptions {
            page: over.page.clone().or_else(|| self.page.clone()),
            limit: over.limit.clone().or_else(|| self.limit.clone()),
            sort: over.sort.clone().or_else(|| self.sort.clone()),
            projection: over.projection.clone().or_else(|| self.projection.clone()),
            labels,
            error_messages,
            timeout_ms: over.timeout_ms.or(self.timeout_ms),
        }
    }
}

// ============================================================================
// Process-level configuration
// ============================================================================

/// Defaults shared by every call made through one paginator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaginatorConfig {
    pub defaults: PaginateOptions,
}

impl PaginatorConfig {
    /// Create a config from default options
    pub fn new(defaults: PaginateOptions) -> Self {
        Self { defaults }
    }

    /// Parse a config from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a config from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file '{}': {e}", path.display()))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Resolve the options for one call against these defaults
    pub fn resolve(&self, call: &PaginateOptions) -> ResolvedOptions {
        ResolvedOptions::resolve(&self.defaults, call)
    }
}

// ============================================================================
// Resolved options
// ============================================================================

/// Fully-populated options for one call, with page and limit coerced
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub page: i64,
    pub limit: Limit,
    pub sort: Option<SortSpec>,
    pub projection: Option<ProjectionSpec>,
    pub labels: Labels,
    pub error_messages: ErrorMessages,
    pub timeout: Option<Duration>,
}

impl ResolvedOptions {
    /// Merge built-in defaults, then `overrides`, then `call`
    pub fn resolve(overrides: &PaginateOptions, call: &PaginateOptions) -> Self {
        let merged = overrides.layer(call);

        Self {
            page: merged.page.as_ref().map_or(DEFAULT_PAGE, coerce_page),
            limit: merged
                .limit
                .as_ref()
                .map_or(Limit::Count(DEFAULT_LIMIT), coerce_limit),
            sort: merged.sort.flatten().filter(|s| !s.is_null()),
            projection: merged.projection.flatten().filter(|p| !p.is_null()),
            labels: merged
                .labels
                .map_or_else(Labels::default, |l| l.apply(Labels::default())),
            error_messages: merged
                .error_messages
                .map_or_else(ErrorMessages::default, |m| m.apply(ErrorMessages::default())),
            timeout: merged.timeout_ms.map(Duration::from_millis),
        }
    }
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self::resolve(&PaginateOptions::default(), &PaginateOptions::default())
    }
}
