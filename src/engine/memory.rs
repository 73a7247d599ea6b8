//! In-process aggregation engine
//!
//! Evaluates pipelines over a fixed vector of documents. Backs the CLI and
//! the test-suite; it understands the stages pagination emits plus `$match`.

use super::AggregationEngine;
use crate::error::BoxError;
use crate::pipeline::{Pipeline, Stage};
use crate::types::{Document, JsonObject, JsonValue};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while evaluating a pipeline in memory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryEngineError {
    #[error("Unsupported pipeline stage: {operator}")]
    UnsupportedStage { operator: String },

    #[error("Unsupported query operator: {operator}")]
    UnsupportedOperator { operator: String },

    #[error("Invalid {stage} specification: {message}")]
    InvalidSpec { stage: String, message: String },
}

/// Aggregation engine over an in-memory collection
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    documents: Vec<Document>,
    latency: Option<Duration>,
}

impl MemoryEngine {
    /// Create an engine over the given documents
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            latency: None,
        }
    }

    /// Delay every aggregation by `latency` before evaluating it
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Evaluate a pipeline synchronously
    pub fn run(&self, pipeline: &Pipeline) -> Result<Vec<Document>, MemoryEngineError> {
        let mut docs = self.documents.clone();
        for stage in pipeline {
            docs = apply_stage(stage, docs)?;
        }
        Ok(docs)
    }
}

#[async_trait]
impl AggregationEngine for MemoryEngine {
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, BoxError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.run(pipeline)?)
    }
}

fn apply_stage(stage: &Stage, docs: Vec<Document>) -> Result<Vec<Document>, MemoryEngineError> {
    match stage {
        Stage::Match(filter) => {
            let filter = filter.as_object().ok_or_else(|| invalid("$match", "expected an object"))?;
            let mut kept = Vec::with_capacity(docs.len());
            for doc in docs {
                if matches_filter(&doc, filter)? {
                    kept.push(doc);
                }
            }
            Ok(kept)
        }
        Stage::Sort(spec) => sort_documents(spec, docs),
        Stage::Skip(n) => Ok(docs.into_iter().skip(*n as usize).collect()),
        Stage::Limit(n) => Ok(docs.into_iter().take(*n as usize).collect()),
        Stage::Project(spec) => {
            let projection = Projection::parse(spec)?;
            Ok(docs.iter().map(|doc| projection.apply(doc)).collect())
        }
        Stage::Count(field) => {
            // Mirrors server behavior: no output record when nothing matched
            if docs.is_empty() {
                Ok(Vec::new())
            } else {
                let mut record = JsonObject::new();
                record.insert(field.clone(), JsonValue::from(docs.len()));
                Ok(vec![JsonValue::Object(record)])
            }
        }
        Stage::Other(_) => Err(MemoryEngineError::UnsupportedStage {
            operator: stage.operator().to_string(),
        }),
    }
}

fn invalid(stage: &str, message: impl Into<String>) -> MemoryEngineError {
    MemoryEngineError::InvalidSpec {
        stage: stage.to_string(),
        message: message.into(),
    }
}

// ============================================================================
// Field access and ordering
// ============================================================================

fn resolve_path<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(doc, |current, part| match current {
        JsonValue::Object(map) => map.get(part),
        JsonValue::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Rank of each JSON type in cross-type comparisons
fn type_rank(value: &JsonValue) -> u8 {
    match value {
        JsonValue::Null => 0,
        JsonValue::Number(_) => 1,
        JsonValue::String(_) => 2,
        JsonValue::Object(_) => 3,
        JsonValue::Array(_) => 4,
        JsonValue::Bool(_) => 5,
    }
}

static NULL: JsonValue = JsonValue::Null;

/// Total order over optional JSON values; missing sorts like null
fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    let a = a.unwrap_or(&NULL);
    let b = b.unwrap_or(&NULL);
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Array(x), JsonValue::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(Some(l), Some(r)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(spec: &JsonValue, mut docs: Vec<Document>) -> Result<Vec<Document>, MemoryEngineError> {
    let spec = spec.as_object().ok_or_else(|| invalid("$sort", "expected an object"))?;
    let keys = spec
        .iter()
        .map(|(field, direction)| match direction.as_i64() {
            Some(1) => Ok((field.as_str(), false)),
            Some(-1) => Ok((field.as_str(), true)),
            _ => Err(invalid("$sort", format!("direction for '{field}' must be 1 or -1"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Vec::sort_by is stable, so ties keep insertion order
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|(field, descending)| {
                let ord = compare_values(resolve_path(a, field), resolve_path(b, field));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    Ok(docs)
}

// ============================================================================
// $match
// ============================================================================

fn matches_filter(doc: &JsonValue, filter: &JsonObject) -> Result<bool, MemoryEngineError> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => all_clauses(doc, condition)?.iter().all(|m| *m),
            "$or" => all_clauses(doc, condition)?.iter().any(|m| *m),
            op if op.starts_with('$') => {
                return Err(MemoryEngineError::UnsupportedOperator {
                    operator: op.to_string(),
                })
            }
            path => matches_condition(resolve_path(doc, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_clauses(doc: &JsonValue, clauses: &JsonValue) -> Result<Vec<bool>, MemoryEngineError> {
    let clauses = clauses
        .as_array()
        .ok_or_else(|| invalid("$match", "logical operators take an array"))?;
    clauses
        .iter()
        .map(|clause| {
            let clause = clause
                .as_object()
                .ok_or_else(|| invalid("$match", "logical clauses must be objects"))?;
            matches_filter(doc, clause)
        })
        .collect()
}

fn is_operator_object(condition: &JsonValue) -> bool {
    condition
        .as_object()
        .is_some_and(|obj| !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')))
}

fn matches_condition(field: Option<&JsonValue>, condition: &JsonValue) -> Result<bool, MemoryEngineError> {
    if !is_operator_object(condition) {
        return Ok(equals(field, condition));
    }

    let Some(operators) = condition.as_object() else {
        return Ok(false);
    };
    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$gt" => ordered(field, operand, Ordering::is_gt),
            "$gte" => ordered(field, operand, Ordering::is_ge),
            "$lt" => ordered(field, operand, Ordering::is_lt),
            "$lte" => ordered(field, operand, Ordering::is_le),
            "$in" => operand_list(op, operand)?.iter().any(|v| equals(field, v)),
            "$nin" => !operand_list(op, operand)?.iter().any(|v| equals(field, v)),
            "$exists" => field.is_some() == operand.as_bool().unwrap_or(true),
            other => {
                return Err(MemoryEngineError::UnsupportedOperator {
                    operator: other.to_string(),
                })
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operand_list<'a>(op: &str, operand: &'a JsonValue) -> Result<&'a Vec<JsonValue>, MemoryEngineError> {
    operand
        .as_array()
        .ok_or_else(|| invalid("$match", format!("{op} takes an array")))
}

/// Equality with array-membership semantics for array fields
fn equals(field: Option<&JsonValue>, expected: &JsonValue) -> bool {
    match field {
        None => expected.is_null(),
        Some(JsonValue::Array(items)) if !expected.is_array() => items
            .iter()
            .any(|item| compare_values(Some(item), Some(expected)).is_eq()),
        Some(value) => {
            type_rank(value) == type_rank(expected)
                && compare_values(Some(value), Some(expected)).is_eq()
        }
    }
}

/// Range comparison; only values of the same type are comparable
fn ordered(field: Option<&JsonValue>, operand: &JsonValue, accept: fn(Ordering) -> bool) -> bool {
    match field {
        Some(value) if type_rank(value) == type_rank(operand) => {
            accept(compare_values(Some(value), Some(operand)))
        }
        _ => false,
    }
}

// ============================================================================
// $project
// ============================================================================

struct Projection {
    fields: Vec<String>,
    inclusive: bool,
    keep_id: bool,
}

impl Projection {
    fn parse(spec: &JsonValue) -> Result<Self, MemoryEngineError> {
        let spec = spec.as_object().ok_or_else(|| invalid("$project", "expected an object"))?;

        let mut keep_id = true;
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (field, flag) in spec {
            let include = match flag {
                JsonValue::Bool(b) => *b,
                JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                _ => {
                    return Err(invalid(
                        "$project",
                        format!("'{field}' must be 0/1 or a boolean"),
                    ))
                }
            };
            if field == "_id" {
                keep_id = include;
            } else if include {
                included.push(field.clone());
            } else {
                excluded.push(field.clone());
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(invalid("$project", "cannot mix inclusion and exclusion"));
        }

        // `{_id: 1}` alone is an inclusion projection of just the id
        let inclusive = !included.is_empty() || (excluded.is_empty() && keep_id);
        Ok(Self {
            fields: if inclusive { included } else { excluded },
            inclusive,
            keep_id,
        })
    }

    fn apply(&self, doc: &JsonValue) -> JsonValue {
        let JsonValue::Object(source) = doc else {
            return doc.clone();
        };

        if self.inclusive {
            let mut out = JsonObject::new();
            if self.keep_id {
                if let Some(id) = source.get("_id") {
                    out.insert("_id".to_string(), id.clone());
                }
            }
            for field in &self.fields {
                if let Some(value) = resolve_path(doc, field) {
                    insert_path(&mut out, field, value.clone());
                }
            }
            JsonValue::Object(out)
        } else {
            let mut out = source.clone();
            for field in &self.fields {
                out = without_path(&out, field);
            }
            if !self.keep_id {
                out = without_path(&out, "_id");
            }
            JsonValue::Object(out)
        }
    }
}

/// Set `path` in `out`, creating intermediate objects as needed
fn insert_path(out: &mut JsonObject, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            out.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = out
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(JsonObject::new()));
            if let JsonValue::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Copy of `source` without `path`; key order is kept
fn without_path(source: &JsonObject, path: &str) -> JsonObject {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    source
        .iter()
        .filter_map(|(key, value)| match (key == head, rest, value) {
            (false, _, _) => Some((key.clone(), value.clone())),
            (true, None, _) => None,
            (true, Some(rest), JsonValue::Object(child)) => {
                Some((key.clone(), JsonValue::Object(without_path(child, rest))))
            }
            (true, Some(_), _) => Some((key.clone(), value.clone())),
        })
        .collect()
}
