//! Pipeline types
//!
//! Defines stages in their typed form and the document form
//! (`{"$op": argument}`) exchanged with aggregation engines.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue, ProjectionSpec, SortSpec};
use serde::{Deserialize, Serialize};

/// Field the count stage writes the number of matching documents into
pub const COUNT_FIELD: &str = "totalDocs";

/// A single aggregation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub enum Stage {
    /// `$match`: filter documents
    Match(JsonValue),
    /// `$sort`: order documents by the given spec
    Sort(SortSpec),
    /// `$skip`: drop the first N documents
    Skip(u64),
    /// `$limit`: keep at most N documents
    Limit(u64),
    /// `$project`: reshape documents
    Project(ProjectionSpec),
    /// `$count`: replace the stream with `{field: count}`
    Count(String),
    /// Any other stage, kept verbatim in document form
    Other(JsonValue),
}

impl Stage {
    /// Create a match stage
    pub fn match_(filter: JsonValue) -> Self {
        Self::Match(filter)
    }

    /// Create a sort stage
    pub fn sort(spec: SortSpec) -> Self {
        Self::Sort(spec)
    }

    /// Create a projection stage
    pub fn project(spec: ProjectionSpec) -> Self {
        Self::Project(spec)
    }

    /// Create a count stage
    pub fn count(field: impl Into<String>) -> Self {
        Self::Count(field.into())
    }

    /// Operator name of this stage, `$`-prefixed
    pub fn operator(&self) -> &str {
        match self {
            Self::Match(_) => "$match",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Project(_) => "$project",
            Self::Count(_) => "$count",
            Self::Other(raw) => raw
                .as_object()
                .and_then(|obj| obj.keys().next())
                .map_or("$unknown", String::as_str),
        }
    }

    /// Render this stage in document form
    pub fn to_value(&self) -> JsonValue {
        let (op, arg) = match self {
            Self::Match(filter) => ("$match", filter.clone()),
            Self::Sort(spec) => ("$sort", spec.clone()),
            Self::Skip(n) => ("$skip", JsonValue::from(*n)),
            Self::Limit(n) => ("$limit", JsonValue::from(*n)),
            Self::Project(spec) => ("$project", spec.clone()),
            Self::Count(field) => ("$count", JsonValue::from(field.as_str())),
            Self::Other(raw) => return raw.clone(),
        };
        let mut obj = JsonObject::new();
        obj.insert(op.to_string(), arg);
        JsonValue::Object(obj)
    }

    /// Parse a stage from document form
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_stage(format!("expected an object, got {value}")))?;

        let mut entries = obj.iter();
        let (op, arg) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(Error::invalid_stage(format!(
                    "a stage must have exactly one operator, got {} keys",
                    obj.len()
                )))
            }
        };

        match op.as_str() {
            "$match" => {
                expect_object(op, arg)?;
                Ok(Self::Match(arg.clone()))
            }
            "$sort" => {
                let spec = expect_object(op, arg)?;
                if spec.is_empty() {
                    return Err(Error::invalid_stage("$sort requires at least one key"));
                }
                Ok(Self::Sort(arg.clone()))
            }
            "$skip" => Ok(Self::Skip(expect_count(op, arg)?)),
            "$limit" => match expect_count(op, arg)? {
                0 => Err(Error::invalid_stage("$limit must be positive")),
                n => Ok(Self::Limit(n)),
            },
            "$project" => {
                expect_object(op, arg)?;
                Ok(Self::Project(arg.clone()))
            }
            "$count" => match arg.as_str() {
                Some(field) if !field.is_empty() => Ok(Self::Count(field.to_string())),
                _ => Err(Error::invalid_stage("$count requires a non-empty field name")),
            },
            other if other.starts_with('$') => Ok(Self::Other(value.clone())),
            other => Err(Error::invalid_stage(format!(
                "unrecognized stage '{other}', operators start with '$'"
            ))),
        }
    }
}

fn expect_object<'a>(op: &str, arg: &'a JsonValue) -> Result<&'a JsonObject> {
    arg.as_object()
        .ok_or_else(|| Error::invalid_stage(format!("{op} expects an object, got {arg}")))
}

fn expect_count(op: &str, arg: &JsonValue) -> Result<u64> {
    arg.as_u64()
        .or_else(|| {
            // Drivers often send whole numbers as doubles
            arg.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
        .ok_or_else(|| {
            Error::invalid_stage(format!("{op} expects a non-negative integer, got {arg}"))
        })
}

impl From<Stage> for JsonValue {
    fn from(stage: Stage) -> Self {
        stage.to_value()
    }
}

impl TryFrom<JsonValue> for Stage {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        Stage::from_value(&value)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered sequence of aggregation stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline from stages
    pub fn from_stages(stages: impl IntoIterator<Item = Stage>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    /// Parse a pipeline from a JSON array of stages
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            Error::invalid_stage(format!("a pipeline must be an array, got {value}"))
        })?;
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                Stage::from_value(item).map_err(|e| match e {
                    Error::InvalidStage { message } => {
                        Error::invalid_stage(format!("stage {idx}: {message}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(|stages| Self { stages })
    }

    /// Append a stage, builder style
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Return a new pipeline with `suffix` appended after every existing stage
    #[must_use]
    pub fn extended(&self, suffix: impl IntoIterator<Item = Stage>) -> Self {
        let mut stages = self.stages.clone();
        stages.extend(suffix);
        Self { stages }
    }

    /// Return a new pipeline terminated by a count stage writing into `field`
    #[must_use]
    pub fn with_count(&self, field: &str) -> Self {
        self.extended([Stage::count(field)])
    }

    /// Stages in execution order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.stages.iter()
    }

    /// Render the pipeline in document form
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Array(self.stages.iter().map(Stage::to_value).collect())
    }
}

impl FromIterator<Stage> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self::from_stages(iter)
    }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}
