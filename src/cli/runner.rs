//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{PaginateOptions, PaginatorConfig};
use crate::engine::MemoryEngine;
use crate::error::{Error, Result, ResultExt};
use crate::pagination::Paginator;
use crate::pipeline::Pipeline;
use crate::types::{Document, NumberLike};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command and print its output
    pub async fn run(&self) -> Result<()> {
        let output = self.execute().await?;
        self.print(&output)
    }

    /// Run the CLI command and return its output document
    pub async fn execute(&self) -> Result<Value> {
        match &self.cli.command {
            Commands::Paginate { data, pipeline, .. } => {
                let options = self.call_options()?;
                self.paginate(data, pipeline.as_deref(), &options).await
            }
            Commands::Defaults => self.defaults(),
        }
    }

    /// Load process-level defaults from `--config`
    fn load_config(&self) -> Result<PaginatorConfig> {
        match &self.cli.config {
            Some(path) => {
                debug!("Loading defaults from {}", path.display());
                PaginatorConfig::from_file(path)
            }
            None => Ok(PaginatorConfig::default()),
        }
    }

    /// Build per-call options: the `--options` file, then individual flags
    fn call_options(&self) -> Result<PaginateOptions> {
        let Commands::Paginate {
            options,
            page,
            limit,
            sort,
            project,
            meta,
            flat,
            timeout_ms,
            ..
        } = &self.cli.command
        else {
            return Ok(PaginateOptions::default());
        };

        let from_file = match options {
            Some(path) => PaginatorConfig::from_file(path)
                .with_context(|| format!("Invalid options file '{}'", path.display()))?
                .defaults,
            None => PaginateOptions::default(),
        };

        let mut flags = PaginateOptions {
            page: page.clone().map(NumberLike::Text),
            limit: limit.clone().map(NumberLike::Text),
            // `--sort null` clears a sort inherited from the options file
            sort: sort
                .as_deref()
                .map(|s| parse_inline("--sort", s))
                .transpose()?
                .map(Some),
            projection: project
                .as_deref()
                .map(|p| parse_inline("--project", p))
                .transpose()?
                .map(Some),
            timeout_ms: *timeout_ms,
            ..PaginateOptions::default()
        };
        if let Some(meta) = meta {
            flags = flags.meta_label(meta.clone());
        }
        if *flat {
            flags = flags.flat();
        }

        Ok(from_file.layer(&flags))
    }

    async fn paginate(
        &self,
        data: &Path,
        pipeline: Option<&Path>,
        options: &PaginateOptions,
    ) -> Result<Value> {
        let documents = load_documents(data)?;
        let pipeline = match pipeline {
            Some(path) => {
                let contents = read_file(path)?;
                let value: Value = serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid pipeline file '{}'", path.display()))?;
                Pipeline::from_value(&value)?
            }
            None => Pipeline::new(),
        };

        info!(
            "Paginating {} documents through {} stages",
            documents.len(),
            pipeline.len()
        );

        let paginator = Paginator::new(MemoryEngine::new(documents)).with_config(self.load_config()?);
        let page = paginator.paginate(&pipeline, options).await?;
        Ok(page.to_value())
    }

    fn defaults(&self) -> Result<Value> {
        let resolved = self.load_config()?.resolve(&PaginateOptions::default());
        Ok(json!({
            "page": resolved.page,
            "limit": resolved.limit,
            "sort": resolved.sort,
            "projection": resolved.projection,
            "labels": resolved.labels,
            "errorMessages": {
                "page": {"min": resolved.error_messages.page_min},
                "limit": {"min": resolved.error_messages.limit_min},
            },
            "timeoutMs": resolved.timeout.map(|t| t.as_millis() as u64),
        }))
    }

    fn print(&self, output: &Value) -> Result<()> {
        let rendered = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(output)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(output)?,
        };
        println!("{rendered}");
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read '{}': {e}", path.display())))
}

fn parse_inline(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{flag} must be valid JSON"))
}

/// Load documents from a JSON array file or a JSON-lines file
fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let contents = read_file(path)?;

    if path.extension().and_then(|ext| ext.to_str()) == Some("jsonl") {
        return contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid document", path.display(), idx + 1))
            })
            .collect();
    }

    match serde_json::from_str::<Value>(&contents)? {
        Value::Array(documents) => Ok(documents),
        other => Err(Error::config(format!(
            "'{}' must contain a JSON array of documents, found {}",
            path.display(),
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
