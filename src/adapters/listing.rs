use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;

use crate::domain::model::ModelRef;
use crate::domain::ports::ModelLister;
use crate::utils::error::{ExportError, Result};

/// Lists models by running `ollama ls`.
#[derive(Debug, Clone)]
pub struct OllamaCliLister {
    program: String,
}

impl OllamaCliLister {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ModelLister for OllamaCliLister {
    async fn list_models(&self) -> Result<Vec<ModelRef>> {
        tracing::debug!("Running '{} ls'", self.program);
        let output = Command::new(&self.program)
            .arg("ls")
            .output()
            .await
            .map_err(|e| ExportError::ModelListingError {
                message: format!("could not run '{} ls': {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(ExportError::ModelListingError {
                message: format!(
                    "'{} ls' exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_ls_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses `ollama ls` output: a header line, then one `NAME:TAG  ID  SIZE  MODIFIED` row per model.
pub fn parse_ls_output(output: &str) -> Result<Vec<ModelRef>> {
    let mut lines = output.lines();
    if lines.next().is_none() {
        return Err(ExportError::ModelListingError {
            message: "empty output from 'ollama ls'".to_string(),
        });
    }

    let models = lines
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| name.contains(':'))
        .filter_map(|name| name.parse().ok())
        .collect();
    Ok(models)
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
}

/// Lists models through the Ollama HTTP API (`GET /api/tags`).
#[derive(Debug, Clone)]
pub struct OllamaApiLister {
    host: String,
    client: Client,
}

impl OllamaApiLister {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ModelLister for OllamaApiLister {
    async fn list_models(&self) -> Result<Vec<ModelRef>> {
        let url = format!("{}/api/tags", self.host.trim_end_matches('/'));
        tracing::debug!("Making API request to: {}", url);

        let response = self.client.get(&url).send().await?;
        tracing::debug!("API response status: {}", response.status());
        if !response.status().is_success() {
            return Err(ExportError::ModelListingError {
                message: format!("{} returned {}", url, response.status()),
            });
        }

        let tags: TagsResponse = response.json().await?;
        let models = tags
            .models
            .iter()
            .filter_map(|m| match m.name.parse::<ModelRef>() {
                Ok(model) => Some(model),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping model listed as '{}': {}", m.name, e);
                    None
                }
            })
            .collect();
        Ok(models)
    }
}
