use async_trait::async_trait;
use kgimport_core::{Episode, EpisodeIngestor, EpisodeOutcome, truncate_chars};
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::retry::{Backoff, retry_with_backoff};

/// Characters of an error response body kept in the error message.
const ERROR_BODY_CHARS: usize = 200;

/// Failures reported by the graph service itself. The status code stays in
/// the message so rate limiting can be recognized from text alone.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response format: missing {0}")]
    InvalidResponse(&'static str),
}

#[derive(Debug, Clone)]
pub struct ExtractionModels {
    pub llm: String,
    pub small_llm: String,
    pub embedding: String,
}

impl Default for ExtractionModels {
    fn default() -> Self {
        Self {
            llm: "gpt-4o-mini".to_string(),
            small_llm: "gpt-4o-mini".to_string(),
            embedding: "text-embedding-3-small".to_string(),
        }
    }
}

/// HTTP client for a graph-ingestion service exposing "add episode".
pub struct GraphitiClient {
    client: Client,
    api_key: String,
    base_url: String,
    database: String,
    models: ExtractionModels,
}

impl GraphitiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        info!("Creating GraphitiClient for {base_url}");
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: "default".to_string(),
            models: ExtractionModels::default(),
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: String) -> Self {
        self.database = database;
        self
    }

    #[must_use]
    pub fn with_models(mut self, models: ExtractionModels) -> Self {
        self.models = models;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.client
            .get(format!("{}/healthcheck", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Probes the service until it answers or `backoff` is exhausted.
    pub async fn wait_until_ready(&self, backoff: &Backoff) -> anyhow::Result<()> {
        retry_with_backoff(|| self.health_check(), backoff, "Graph service health check").await?;
        info!("Graph service at {} is ready", self.base_url);
        Ok(())
    }

    fn episode_request(&self, episode: &Episode) -> serde_json::Value {
        json!({
            "name": episode.name,
            "episode_body": episode.body,
            "source": "text",
            "source_description": episode.source_description,
            "reference_time": episode.reference_time.to_rfc3339(),
            "group_id": episode.group_id,
            "database": self.database,
            "llm": {
                "model": self.models.llm,
                "small_model": self.models.small_llm,
                "embedding_model": self.models.embedding,
            },
        })
    }
}

#[async_trait]
impl EpisodeIngestor for GraphitiClient {
    async fn add_episode(&self, episode: &Episode) -> anyhow::Result<EpisodeOutcome> {
        debug!("Posting episode '{}' to {}", episode.name, self.base_url);

        let response = self
            .client
            .post(format!("{}/episodes", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.episode_request(episode))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Status {
                status: status.as_u16(),
                body: truncate_chars(body.trim(), ERROR_BODY_CHARS).to_string(),
            }
            .into());
        }

        let body = response.json::<serde_json::Value>().await?;
        Ok(outcome_from_response(&body)?)
    }
}

/// Reads node/edge counts from either the full `{nodes, edges}` listing or
/// the compact `{nodes_created, edges_created}` form.
fn outcome_from_response(body: &serde_json::Value) -> Result<EpisodeOutcome, IngestError> {
    let count = |list: &str, counter: &str| -> Option<usize> {
        body[list]
            .as_array()
            .map(Vec::len)
            .or_else(|| body[counter].as_u64().and_then(|n| usize::try_from(n).ok()))
    };

    let nodes_created = count("nodes", "nodes_created")
        .ok_or(IngestError::InvalidResponse("nodes"))?;
    let edges_created = count("edges", "edges_created")
        .ok_or(IngestError::InvalidResponse("edges"))?;

    Ok(EpisodeOutcome {
        nodes_created,
        edges_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn outcome_from_listing() {
        let body = json!({"nodes": [{}, {}, {}], "edges": [{}]});
        let outcome = outcome_from_response(&body).unwrap_or_default();
        assert_eq!(outcome.nodes_created, 3);
        assert_eq!(outcome.edges_created, 1);
    }

    #[test]
    fn outcome_from_counters() {
        let body = json!({"nodes_created": 7, "edges_created": 4});
        let outcome = outcome_from_response(&body).unwrap_or_default();
        assert_eq!(outcome.nodes_created, 7);
        assert_eq!(outcome.edges_created, 4);
    }

    #[test]
    fn outcome_requires_counts() {
        assert!(outcome_from_response(&json!({"status": "queued"})).is_err());
    }

    #[test]
    fn status_error_keeps_code_for_classification() {
        let err = IngestError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 429: slow down");
        assert_eq!(
            kgimport_core::classify(&err.to_string()),
            kgimport_core::ErrorClass::RateLimited
        );
    }

    #[test]
    fn request_carries_episode_and_routing() {
        let client = GraphitiClient::new("http://localhost:8000/".to_string(), "sk".to_string())
            .with_database("confluence-oc".to_string());
        assert_eq!(client.base_url(), "http://localhost:8000");

        let episode = Episode {
            name: "Onboarding".to_string(),
            body: "Welcome".to_string(),
            source_description: "Confluence page: Onboarding".to_string(),
            reference_time: Utc
                .with_ymd_and_hms(2025, 11, 25, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            group_id: "confluence-oc".to_string(),
        };
        let request = client.episode_request(&episode);
        assert_eq!(request["name"], "Onboarding");
        assert_eq!(request["episode_body"], "Welcome");
        assert_eq!(request["source"], "text");
        assert_eq!(request["group_id"], "confluence-oc");
        assert_eq!(request["database"], "confluence-oc");
        assert_eq!(request["reference_time"], "2025-11-25T00:00:00+00:00");
        assert_eq!(request["llm"]["embedding_model"], "text-embedding-3-small");
    }
}
