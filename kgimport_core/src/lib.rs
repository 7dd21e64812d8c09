#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod classify;
pub mod driver;
pub mod item;
pub mod pacing;
pub mod retry;
pub mod summary;

pub use classify::{ErrorClass, classify};
pub use driver::{BatchDriver, DriverConfig};
pub use item::{EntityRecord, ImportItem, ItemBody, TitleRule, truncate_chars};
pub use pacing::{IntervalGate, PacingPolicy, RateGate};
pub use retry::{RETRY_SUCCESS_DELAY, RetryPlan, RetrySet};
pub use summary::{
    Aggregator, FailureRecord, ImportResult, ImportSummary, ProgressCallback, ProgressEvent,
    stdout_progress,
};

/// One unit of text handed to the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Episode {
    pub name: String,
    pub body: String,
    pub source_description: String,
    pub reference_time: DateTime<Utc>,
    pub group_id: String,
}

/// Graph growth reported back for a single episode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpisodeOutcome {
    pub nodes_created: usize,
    pub edges_created: usize,
}

/// The external "add episode" operation.
///
/// Implementations perform entity/relationship extraction and persistence
/// elsewhere; the driver only sees counts or an error whose message may
/// carry a rate-limit signal.
#[async_trait]
pub trait EpisodeIngestor: Send + Sync {
    async fn add_episode(&self, episode: &Episode) -> anyhow::Result<EpisodeOutcome>;
}
