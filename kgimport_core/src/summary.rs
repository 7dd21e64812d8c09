use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::item::truncate_chars;
use crate::{EpisodeOutcome, ErrorClass};

/// Characters of an error message shown on a progress line.
const PROGRESS_ERROR_CHARS: usize = 60;

/// Outcome of a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResult {
    Success {
        title: String,
        outcome: EpisodeOutcome,
    },
    Failure {
        title: String,
        name: String,
        /// Full message; truncation happens only when displayed.
        error: String,
        class: ErrorClass,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureRecord {
    pub title: String,
    pub error: String,
    /// Episode name of the failed item. Older summaries only carry `title`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Final, immutable record of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportSummary {
    pub success: usize,
    pub total: usize,
    pub entities: usize,
    pub edges: usize,
    pub errors: Vec<FailureRecord>,
    #[serde(default)]
    pub elapsed_seconds: f64,
}

impl ImportSummary {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn seconds_per_item(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let total = self.total as f64;
            self.elapsed_seconds / total
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Results file not found at: {}", path.display());
        }
        let content = std::fs::read_to_string(path)?;
        let summary: Self = serde_json::from_str(&content)?;
        Ok(summary)
    }
}

/// Progress notification emitted once per completed item.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    /// 1-based completion ordinal.
    pub ordinal: usize,
    pub total: usize,
    pub result: &'a ImportResult,
    /// Pause the failure imposed on later submissions, if any.
    pub backoff: Option<Duration>,
}

impl ProgressEvent<'_> {
    #[must_use]
    pub fn line(&self) -> String {
        let progress = format!("[{}/{}]", self.ordinal, self.total);
        match self.result {
            ImportResult::Success { title, outcome } => format!(
                "{progress} OK: {title} ({}e/{}r)",
                outcome.nodes_created, outcome.edges_created
            ),
            ImportResult::Failure { title, error, .. } => format!(
                "{progress} ERR: {title} - {}",
                truncate_chars(error, PROGRESS_ERROR_CHARS)
            ),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent<'_>) + Send + Sync>;

/// Progress callback writing one line per item to stdout.
#[must_use]
pub fn stdout_progress() -> ProgressCallback {
    Arc::new(|event: &ProgressEvent<'_>| {
        println!("{}", event.line());
        if let (
            ImportResult::Failure {
                class: ErrorClass::RateLimited,
                ..
            },
            Some(backoff),
        ) = (event.result, event.backoff)
        {
            println!("Rate limit - waiting {}s...", backoff.as_secs());
        }
    })
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    success: usize,
    entities: usize,
    edges: usize,
    errors: Vec<FailureRecord>,
}

/// Run-wide counters. Every update goes through [`Aggregator::record`],
/// which serializes mutation and progress output under one lock.
pub struct Aggregator {
    total: usize,
    tally: Mutex<Tally>,
}

impl Aggregator {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            tally: Mutex::new(Tally::default()),
        }
    }

    /// Folds one result into the counters and emits its progress event.
    /// Returns the completion ordinal.
    pub async fn record(
        &self,
        result: &ImportResult,
        backoff: Option<Duration>,
        progress: Option<&ProgressCallback>,
    ) -> usize {
        let mut tally = self.tally.lock().await;
        tally.completed += 1;
        match result {
            ImportResult::Success { outcome, .. } => {
                tally.success += 1;
                tally.entities += outcome.nodes_created;
                tally.edges += outcome.edges_created;
            }
            ImportResult::Failure {
                title, name, error, ..
            } => tally.errors.push(FailureRecord {
                title: title.clone(),
                error: error.clone(),
                name: Some(name.clone()),
            }),
        }

        let ordinal = tally.completed;
        if let Some(cb) = progress {
            cb(&ProgressEvent {
                ordinal,
                total: self.total,
                result,
                backoff,
            });
        }
        ordinal
    }

    /// Drains the counters into a summary. Results recorded afterwards
    /// start a fresh tally.
    pub async fn finish(&self, elapsed: Duration) -> ImportSummary {
        let tally = std::mem::take(&mut *self.tally.lock().await);
        ImportSummary {
            success: tally.success,
            total: tally.completed,
            entities: tally.entities,
            edges: tally.edges,
            errors: tally.errors,
            elapsed_seconds: elapsed.as_secs_f64(),
        }
    }
}
