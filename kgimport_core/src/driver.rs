//! Batch import driver.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::summary::{Aggregator, ImportResult, ImportSummary, ProgressCallback};
use crate::{EpisodeIngestor, ImportItem, IntervalGate, PacingPolicy, RateGate, TitleRule, classify};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum submissions in flight. `1` processes items strictly in order.
    pub concurrency: usize,
    pub group_id: String,
    /// Body length cap, in characters, applied before submission.
    pub max_body_chars: usize,
    pub item_timeout: Duration,
    pub title_rule: TitleRule,
    pub pacing: PacingPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            group_id: "default".to_string(),
            max_body_chars: 6000,
            item_timeout: Duration::from_secs(300),
            title_rule: TitleRule::default(),
            pacing: PacingPolicy::default(),
        }
    }
}

struct Shared {
    ingestor: Arc<dyn EpisodeIngestor>,
    gate: Arc<dyn RateGate>,
    aggregator: Aggregator,
    config: DriverConfig,
    progress: Option<ProgressCallback>,
}

/// Submits every item exactly once and folds the outcomes into an
/// [`ImportSummary`]. A failing item never stops the batch.
pub struct BatchDriver {
    ingestor: Arc<dyn EpisodeIngestor>,
    gate: Arc<dyn RateGate>,
    config: DriverConfig,
    progress: Option<ProgressCallback>,
}

impl BatchDriver {
    pub fn new(ingestor: Arc<dyn EpisodeIngestor>, config: DriverConfig) -> Self {
        Self {
            ingestor,
            gate: Arc::new(IntervalGate::new(config.pacing)),
            config,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(&self, items: Vec<ImportItem>) -> ImportSummary {
        let start = Instant::now();
        let total = items.len();
        let concurrency = self.config.concurrency.max(1);

        info!(
            total_items = total,
            concurrency,
            group_id = %self.config.group_id,
            "Starting import"
        );

        let shared = Arc::new(Shared {
            ingestor: Arc::clone(&self.ingestor),
            gate: Arc::clone(&self.gate),
            aggregator: Aggregator::new(total),
            config: self.config.clone(),
            progress: self.progress.clone(),
        });

        if concurrency == 1 {
            run_sequential(&shared, items).await;
        } else {
            run_bounded(&shared, items, concurrency).await;
        }

        let summary = shared.aggregator.finish(start.elapsed()).await;

        info!(
            success = summary.success,
            failed = summary.failed(),
            entities = summary.entities,
            edges = summary.edges,
            "Import finished in {:.1}s",
            summary.elapsed_seconds
        );
        summary
    }
}

/// One item at a time, in input order. Each item still runs in its own task
/// so a panicking ingestor is recorded like any other failure.
async fn run_sequential(shared: &Arc<Shared>, items: Vec<ImportItem>) {
    for item in items {
        let title = item.title(&shared.config.title_rule);
        let name = item.name.clone();
        let worker = Arc::clone(shared);
        let handle = tokio::spawn(async move { process_item(&worker, &item).await });
        settle(shared, handle, title, name).await;
    }
}

async fn run_bounded(shared: &Arc<Shared>, items: Vec<ImportItem>, concurrency: usize) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let shared = Arc::clone(shared);
        let semaphore = Arc::clone(&semaphore);
        let title = item.title(&shared.config.title_rule);
        let name = item.name.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                record_failure(&shared, &item, "admission gate closed".to_string()).await;
                return;
            };
            process_item(&shared, &item).await;
        });
        handles.push((handle, title, name));
    }

    for (handle, title, name) in handles {
        settle(shared, handle, title, name).await;
    }
}

/// Awaits a worker; one that died without recording its item is recorded
/// as a failure here.
async fn settle(shared: &Shared, handle: JoinHandle<()>, title: String, name: String) {
    if let Err(e) = handle.await {
        error!("Import worker for '{title}' aborted: {e}");
        let result = ImportResult::Failure {
            error: format!("worker aborted: {e}"),
            class: crate::ErrorClass::Transient,
            title,
            name,
        };
        shared
            .aggregator
            .record(&result, None, shared.progress.as_ref())
            .await;
    }
}

async fn process_item(shared: &Shared, item: &ImportItem) {
    shared.gate.admit().await;

    let config = &shared.config;
    let episode = item.to_episode(&config.group_id, config.max_body_chars, Utc::now());
    debug!(name = %item.name, chars = episode.body.chars().count(), "Submitting episode");

    match timeout(config.item_timeout, shared.ingestor.add_episode(&episode)).await {
        Ok(Ok(outcome)) => {
            shared.gate.on_success().await;
            let result = ImportResult::Success {
                title: item.title(&config.title_rule),
                outcome,
            };
            shared
                .aggregator
                .record(&result, None, shared.progress.as_ref())
                .await;
        }
        Ok(Err(e)) => record_failure(shared, item, format!("{e:#}")).await,
        Err(_) => {
            let message = format!("Timed out after {}s", config.item_timeout.as_secs());
            record_failure(shared, item, message).await;
        }
    }
}

async fn record_failure(shared: &Shared, item: &ImportItem, error: String) {
    let class = classify(&error);
    let backoff = shared.gate.on_failure(class).await;
    warn!(
        name = %item.name,
        %class,
        backoff_secs = backoff.as_secs_f64(),
        "Episode failed: {error}"
    );

    let result = ImportResult::Failure {
        title: item.title(&shared.config.title_rule),
        name: item.name.clone(),
        error,
        class,
    };
    shared
        .aggregator
        .record(&result, Some(backoff), shared.progress.as_ref())
        .await;
}
