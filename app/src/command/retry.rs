use kgimport_config::{Config, EnvSource};
use kgimport_core::{BatchDriver, ImportSummary, RetryPlan, stdout_progress};
use kgimport_sources::{SourceKind, latest_export};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::{RunSettings, connect, default_memory_file, finish, print_banner};

pub struct RetryInput {
    pub env: EnvSource,
    pub listing: Option<PathBuf>,
    pub source: SourceKind,
    pub results: PathBuf,
    pub out: PathBuf,
    pub export_dir: PathBuf,
    pub concurrency: usize,
    /// Pause after each success; defaults to the source's retry pause.
    pub delay_ms: Option<u64>,
    pub group_id: Option<String>,
}

/// Strategy for re-running only the failures of a previous run.
///
/// Nothing is submitted, and the service is never contacted, when the
/// previous run had no failures or none of them is found in the listing.
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy;

impl super::CommandStrategy for RetryStrategy {
    type Input = RetryInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load(&input.env)?;
        let previous = ImportSummary::load(&input.results)?;

        let listing_path = match (input.listing, input.source) {
            (Some(path), _) => path,
            (None, SourceKind::Confluence) => latest_export(&input.export_dir)?,
            (None, SourceKind::Memory) => default_memory_file(),
        };
        info!(
            "Retrying {} failures against {} listing {}",
            previous.failed(),
            input.source,
            listing_path.display()
        );

        let rule = input.source.title_rule();
        let listing = input.source.load(&listing_path)?;

        let plan = RetryPlan::build(&previous, listing, &rule);
        let retry_count = match &plan {
            RetryPlan::NothingFailed => {
                println!("No failed items to retry!");
                return Ok(());
            }
            RetryPlan::NoMatches { failed } => {
                println!("Found {failed} failed items, but none of them is in the listing.");
                return Ok(());
            }
            RetryPlan::Ready { failed, items } => {
                println!("Found {failed} failed items, {} to retry\n", items.len());
                items.len()
            }
        };

        let driver_config = RunSettings {
            concurrency: input.concurrency,
            success_delay: None,
            max_chars: None,
            group_id: input.group_id,
            title_rule: rule,
        }
        .driver_config(&config)
        .for_retry(
            input
                .delay_ms
                .map_or(input.source.retry_delay(), Duration::from_millis),
        );

        print_banner("RETRY FAILED ITEMS", &listing_path, retry_count, &driver_config);

        let client = connect(&config).await?;
        let driver = BatchDriver::new(client, driver_config).with_progress(stdout_progress());
        if let Some(summary) = plan.execute(&driver).await {
            finish(&summary, &input.out)?;
        }
        Ok(())
    }
}
