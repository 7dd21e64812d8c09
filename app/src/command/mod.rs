//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use kgimport_config::Config;
use kgimport_core::{
    BatchDriver, DriverConfig, ImportItem, ImportSummary, PacingPolicy, TitleRule, stdout_progress,
};
use kgimport_providers::{Backoff, ExtractionModels, GraphitiClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::report::format_report;

mod confluence;
mod info;
mod init;
mod memory;
mod retry;
mod version;

pub use confluence::{ConfluenceInput, ConfluenceStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use memory::{MemoryInput, MemoryStrategy};
pub use retry::{RetryInput, RetryStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via the associated type, so
/// parameters are passed without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Run settings shared by the import commands.
struct RunSettings {
    concurrency: usize,
    /// Pause after each success. `None` keeps the pacing default.
    success_delay: Option<Duration>,
    max_chars: Option<usize>,
    group_id: Option<String>,
    title_rule: TitleRule,
}

impl RunSettings {
    fn driver_config(self, config: &Config) -> DriverConfig {
        DriverConfig {
            concurrency: self.concurrency.max(1),
            group_id: self
                .group_id
                .unwrap_or_else(|| config.backend.group_id.clone()),
            max_body_chars: self.max_chars.unwrap_or(config.import.max_chars),
            item_timeout: Duration::from_secs(config.import.timeout_secs),
            title_rule: self.title_rule,
            pacing: self
                .success_delay
                .map_or_else(PacingPolicy::default, |delay| {
                    PacingPolicy::default().with_success_delay(delay)
                }),
        }
    }
}

/// Builds the HTTP collaborator and waits for the service to answer.
/// An unreachable service is fatal before any item is submitted.
async fn connect(config: &Config) -> anyhow::Result<Arc<GraphitiClient>> {
    let client = GraphitiClient::new(
        config.backend.base_url(),
        config.providers.openai.api_key.clone(),
    )
    .with_database(config.backend.database.clone())
    .with_models(ExtractionModels {
        llm: config.models.llm.clone(),
        small_llm: config.models.small_llm.clone(),
        embedding: config.models.embedding.clone(),
    });

    client.wait_until_ready(&Backoff::default()).await?;
    Ok(Arc::new(client))
}

fn print_banner(heading: &str, source: &Path, items: usize, config: &DriverConfig) {
    println!("{}", "=".repeat(60));
    println!("{heading}");
    println!("{}", "=".repeat(60));
    println!("Source: {}", source.display());
    println!("Items: {items}");
    println!("Concurrency: {}", config.concurrency);
    println!("Group: {}", config.group_id);
    println!();
}

/// Drives `items` through the collaborator, then reports and persists the
/// summary.
async fn run_and_save(
    client: Arc<GraphitiClient>,
    driver_config: DriverConfig,
    items: Vec<ImportItem>,
    results: &Path,
) -> anyhow::Result<()> {
    let driver = BatchDriver::new(client, driver_config).with_progress(stdout_progress());
    let summary = driver.run(items).await;
    finish(&summary, results)
}

fn finish(summary: &ImportSummary, results: &Path) -> anyhow::Result<()> {
    println!();
    for line in format_report(summary) {
        println!("{line}");
    }

    if let Some(parent) = results.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    summary.save(results)?;
    info!("Results saved to {}", results.display());
    println!("\nResults saved to: {}", results.display());
    Ok(())
}

fn default_memory_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memory")
        .join("memory.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgimport_config::{ConfigError, EnvSource};
    use kgimport_sources::SourceKind;

    fn no_process_env(_key: &str) -> Option<String> {
        None
    }

    /// An env file that configures everything except the credential.
    fn keyless_env(dir: &Path) -> EnvSource {
        let path = dir.join(".env");
        std::fs::write(&path, "GRAPHITI_HOST=localhost\nGROUP_ID=ops\n")
            .unwrap_or_else(|e| panic!("write: {e}"));
        EnvSource::new(vec![path]).with_lookup(no_process_env)
    }

    fn assert_missing_credential(result: anyhow::Result<()>) {
        let err = match result {
            Ok(()) => panic!("run should not start without a credential"),
            Err(e) => e,
        };
        assert!(
            matches!(
                err.downcast_ref::<ConfigError>(),
                Some(ConfigError::MissingCredential("OPENAI_API_KEY"))
            ),
            "unexpected error: {err:#}"
        );
    }

    // The listings below do not exist: reaching them would fail with a
    // file error instead of the credential error.

    #[tokio::test]
    async fn confluence_stops_before_reading_the_export() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let results = dir.path().join("import-results.json");
        let input = ConfluenceInput {
            env: keyless_env(dir.path()),
            export: None,
            export_dir: dir.path().join("no-exports"),
            results: results.clone(),
            concurrency: 1,
            delay_ms: None,
            max_chars: None,
            group_id: None,
        };

        assert_missing_credential(ConfluenceStrategy.execute(input).await);
        assert!(!results.exists());
    }

    #[tokio::test]
    async fn memory_stops_before_reading_the_store() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let results = dir.path().join("memory-import-results.json");
        let input = MemoryInput {
            env: keyless_env(dir.path()),
            file: Some(dir.path().join("memory.json")),
            results: results.clone(),
            concurrency: 2,
            delay_ms: None,
            group_id: None,
        };

        assert_missing_credential(MemoryStrategy.execute(input).await);
        assert!(!results.exists());
    }

    #[tokio::test]
    async fn retry_stops_before_reading_prior_results() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let out = dir.path().join("retry-results.json");
        let input = RetryInput {
            env: keyless_env(dir.path()),
            listing: Some(dir.path().join("export.json")),
            source: SourceKind::Confluence,
            results: dir.path().join("import-results.json"),
            out: out.clone(),
            export_dir: dir.path().to_path_buf(),
            concurrency: 1,
            delay_ms: None,
            group_id: None,
        };

        assert_missing_credential(RetryStrategy.execute(input).await);
        assert!(!out.exists());
    }

    #[test]
    fn run_settings_fall_back_to_config() {
        let config = Config::from_lookup(|key| {
            (key == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap_or_else(|e| panic!("config: {e}"));
        let driver_config = RunSettings {
            concurrency: 0,
            success_delay: None,
            max_chars: None,
            group_id: None,
            title_rule: SourceKind::Memory.title_rule(),
        }
        .driver_config(&config);

        assert_eq!(driver_config.concurrency, 1);
        assert_eq!(driver_config.group_id, "confluence-oc");
        assert_eq!(driver_config.max_body_chars, 6000);
        assert_eq!(driver_config.item_timeout, Duration::from_secs(300));
        assert_eq!(driver_config.pacing, PacingPolicy::default());
    }
}
