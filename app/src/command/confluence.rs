use kgimport_config::{Config, EnvSource};
use kgimport_sources::{SourceKind, latest_export};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::{RunSettings, connect, print_banner, run_and_save};

pub struct ConfluenceInput {
    pub env: EnvSource,
    pub export: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub results: PathBuf,
    pub concurrency: usize,
    pub delay_ms: Option<u64>,
    pub max_chars: Option<usize>,
    pub group_id: Option<String>,
}

/// Strategy for importing a Confluence page export.
#[derive(Debug, Clone, Copy)]
pub struct ConfluenceStrategy;

impl super::CommandStrategy for ConfluenceStrategy {
    type Input = ConfluenceInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load(&input.env)?;

        let export = match input.export {
            Some(path) => path,
            None => latest_export(&input.export_dir)?,
        };
        info!("Using export {}", export.display());

        let source = SourceKind::Confluence;
        let items = source.load(&export)?;
        let driver_config = RunSettings {
            concurrency: input.concurrency,
            success_delay: Some(
                input
                    .delay_ms
                    .map_or(source.run_delay(), Duration::from_millis),
            ),
            max_chars: input.max_chars,
            group_id: input.group_id,
            title_rule: source.title_rule(),
        }
        .driver_config(&config);

        print_banner("CONFLUENCE IMPORT", &export, items.len(), &driver_config);

        let client = connect(&config).await?;
        run_and_save(client, driver_config, items, &input.results).await
    }
}
