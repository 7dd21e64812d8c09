use kgimport_config::{Config, EnvSource};
use kgimport_sources::{SourceKind, load_memory_store, prioritize};
use std::path::PathBuf;
use std::time::Duration;

use super::{RunSettings, connect, default_memory_file, print_banner, run_and_save};

/// Entity types listed before a migration.
const BREAKDOWN_ROWS: usize = 10;

pub struct MemoryInput {
    pub env: EnvSource,
    pub file: Option<PathBuf>,
    pub results: PathBuf,
    pub concurrency: usize,
    pub delay_ms: Option<u64>,
    pub group_id: Option<String>,
}

/// Strategy for migrating a legacy memory store into the graph.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStrategy;

impl super::CommandStrategy for MemoryStrategy {
    type Input = MemoryInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load(&input.env)?;
        let file = input.file.unwrap_or_else(default_memory_file);

        let store = load_memory_store(&file)?;
        println!("Entities: {}", store.entities.len());
        println!("Relations: {}", store.relations.len());
        if store.skipped > 0 {
            println!("Skipped lines: {}", store.skipped);
        }
        println!("\nEntity types:");
        for (entity_type, count) in store.type_breakdown(BREAKDOWN_ROWS) {
            println!("  {entity_type}: {count}");
        }
        println!();

        let items = prioritize(store.into_items());
        let driver_config = RunSettings {
            concurrency: input.concurrency,
            success_delay: Some(
                input
                    .delay_ms
                    .map_or(SourceKind::Memory.run_delay(), Duration::from_millis),
            ),
            max_chars: None,
            group_id: input.group_id,
            title_rule: SourceKind::Memory.title_rule(),
        }
        .driver_config(&config);

        print_banner("MEMORY MIGRATION", &file, items.len(), &driver_config);

        let client = connect(&config).await?;
        run_and_save(client, driver_config, items, &input.results).await
    }
}
