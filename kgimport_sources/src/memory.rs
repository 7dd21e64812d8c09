//! Legacy key/value memory store (JSON lines of entities and relations).

use kgimport_core::{EntityRecord, ImportItem, ItemBody, TitleRule};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const EPISODE_PREFIX: &str = "Memory import: ";
pub const SOURCE_DESCRIPTION: &str = "Migrated from Memory MCP";
/// Default pause after each migrated entity.
pub const RUN_DELAY: Duration = Duration::from_secs(2);
pub const RETRY_DELAY: Duration = Duration::from_secs(4);

/// Entity types imported last; they are numerous and least connected.
const DEFERRED_TYPES: [&str; 4] = ["JiraTicket", "jira-ticket", "Jira Ticket", "JIRA Ticket"];

#[must_use]
pub fn title_rule() -> TitleRule {
    TitleRule::new(None, 40)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StoreLine {
    Entity {
        name: String,
        #[serde(rename = "entityType", default = "unknown_type")]
        entity_type: String,
        #[serde(default)]
        observations: Vec<String>,
    },
    Relation {
        from: String,
        to: String,
        #[serde(rename = "relationType")]
        relation_type: String,
    },
    #[serde(other)]
    Other,
}

fn unknown_type() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRelation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub entities: Vec<EntityRecord>,
    pub relations: Vec<MemoryRelation>,
    /// Lines that could not be parsed.
    pub skipped: usize,
}

impl MemoryStore {
    /// Entity counts per type, most common first, at most `limit` rows.
    #[must_use]
    pub fn type_breakdown(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entity in &self.entities {
            *counts.entry(entity.entity_type.as_str()).or_default() += 1;
        }

        let mut rows: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(t, n)| (t.to_string(), n))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit);
        rows
    }

    #[must_use]
    pub fn into_items(self) -> Vec<ImportItem> {
        self.entities.into_iter().map(entity_item).collect()
    }
}

fn entity_item(record: EntityRecord) -> ImportItem {
    ImportItem {
        name: format!("{EPISODE_PREFIX}{}", record.name),
        label: record.name.clone(),
        body: ItemBody::Entity(record),
        source_description: Some(SOURCE_DESCRIPTION.to_string()),
        reference_time: None,
    }
}

pub fn load_memory_store(path: &Path) -> anyhow::Result<MemoryStore> {
    if !path.exists() {
        anyhow::bail!("Memory file not found: {}", path.display());
    }

    let content = std::fs::read_to_string(path)?;
    let store = parse_memory_store(&content);

    info!(
        "Found {} entities and {} relations in {}",
        store.entities.len(),
        store.relations.len(),
        path.display()
    );
    Ok(store)
}

fn parse_memory_store(content: &str) -> MemoryStore {
    let mut store = MemoryStore::default();

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<StoreLine>(line) {
            Ok(StoreLine::Entity {
                name,
                entity_type,
                observations,
            }) => store.entities.push(EntityRecord {
                name,
                entity_type,
                observations,
            }),
            Ok(StoreLine::Relation {
                from,
                to,
                relation_type,
            }) => store.relations.push(MemoryRelation {
                from,
                to,
                relation_type,
            }),
            Ok(StoreLine::Other) => {}
            Err(e) => {
                let preview: String = line.chars().take(50).collect();
                warn!("Skipping malformed line: {preview}... ({e})");
                store.skipped += 1;
            }
        }
    }

    store
}

/// Moves JIRA ticket entities to the back, keeping relative order.
#[must_use]
pub fn prioritize(mut items: Vec<ImportItem>) -> Vec<ImportItem> {
    items.sort_by_key(|item| match &item.body {
        ItemBody::Entity(record) => DEFERRED_TYPES.contains(&record.entity_type.as_str()),
        ItemBody::Text(_) => false,
    });
    items
}
