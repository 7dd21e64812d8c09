//! Confluence page exports.
//!
//! An export is a JSON array of pages. Pages that do not deserialize are
//! skipped with a warning; a file that is not an array at all is fatal.

use chrono::{DateTime, NaiveDateTime, Utc};
use kgimport_core::{ImportItem, TitleRule};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const TITLE_PREFIX: &str = "Confluence page: ";
pub const TITLE_CHARS: usize = 40;
/// Default pause after each imported page.
pub const RUN_DELAY: Duration = Duration::from_millis(500);

/// File name pattern of exports prepared for graph ingestion.
const EXPORT_PATTERN: &str = "*-graphiti-*.json";

#[must_use]
pub fn title_rule() -> TitleRule {
    TitleRule::new(Some(TITLE_PREFIX), TITLE_CHARS)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfluencePage {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub source_description: Option<String>,
    #[serde(default)]
    pub reference_time: Option<String>,
}

impl ConfluencePage {
    #[must_use]
    pub fn into_item(self) -> ImportItem {
        let label = self
            .source_description
            .clone()
            .unwrap_or_else(|| self.name.clone());
        let reference_time = self
            .reference_time
            .as_deref()
            .and_then(parse_reference_time);

        ImportItem {
            name: self.name,
            label,
            body: kgimport_core::ItemBody::Text(self.content),
            source_description: self.source_description,
            reference_time,
        }
    }
}

/// Accepts RFC 3339 (including a `Z` suffix) or a bare local timestamp,
/// which is taken as UTC.
fn parse_reference_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn load_export(path: &Path) -> anyhow::Result<Vec<ImportItem>> {
    if !path.exists() {
        anyhow::bail!("Export file not found at: {}", path.display());
    }

    let content = std::fs::read_to_string(path)?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&content)?;

    let mut items = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ConfluencePage>(entry) {
            Ok(page) => items.push(page.into_item()),
            Err(e) => warn!("Skipping malformed page #{index}: {e}"),
        }
    }

    info!("Loaded {} pages from {}", items.len(), path.display());
    Ok(items)
}

/// Picks the newest export in `dir`, by file name.
pub fn latest_export(dir: &Path) -> anyhow::Result<PathBuf> {
    let pattern = dir.join(EXPORT_PATTERN);
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Export directory is not valid UTF-8: {}", dir.display()))?;

    let mut exports: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
    exports.sort();

    exports
        .pop()
        .ok_or_else(|| anyhow::anyhow!("No Graphiti export files found in {}", dir.display()))
}
