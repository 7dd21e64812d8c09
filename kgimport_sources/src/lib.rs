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

pub mod confluence;
pub mod memory;

pub use confluence::{ConfluencePage, latest_export, load_export};
pub use memory::{MemoryStore, load_memory_store, prioritize};

use kgimport_core::{ImportItem, RETRY_SUCCESS_DELAY, TitleRule};
use std::path::Path;
use std::time::Duration;

/// Kinds of source listing the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Confluence,
    Memory,
}

impl SourceKind {
    /// Title normalization for this source. Used both when failures are
    /// recorded and when a retry matches them.
    #[must_use]
    pub fn title_rule(self) -> TitleRule {
        match self {
            Self::Confluence => confluence::title_rule(),
            Self::Memory => memory::title_rule(),
        }
    }

    /// Default pause after each success in a first run.
    #[must_use]
    pub const fn run_delay(self) -> Duration {
        match self {
            Self::Confluence => confluence::RUN_DELAY,
            Self::Memory => memory::RUN_DELAY,
        }
    }

    /// Default pause after each success when retrying failures. Always
    /// longer than [`SourceKind::run_delay`].
    #[must_use]
    pub const fn retry_delay(self) -> Duration {
        match self {
            Self::Confluence => RETRY_SUCCESS_DELAY,
            Self::Memory => memory::RETRY_DELAY,
        }
    }

    /// Reads the full listing for this source kind.
    pub fn load(self, path: &Path) -> anyhow::Result<Vec<ImportItem>> {
        match self {
            Self::Confluence => load_export(path),
            Self::Memory => Ok(prioritize(load_memory_store(path)?.into_items())),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confluence => write!(f, "confluence"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_pace_slower_than_first_runs() {
        for kind in [SourceKind::Confluence, SourceKind::Memory] {
            assert!(kind.retry_delay() > kind.run_delay(), "{kind}");
        }
    }
}
