//! Replaying the failures of a previous run.

use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

use crate::{BatchDriver, DriverConfig, ImportItem, ImportSummary, TitleRule};

/// Default pause between successful retries.
pub const RETRY_SUCCESS_DELAY: Duration = Duration::from_secs(2);

/// Failure keys recovered from a prior [`ImportSummary`].
///
/// Records that carry the item name are matched on it; older records only
/// have the normalized title and are matched on that.
#[derive(Debug, Clone, Default)]
pub struct RetrySet {
    names: HashSet<String>,
    titles: HashSet<String>,
}

impl RetrySet {
    #[must_use]
    pub fn from_summary(summary: &ImportSummary) -> Self {
        let mut set = Self::default();
        for record in &summary.errors {
            match &record.name {
                Some(name) => {
                    set.names.insert(name.clone());
                }
                None => {
                    set.titles.insert(record.title.clone());
                }
            }
        }
        set
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len() + self.titles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.titles.is_empty()
    }

    #[must_use]
    pub fn matches(&self, item: &ImportItem, rule: &TitleRule) -> bool {
        self.names.contains(&item.name) || self.titles.contains(&item.title(rule))
    }

    /// Keeps the listing entries that failed before, in listing order.
    #[must_use]
    pub fn select(&self, listing: Vec<ImportItem>, rule: &TitleRule) -> Vec<ImportItem> {
        listing
            .into_iter()
            .filter(|item| self.matches(item, rule))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPlan {
    /// The prior run recorded no failures.
    NothingFailed,
    /// Failures were recorded but none of them is in the listing.
    NoMatches { failed: usize },
    Ready {
        failed: usize,
        items: Vec<ImportItem>,
    },
}

impl RetryPlan {
    #[must_use]
    pub fn build(summary: &ImportSummary, listing: Vec<ImportItem>, rule: &TitleRule) -> Self {
        let set = RetrySet::from_summary(summary);
        if set.is_empty() {
            return Self::NothingFailed;
        }

        let failed = set.len();
        let items = set.select(listing, rule);
        info!("Matched {} of {failed} failed items in listing", items.len());

        if items.is_empty() {
            Self::NoMatches { failed }
        } else {
            Self::Ready { failed, items }
        }
    }

    /// Runs the retry through `driver`. Returns `None`, without contacting
    /// the collaborator, when there is nothing to retry. The result covers
    /// only the retried subset.
    pub async fn execute(self, driver: &BatchDriver) -> Option<ImportSummary> {
        match self {
            Self::NothingFailed | Self::NoMatches { .. } => None,
            Self::Ready { items, .. } => Some(driver.run(items).await),
        }
    }
}

impl DriverConfig {
    /// Same settings with the longer inter-item pause used for retries.
    #[must_use]
    pub fn for_retry(mut self, success_delay: Duration) -> Self {
        self.pacing = self.pacing.with_success_delay(success_delay);
        self
    }
}
