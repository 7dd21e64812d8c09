use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::Episode;

/// A structured record from a key/value memory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRecord {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

impl EntityRecord {
    /// Labeled-field rendering: identifier line, type line, then one line per
    /// observation.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!("Entity: {}\nType: {}", self.name, self.entity_type);
        if !self.observations.is_empty() {
            text.push_str("\nObservations:");
            for obs in &self.observations {
                let _ = write!(text, "\n- {obs}");
            }
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemBody {
    Text(String),
    Entity(EntityRecord),
}

impl ItemBody {
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Entity(record) => record.render(),
        }
    }
}

/// One entry of a source listing. Never mutated after it is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportItem {
    /// Episode name submitted to the collaborator; also the stable retry key.
    pub name: String,
    /// Raw display label the progress title is derived from.
    pub label: String,
    pub body: ItemBody,
    pub source_description: Option<String>,
    pub reference_time: Option<DateTime<Utc>>,
}

impl ImportItem {
    #[must_use]
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            body: ItemBody::Text(content.into()),
            source_description: None,
            reference_time: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_source_description(mut self, description: impl Into<String>) -> Self {
        self.source_description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_reference_time(mut self, at: DateTime<Utc>) -> Self {
        self.reference_time = Some(at);
        self
    }

    #[must_use]
    pub fn title(&self, rule: &TitleRule) -> String {
        rule.apply(&self.label)
    }

    /// Builds the submission payload, rendering structured bodies and
    /// capping the text at `max_chars` characters.
    #[must_use]
    pub fn to_episode(&self, group_id: &str, max_chars: usize, now: DateTime<Utc>) -> Episode {
        let rendered = self.body.render();
        Episode {
            name: self.name.clone(),
            body: truncate_chars(&rendered, max_chars).to_string(),
            source_description: self.source_description.clone().unwrap_or_default(),
            reference_time: self.reference_time.unwrap_or(now),
            group_id: group_id.to_string(),
        }
    }
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Derives the short display title used in progress output and failure
/// records. Recording and retry matching must use the same rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRule {
    strip_prefix: Option<String>,
    max_chars: usize,
}

impl TitleRule {
    #[must_use]
    pub fn new(strip_prefix: Option<&str>, max_chars: usize) -> Self {
        Self {
            strip_prefix: strip_prefix.map(str::to_string),
            max_chars,
        }
    }

    #[must_use]
    pub fn apply(&self, label: &str) -> String {
        let stripped = self
            .strip_prefix
            .as_deref()
            .and_then(|prefix| label.strip_prefix(prefix))
            .unwrap_or(label);
        truncate_chars(stripped, self.max_chars).to_string()
    }
}

impl Default for TitleRule {
    fn default() -> Self {
        Self::new(None, 40)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> EntityRecord {
        EntityRecord {
            name: "payments-service".to_string(),
            entity_type: "Service".to_string(),
            observations: vec!["owned by team A".to_string(), "runs on k8s".to_string()],
        }
    }

    #[test]
    fn entity_render_uses_labeled_fields() {
        assert_eq!(
            record().render(),
            "Entity: payments-service\nType: Service\nObservations:\n- owned by team A\n- runs on k8s"
        );
    }

    #[test]
    fn entity_render_without_observations() {
        let mut rec = record();
        rec.observations.clear();
        assert_eq!(rec.render(), "Entity: payments-service\nType: Service");
    }

    #[test]
    fn render_is_deterministic() {
        let body = ItemBody::Entity(record());
        assert_eq!(body.render().as_bytes(), body.render().as_bytes());
    }

    #[test]
    fn truncation_caps_long_content() {
        let long = "x".repeat(6500);
        assert_eq!(truncate_chars(&long, 6000).chars().count(), 6000);
    }

    #[test]
    fn truncation_leaves_short_content_alone() {
        assert_eq!(truncate_chars("short", 6000), "short");
        let exact = "y".repeat(10);
        assert_eq!(truncate_chars(&exact, 10), exact);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
    }

    #[test]
    fn title_rule_strips_prefix_and_truncates() {
        let rule = TitleRule::new(Some("Confluence page: "), 10);
        assert_eq!(rule.apply("Confluence page: Onboarding Guide"), "Onboarding");
        assert_eq!(rule.apply("Release notes"), "Release no");
    }

    #[test]
    fn episode_uses_item_reference_time_when_present() {
        let now = Utc.with_ymd_and_hms(2025, 11, 25, 12, 0, 0).single().unwrap_or_default();
        let then = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().unwrap_or_default();

        let item = ImportItem::text("page", "body").with_reference_time(then);
        assert_eq!(item.to_episode("g", 100, now).reference_time, then);

        let item = ImportItem::text("page", "body");
        let episode = item.to_episode("g", 2, now);
        assert_eq!(episode.reference_time, now);
        assert_eq!(episode.body, "bo");
        assert_eq!(episode.source_description, "");
        assert_eq!(episode.group_id, "g");
    }
}
