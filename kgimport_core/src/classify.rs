//! Error classification for backoff selection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimited,
    Transient,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// Classifies an ingestion error message.
///
/// A message mentioning "rate" (any case) or the HTTP status 429 counts as
/// rate limiting; everything else is a generic transient failure.
#[must_use]
pub fn classify(message: &str) -> ErrorClass {
    if message.to_lowercase().contains("rate") || message.contains("429") {
        ErrorClass::RateLimited
    } else {
        ErrorClass::Transient
    }
}
