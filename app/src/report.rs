//! End-of-run report.

use kgimport_core::{ImportSummary, truncate_chars};

/// Failures listed in the report; the rest are only in the results file.
const REPORTED_ERRORS: usize = 5;
const ERROR_PREVIEW_CHARS: usize = 50;

#[must_use]
pub fn format_report(summary: &ImportSummary) -> Vec<String> {
    let rule = "=".repeat(60);
    let mut lines = vec![
        rule.clone(),
        "IMPORT COMPLETE".to_string(),
        rule,
        format!("Pages imported: {}/{}", summary.success, summary.total),
        format!("Entities created: {}", summary.entities),
        format!("Relationships created: {}", summary.edges),
        format!("Errors: {}", summary.failed()),
        format!(
            "Time: {:.1}s ({:.1}s/page)",
            summary.elapsed_seconds,
            summary.seconds_per_item()
        ),
    ];

    if !summary.errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for record in summary.errors.iter().take(REPORTED_ERRORS) {
            lines.push(format!(
                "  - {}: {}",
                record.title,
                truncate_chars(&record.error, ERROR_PREVIEW_CHARS)
            ));
        }
        let hidden = summary.failed().saturating_sub(REPORTED_ERRORS);
        if hidden > 0 {
            lines.push(format!("  ... and {hidden} more"));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgimport_core::FailureRecord;

    fn failure(i: usize) -> FailureRecord {
        FailureRecord {
            title: format!("Page {i}"),
            error: "HTTP 429: Too Many Requests, retry after the window closes".to_string(),
            name: Some(format!("OC-{i}")),
        }
    }

    #[test]
    fn clean_run_has_no_error_section() {
        let summary = ImportSummary {
            success: 4,
            total: 4,
            entities: 12,
            edges: 5,
            errors: Vec::new(),
            elapsed_seconds: 10.0,
        };
        let lines = format_report(&summary);
        assert!(lines.contains(&"Pages imported: 4/4".to_string()));
        assert!(lines.contains(&"Entities created: 12".to_string()));
        assert!(lines.contains(&"Relationships created: 5".to_string()));
        assert!(lines.contains(&"Time: 10.0s (2.5s/page)".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("  - ")));
    }

    #[test]
    fn only_first_errors_are_listed_and_truncated() {
        let summary = ImportSummary {
            success: 1,
            total: 8,
            errors: (0..7).map(failure).collect(),
            ..ImportSummary::default()
        };
        let lines = format_report(&summary);
        let listed: Vec<_> = lines.iter().filter(|l| l.starts_with("  - ")).collect();
        assert_eq!(listed.len(), 5);
        assert_eq!(
            listed[0].as_str(),
            "  - Page 0: HTTP 429: Too Many Requests, retry after the windo"
        );
        assert_eq!(lines.last().map(String::as_str), Some("  ... and 2 more"));
    }
}
