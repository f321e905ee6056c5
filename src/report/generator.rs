//! Markdown and JSON report generation.
//!
//! Renders the combined metric set as a sorted table plus run metadata
//! and the list of screenshots that failed extraction.

use crate::config::{ReportConfig, SortBy};
use crate::metrics::format_metric_label;
use crate::models::{CombinedReport, MetricMap, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &CombinedReport, config: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Storymetrics Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    // Combined metrics table
    output.push_str(&generate_metrics_section(&report.metrics, config.sort_by));

    // Failed screenshots
    if config.include_failed {
        output.push_str(&generate_failures_section(report));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Screenshots Processed:** {} of {}\n",
        metadata.files_processed, metadata.total_files_uploaded
    ));
    if metadata.group_count > 0 {
        section.push_str(&format!(
            "- **Duplicate Groups:** {}\n",
            metadata.group_count
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the combined metrics table.
fn generate_metrics_section(metrics: &MetricMap, sort_by: SortBy) -> String {
    let mut section = String::new();

    section.push_str("## Combined Metrics\n\n");

    if metrics.is_empty() {
        section.push_str(
            "No metrics were extracted from the uploaded screenshots. \
             Please ensure the images contain clear story insights data.\n\n",
        );
        return section;
    }

    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");

    for (key, value) in sorted_metrics(metrics, sort_by) {
        section.push_str(&format!(
            "| {} | {} |\n",
            format_metric_label(key),
            format_value(value)
        ));
    }
    section.push('\n');

    section
}

/// Generate the failed screenshots section.
fn generate_failures_section(report: &CombinedReport) -> String {
    if report.failed_files.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failed Screenshots\n\n");
    section.push_str("| File | Error |\n");
    section.push_str("|:---|:---|\n");

    for failed in &report.failed_files {
        section.push_str(&format!("| `{}` | {} |\n", failed.filename, failed.error));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by storymetrics*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &CombinedReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Metric entries in report order.
///
/// Value order is descending with name as tie-break, so the output is
/// deterministic run to run.
fn sorted_metrics(metrics: &MetricMap, sort_by: SortBy) -> Vec<(&String, f64)> {
    let mut entries: Vec<(&String, f64)> = metrics.iter().map(|(k, &v)| (k, v)).collect();

    if sort_by == SortBy::Value {
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
    }
    // SortBy::Name keeps the BTreeMap's alphabetical order.

    entries
}

/// Format a metric value with thousands separators.
///
/// Counts render without decimals; fractional metrics (completion rates)
/// keep up to two decimal places.
fn format_value(value: f64) -> String {
    let formatted = if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    };

    let (number, fraction) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };

    let (sign, digits) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if fraction.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailedSource;
    use chrono::Utc;

    fn create_test_report() -> CombinedReport {
        let metrics: MetricMap = [
            ("impressions".to_string(), 1500.0),
            ("reach".to_string(), 985.0),
            ("follows".to_string(), 5.0),
            ("story_completion_rate".to_string(), 87.5),
        ]
        .into_iter()
        .collect();

        CombinedReport {
            success: true,
            metadata: ReportMetadata {
                analysis_date: Utc::now(),
                model_used: "gpt-4o".to_string(),
                files_processed: 2,
                total_files_uploaded: 3,
                group_count: 1,
                duration_seconds: 4.2,
            },
            metrics,
            failed_files: vec![FailedSource {
                filename: "story3.png".to_string(),
                error: "Request timed out after 120s".to_string(),
            }],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# Storymetrics Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Combined Metrics"));
        assert!(markdown.contains("| Impressions | 1,500 |"));
        assert!(markdown.contains("| Story Completion Rate | 87.5 |"));
        assert!(markdown.contains("## Failed Screenshots"));
        assert!(markdown.contains("story3.png"));
    }

    #[test]
    fn test_markdown_sorted_by_value_descending() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        let impressions = markdown.find("| Impressions |").unwrap();
        let reach = markdown.find("| Reach |").unwrap();
        let follows = markdown.find("| Follows |").unwrap();
        assert!(impressions < reach);
        assert!(reach > impressions);
        assert!(follows > reach);
    }

    #[test]
    fn test_markdown_sorted_by_name() {
        let report = create_test_report();
        let config = ReportConfig {
            sort_by: SortBy::Name,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &config);

        let follows = markdown.find("| Follows |").unwrap();
        let impressions = markdown.find("| Impressions |").unwrap();
        assert!(follows < impressions);
    }

    #[test]
    fn test_empty_metrics_notice() {
        let mut report = create_test_report();
        report.metrics.clear();

        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("No metrics were extracted"));
        assert!(!markdown.contains("| Metric | Value |"));
    }

    #[test]
    fn test_failures_section_can_be_disabled() {
        let report = create_test_report();
        let config = ReportConfig {
            include_failed: false,
            ..ReportConfig::default()
        };
        let markdown = generate_markdown_report(&report, &config);

        assert!(!markdown.contains("## Failed Screenshots"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"success\""));
        assert!(json.contains("\"metrics\""));
        assert!(json.contains("\"impressions\""));
        assert!(json.contains("\"failed_files\""));
        assert!(json.contains("\"total_files_uploaded\""));
    }

    #[test]
    fn test_format_value_grouping() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(5.0), "5");
        assert_eq!(format_value(1234.0), "1,234");
        assert_eq!(format_value(1234567.0), "1,234,567");
        assert_eq!(format_value(87.5), "87.5");
        assert_eq!(format_value(12.25), "12.25");
        assert_eq!(format_value(-1234.0), "-1,234");
    }

    #[test]
    fn test_sorted_metrics_tie_break_is_alphabetical() {
        let metrics: MetricMap = [
            ("shares".to_string(), 5.0),
            ("follows".to_string(), 5.0),
        ]
        .into_iter()
        .collect();

        let sorted = sorted_metrics(&metrics, SortBy::Value);
        assert_eq!(sorted[0].0, "follows");
        assert_eq!(sorted[1].0, "shares");
    }
}
