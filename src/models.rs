//! Data models for the insights extractor.
//!
//! This module contains all the core data structures used throughout
//! the application for representing metric maps, per-source outcomes,
//! and the combined report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapping of canonical metric key to numeric value.
///
/// Keys are canonical (lower-cased, underscore-separated, see
/// [`crate::metrics::normalize`]). Absence of a key means the metric was
/// not observed, which is distinct from a value of zero. A `BTreeMap`
/// keeps iteration order deterministic for reproducible reports.
pub type MetricMap = BTreeMap<String, f64>;

/// Outcome of one extraction attempt, in upload order.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// Extraction succeeded; the map may still be empty or partial.
    Extracted(MetricMap),
    /// Extraction failed; the source keeps its slot but contributes nothing.
    Failed(FailedSource),
}

impl SourceOutcome {
    /// The metrics this source contributes to aggregation.
    ///
    /// A failed source yields an empty map, which is the identity for both
    /// reduction rules, so group indices declared against upload order stay
    /// valid without remapping.
    pub fn metrics(&self) -> MetricMap {
        match self {
            SourceOutcome::Extracted(map) => map.clone(),
            SourceOutcome::Failed(_) => MetricMap::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed(_))
    }
}

/// A source image that failed extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSource {
    /// File name of the uploaded screenshot.
    pub filename: String,
    /// Error message from the extraction attempt.
    pub error: String,
}

/// Metadata about the extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Name of the vision model used.
    pub model_used: String,
    /// Number of screenshots successfully processed.
    pub files_processed: usize,
    /// Total number of screenshots uploaded.
    pub total_files_uploaded: usize,
    /// Number of duplicate groups supplied by the caller.
    pub group_count: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete result of one extraction-and-aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedReport {
    /// Whether at least one screenshot was processed successfully.
    pub success: bool,
    /// Metadata about the run.
    pub metadata: ReportMetadata,
    /// The combined metric map across all sources.
    pub metrics: MetricMap,
    /// Screenshots that failed extraction.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_files: Vec<FailedSource>,
}

impl CombinedReport {
    /// True when every uploaded screenshot failed extraction.
    pub fn all_failed(&self) -> bool {
        self.metadata.files_processed == 0 && self.metadata.total_files_uploaded > 0
    }
}
