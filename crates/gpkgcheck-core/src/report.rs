//! Validation report (stable output shape)
//!
//! This shape is consumed by publishing pipelines.
//! Only add fields; never rename or remove them.

use serde::{Deserialize, Serialize};
use crate::result::ResultRecord;

/// Tool version recorded in every report
pub const REPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Report of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Version of the tool that produced the report
    pub version: String,

    /// Start of the run (RFC 3339)
    pub start_time: String,

    /// Wall-clock duration of the run
    pub duration_seconds: f64,

    /// The validated file
    pub file: String,

    /// Overall verdict
    pub success: bool,

    /// Validation codes that were executed, in execution order
    pub validations_executed: Vec<String>,

    /// Result records, in execution order
    pub results: Vec<ResultRecord>,
}

impl Report {
    /// Start a report for a file; the clock starts now
    pub fn start(file: impl Into<String>) -> ReportBuilder {
        ReportBuilder {
            file: file.into(),
            started: chrono::Utc::now(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Captures the start of a run until its results are known
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    file: String,
    started: chrono::DateTime<chrono::Utc>,
}

impl ReportBuilder {
    /// Finish the report with the run's outcome
    pub fn finish(
        self,
        success: bool,
        validations_executed: Vec<String>,
        results: Vec<ResultRecord>,
    ) -> Report {
        let elapsed = chrono::Utc::now() - self.started;
        let duration_seconds = elapsed
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or_else(|| elapsed.num_seconds() as f64);

        Report {
            version: REPORT_VERSION.to_string(),
            start_time: self.started.to_rfc3339(),
            duration_seconds,
            file: self.file,
            success,
            validations_executed,
            results,
        }
    }
}
