//! Wire types for the CircleCI API and the SimpleCov JSON coverage report.

use std::path::Path;

use serde::Deserialize;

use crate::error::{CovdeltaError, Result};

/// Artifact path the coverage job is expected to store its report under.
pub const COVERAGE_ARTIFACT_PATH: &str = "coverage/coverage.json";

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Top-level metrics of a coverage report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Metrics {
    pub covered_percent: f64,
    pub total_lines: i64,
    pub covered_lines: i64,
}

/// A parsed `coverage.json`. Only the file count of `files` matters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoverageReport {
    pub metrics: Metrics,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
}

impl CoverageReport {
    /// Parse a report. `source` names where the bytes came from, for errors.
    pub fn from_slice(bytes: &[u8], source: &str) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CovdeltaError::MalformedJson {
            url: source.to_string(),
            source: e,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Self::from_slice(&content, &path.display().to_string())
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            covered_percent: round2(self.metrics.covered_percent),
            files: self.files.len() as i64,
            total_lines: self.metrics.total_lines,
            misses: self.metrics.total_lines.saturating_sub(self.metrics.covered_lines),
        }
    }
}

/// The four numbers compared between two reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Covered percent, rounded to two decimals.
    pub covered_percent: f64,
    pub files: i64,
    pub total_lines: i64,
    pub misses: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct Workflows {
    job_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BuildParameters {
    #[serde(rename = "CIRCLE_JOB")]
    circle_job: Option<String>,
}

/// One entry of the recent-builds listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Build {
    pub build_num: u64,
    #[serde(default)]
    pub has_artifacts: bool,
    #[serde(default)]
    workflows: Option<Workflows>,
    #[serde(default)]
    build_parameters: Option<BuildParameters>,
}

impl Build {
    /// The workflow job name, falling back to `build_parameters.CIRCLE_JOB`
    /// for builds that predate workflows.
    pub fn job_name(&self) -> Option<&str> {
        self.workflows
            .as_ref()
            .and_then(|w| w.job_name.as_deref())
            .or_else(|| {
                self.build_parameters
                    .as_ref()
                    .and_then(|p| p.circle_job.as_deref())
            })
    }
}

/// One file stored by a build.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub url: String,
}

impl Artifact {
    #[must_use]
    pub fn is_coverage_report(&self) -> bool {
        self.path == COVERAGE_ARTIFACT_PATH
    }
}
