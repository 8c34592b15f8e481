//! Suite reporting — the plain-text summary artifact consumed by CI and a
//! human-readable results table.

use std::path::Path;

use maple_e2e_core::E2eResult;
use serde::{Deserialize, Serialize};

use crate::orchestrator::{SuiteReport, TestOutcome};
use crate::test_case::TestStatus;

/// Aggregate counts over a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Names of tests that failed terminally, in run order.
    pub failed_tests: Vec<String>,
    /// Names of tests that passed only after a retry.
    pub flaky_tests: Vec<String>,
}

impl SuiteSummary {
    pub fn from_outcomes(outcomes: &[TestOutcome]) -> Self {
        let count = |status: TestStatus| outcomes.iter().filter(|o| o.status == status).count();

        Self {
            total: outcomes.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            failed_tests: outcomes
                .iter()
                .filter(|o| o.status == TestStatus::Failed)
                .map(|o| o.name.clone())
                .collect(),
            flaky_tests: outcomes
                .iter()
                .filter(|o| o.is_flaky())
                .map(|o| o.name.clone())
                .collect(),
        }
    }
}

/// The summary artifact, one fact per line.
pub fn render_summary(summary: &SuiteSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total tests: {}\n", summary.total));
    out.push_str(&format!("Passed: {}\n", summary.passed));
    out.push_str(&format!("Failed: {}\n", summary.failed));
    if !summary.failed_tests.is_empty() {
        out.push_str(&format!("Failed tests: {}\n", summary.failed_tests.join(", ")));
    }
    out
}

/// Write the summary artifact, creating parent directories as needed.
pub async fn write_summary(path: &Path, summary: &SuiteSummary) -> E2eResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, render_summary(summary)).await?;
    Ok(())
}

/// Render the report as a formatted text table.
pub fn render_text(title: &str, report: &SuiteReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();
    out.push_str(&format!("=== {title} ===\n"));
    out.push_str(&format!(
        "Total: {} | Passed: {} | Failed: {} | Skipped: {}\n\n",
        summary.total, summary.passed, summary.failed, summary.skipped,
    ));

    out.push_str(&format!(
        "  {:<34} {:<8} {:<9} {}\n",
        "Test", "Status", "Attempts", "Detail"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(70)));

    for o in &report.outcomes {
        out.push_str(&format!(
            "  {:<34} {:<8} {:<9} {}\n",
            o.name,
            o.status.label(),
            o.attempts,
            first_line(&o.detail),
        ));
    }

    if !summary.flaky_tests.is_empty() {
        out.push_str(&format!(
            "\nFlaky (passed after retry): {}\n",
            summary.flaky_tests.join(", ")
        ));
    }

    out
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}
