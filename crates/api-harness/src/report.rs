//! Result recording, console reporting and the JSON run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Kinds of fixture the harness creates on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Issue,
    Department,
}

/// Fixtures created on the server during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureTally {
    pub users: usize,
    pub issues: usize,
    pub departments: usize,
}

impl FixtureTally {
    pub fn add(&mut self, entity: Entity, count: usize) {
        match entity {
            Entity::User => self.users += count,
            Entity::Issue => self.issues += count,
            Entity::Department => self.departments += count,
        }
    }

    pub fn merge(&mut self, other: FixtureTally) {
        self.users += other.users;
        self.issues += other.issues;
        self.departments += other.departments;
    }
}

/// Outcome of one executed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_data: Option<Value>,
}

/// Aggregate of one harness run, written to the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: String,
    pub timestamp: DateTime<Utc>,
    pub suites: Vec<String>,
    pub fixtures_created: FixtureTally,
    pub test_details: Vec<TestResult>,
}

impl RunSummary {
    /// Derive the summary from the ordered results of a run.
    pub fn from_results(
        results: Vec<TestResult>,
        suites: Vec<String>,
        fixtures_created: FixtureTally,
    ) -> Self {
        let total_tests = results.len();
        let passed = results.iter().filter(|result| result.success).count();

        Self {
            total_tests,
            passed,
            failed: total_tests - passed,
            success_rate: success_rate(passed, total_tests),
            timestamp: Utc::now(),
            suites,
            fixtures_created,
            test_details: results,
        }
    }

    /// Whether every check passed. An empty run counts as passing.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code for this run: 0 when every check passed, else 1.
    pub fn exit_code(&self) -> u8 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

/// `passed/total` as a percentage with one decimal; `"0%"` for an empty run.
pub fn success_rate(passed: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = passed as f64 / total as f64 * 100.0;
    format!("{rate:.1}%")
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to write results file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize run summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write `summary` as pretty JSON to `path`, replacing any previous file.
pub fn persist_summary(summary: &RunSummary, path: &Path) -> Result<(), PersistError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

const RULE: &str = "============================================================";

/// Human-readable console report.
///
/// Writes to any sink so the output can be captured; the binary uses stdout
/// through [`RunContext::stdout`](crate::sequencer::RunContext::stdout).
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the reporter and return its sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Banner printed before the first check.
    pub fn start(&mut self, base_url: &str, suites: &[String]) -> io::Result<()> {
        writeln!(self.out, "🚀 Starting Civic Reporter API checks against {base_url}")?;
        writeln!(self.out, "   Suites: {}", suites.join(", "))?;
        writeln!(self.out, "{RULE}")
    }

    /// Header printed before each suite.
    pub fn suite(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "\n📋 {name}")
    }

    /// One line per check, plus the response snapshot for failures.
    pub fn check(&mut self, result: &TestResult) -> io::Result<()> {
        let status = if result.success { "✅ PASS" } else { "❌ FAIL" };
        writeln!(self.out, "{status} {}: {}", result.name, result.message)?;

        if let (false, Some(snapshot)) = (result.success, &result.response_data) {
            let pretty = serde_json::to_string_pretty(snapshot).unwrap_or_default();
            writeln!(self.out, "   Response: {pretty}")?;
        }
        Ok(())
    }

    /// Final tally.
    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        writeln!(self.out, "\n{RULE}")?;
        writeln!(
            self.out,
            "📊 Test Results: {}/{} checks passed",
            summary.passed, summary.total_tests
        )?;
        if summary.all_passed() {
            writeln!(self.out, "🎉 All checks passed!")?;
        } else {
            writeln!(
                self.out,
                "⚠️  {} checks failed. Check the log above for details.",
                summary.failed
            )?;
        }

        writeln!(self.out, "\n📋 Summary:")?;
        writeln!(self.out, "   Total Tests: {}", summary.total_tests)?;
        writeln!(self.out, "   Passed: {}", summary.passed)?;
        writeln!(self.out, "   Failed: {}", summary.failed)?;
        writeln!(self.out, "   Success Rate: {}", summary.success_rate)?;
        writeln!(
            self.out,
            "   Fixtures Created: {} users, {} issues, {} departments",
            summary.fixtures_created.users,
            summary.fixtures_created.issues,
            summary.fixtures_created.departments
        )
    }

    /// Where the artifact went, or why it could not be written.
    pub fn persisted(&mut self, path: &Path, result: &Result<(), PersistError>) -> io::Result<()> {
        match result {
            Ok(()) => writeln!(self.out, "\n📄 Detailed results saved to: {}", path.display()),
            Err(e) => writeln!(self.out, "\n❌ Could not save results to {}: {e}", path.display()),
        }
    }
}
