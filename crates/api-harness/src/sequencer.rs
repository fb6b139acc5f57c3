//! Ordered execution of checks.
//!
//! A [`RunContext`] is created once per run and threaded by `&mut` through
//! every suite. Each check is awaited to completion, recorded, and followed
//! by the configured pause before the next one starts. Values one check
//! produces for a later one travel as [`Capture`]s; a check whose input was
//! never captured is recorded as failed without touching the network.

use crate::client::ClientError;
use crate::evaluator::Verdict;
use crate::report::{FixtureTally, Reporter, RunSummary, TestResult};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, warn};

/// Values handed from one check to a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capture {
    CoreUserId,
    IssueId,
    ImageIssueId,
    AdminUserId,
    AdminIssueId,
    /// JSON of the issue as returned by the admin-field update.
    TriagedIssue,
    CohortUserId,
    CohortIssueId,
    PlainIssueId,
    /// JSON-encoded list of bucket names.
    BucketNames,
    ConfirmedBucket,
}

impl Capture {
    /// What the value is, as used in short-circuit messages.
    pub fn label(self) -> &'static str {
        match self {
            Capture::CoreUserId | Capture::AdminUserId | Capture::CohortUserId => "user ID",
            Capture::IssueId | Capture::AdminIssueId | Capture::CohortIssueId => "issue ID",
            Capture::ImageIssueId => "issue with image ID",
            Capture::PlainIssueId => "issue without image ID",
            Capture::TriagedIssue => "triaged issue snapshot",
            Capture::BucketNames => "bucket data",
            Capture::ConfirmedBucket => "confirmed bucket",
        }
    }

    /// Check that produces the value.
    pub fn producer(self) -> &'static str {
        match self {
            Capture::CoreUserId => "Create User",
            Capture::IssueId => "Create Issue",
            Capture::ImageIssueId => "Create Issue with Image",
            Capture::AdminUserId | Capture::AdminIssueId => "Setup Test Issue",
            Capture::TriagedIssue => "Update Issue (Admin Fields)",
            Capture::CohortUserId | Capture::CohortIssueId => "Setup Test Data",
            Capture::PlainIssueId => "Image Upload - Create without Image",
            Capture::BucketNames => "Storage Connection",
            Capture::ConfirmedBucket => "Bucket Exists",
        }
    }
}

/// Output sink for the console report.
pub type ConsoleReporter = Reporter<Box<dyn Write + Send>>;

/// State carried across every check of a run.
pub struct RunContext {
    results: Vec<TestResult>,
    captures: HashMap<Capture, String>,
    created: FixtureTally,
    check_delay: Duration,
    reporter: ConsoleReporter,
}

impl RunContext {
    pub fn new(check_delay: Duration, reporter: ConsoleReporter) -> Self {
        Self {
            results: Vec::new(),
            captures: HashMap::new(),
            created: FixtureTally::default(),
            check_delay,
            reporter,
        }
    }

    /// Context printing to stdout.
    pub fn stdout(check_delay: Duration) -> Self {
        Self::new(check_delay, Reporter::new(Box::new(io::stdout())))
    }

    /// Context that discards console output.
    pub fn quiet(check_delay: Duration) -> Self {
        Self::new(check_delay, Reporter::new(Box::new(io::sink())))
    }

    /// Value captured by an earlier check.
    pub fn captured(&self, capture: Capture) -> Option<&str> {
        self.captures.get(&capture).map(String::as_str)
    }

    /// Results recorded so far, in execution order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Fixtures created so far.
    pub fn created(&self) -> FixtureTally {
        self.created
    }

    pub fn reporter(&mut self) -> &mut ConsoleReporter {
        &mut self.reporter
    }

    /// Print a suite header.
    pub fn section(&mut self, title: &str) {
        if let Err(e) = self.reporter.suite(title) {
            warn!(error = %e, "Failed to write suite header");
        }
    }

    /// Run one check to completion and record it.
    ///
    /// A transport error becomes a failing result; the run continues.
    /// Returns whether the check passed.
    pub async fn check<F>(&mut self, name: &str, check: F) -> bool
    where
        F: Future<Output = Result<Verdict, ClientError>>,
    {
        let verdict = match check.await {
            Ok(verdict) => verdict,
            Err(e) => Verdict::fail(format!("Exception: {e}")),
        };
        let passed = self.record(name, verdict);
        self.pause().await;
        passed
    }

    /// Run a check that needs a value captured earlier.
    ///
    /// When the value is missing the check is recorded as failed and
    /// `check` is never called.
    pub async fn check_requiring<F, Fut>(&mut self, name: &str, capture: Capture, check: F) -> bool
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Verdict, ClientError>>,
    {
        match self.captured(capture).map(str::to_owned) {
            Some(value) => self.check(name, check(value)).await,
            None => {
                debug!(check = name, ?capture, "Prerequisite missing, skipping request");
                self.record(
                    name,
                    Verdict::fail(format!(
                        "No {} available ({} did not complete)",
                        capture.label(),
                        capture.producer()
                    )),
                )
            }
        }
    }

    /// Append a result, apply its captures and print it.
    pub fn record(&mut self, name: &str, verdict: Verdict) -> bool {
        let Verdict {
            passed,
            message,
            snapshot,
            captures,
            created,
        } = verdict;

        for (capture, value) in captures {
            self.captures.insert(capture, value);
        }
        self.created.merge(created);

        if passed {
            debug!(check = name, %message, "Check passed");
        } else {
            warn!(check = name, %message, "Check failed");
        }

        let result = TestResult {
            name: name.to_string(),
            success: passed,
            message,
            timestamp: Utc::now(),
            response_data: snapshot,
        };
        if let Err(e) = self.reporter.check(&result) {
            warn!(error = %e, "Failed to write check line");
        }
        self.results.push(result);

        passed
    }

    async fn pause(&self) {
        if !self.check_delay.is_zero() {
            tokio::time::sleep(self.check_delay).await;
        }
    }

    /// Close the run, returning the summary and the reporter for final output.
    pub fn finish(self, suites: Vec<String>) -> (RunSummary, ConsoleReporter) {
        let summary = RunSummary::from_results(self.results, suites, self.created);
        (summary, self.reporter)
    }
}
