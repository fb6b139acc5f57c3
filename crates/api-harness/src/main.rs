//! Civic Reporter API Harness
//!
//! Runs the configured check suites against a Civic Reporter deployment and
//! exits 0 when every check passed, 1 when any failed, and 2 when the
//! configuration is unusable.

use api_harness::config::Config;
use api_harness::report::persist_summary;
use api_harness::scenarios::{self, Harness};
use api_harness::sequencer::RunContext;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for a configuration error; no check ran.
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::from_env();

    // Logs go to stderr so stdout carries only the check report.
    let log_json = config.as_ref().is_ok_and(|config| config.log_json);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_harness=info".into()),
        )
        .with(log_json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!(
        base_url = %config.base_url,
        suites = ?config.suite_names(),
        results_path = %config.results_path.display(),
        timeout_seconds = config.request_timeout.as_secs(),
        storage_configured = config.storage.is_some(),
        "Configuration loaded successfully"
    );

    let harness = match Harness::from_config(&config) {
        Ok(harness) => harness,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut ctx = RunContext::stdout(config.check_delay);
    if let Err(e) = ctx
        .reporter()
        .start(&config.api_url(), &config.suite_names())
    {
        warn!(error = %e, "Failed to write report banner");
    }

    scenarios::run(&harness, &config.suites, &mut ctx).await;

    let (summary, mut reporter) = ctx.finish(config.suite_names());
    let persisted = persist_summary(&summary, &config.results_path);
    match &persisted {
        Ok(()) => info!(path = %config.results_path.display(), "Run summary written"),
        Err(e) => error!(path = %config.results_path.display(), error = %e, "Failed to write run summary"),
    }

    if let Err(e) = reporter
        .summary(&summary)
        .and_then(|()| reporter.persisted(&config.results_path, &persisted))
    {
        warn!(error = %e, "Failed to write report summary");
    }

    info!(
        total = summary.total_tests,
        passed = summary.passed,
        failed = summary.failed,
        success_rate = %summary.success_rate,
        "Run complete"
    );

    ExitCode::from(summary.exit_code())
}
