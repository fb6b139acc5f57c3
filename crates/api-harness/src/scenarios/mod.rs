//! Check suites.
//!
//! Each suite is an ordered list of named checks run through the shared
//! [`RunContext`]. Individual checks are plain async functions returning
//! `Result<Verdict, ClientError>`; the context turns transport errors into
//! failing results.

pub mod admin;
pub mod core_api;
pub mod discovery;
pub mod storage;

use crate::client::{ApiClient, ClientError, Outcome};
use crate::config::{Config, StorageConfig, Suite};
use crate::evaluator::{StatusSet, Verdict};
use crate::fixtures::Fixtures;
use crate::report::Entity;
use crate::sequencer::RunContext;
use tracing::info;

/// Headers a CORS preflight response must carry.
pub const CORS_HEADERS: [&str; 3] = [
    "Access-Control-Allow-Origin",
    "Access-Control-Allow-Methods",
    "Access-Control-Allow-Headers",
];

/// Storage API client plus the settings it was built from.
pub struct StorageTarget {
    pub client: ApiClient,
    pub config: StorageConfig,
}

/// Everything the suites need to talk to the deployment.
pub struct Harness {
    pub api: ApiClient,
    pub storage: Option<StorageTarget>,
    pub fixtures: Fixtures,
}

impl Harness {
    /// Build the backend client and, when configured, the storage client.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let api = ApiClient::new(config.api_url(), config.request_timeout)?;

        let storage = match &config.storage {
            Some(storage) => Some(StorageTarget {
                client: ApiClient::new(storage.storage_api_url(), config.request_timeout)?
                    .with_bearer(storage.anon_key.clone()),
                config: storage.clone(),
            }),
            None => None,
        };

        Ok(Self {
            api,
            storage,
            fixtures: Fixtures::new(),
        })
    }
}

/// Run `suites` in order.
pub async fn run(harness: &Harness, suites: &[Suite], ctx: &mut RunContext) {
    for suite in suites {
        run_suite(harness, *suite, ctx).await;
    }
}

/// Run a single suite.
pub async fn run_suite(harness: &Harness, suite: Suite, ctx: &mut RunContext) {
    info!(%suite, "Running suite");

    match suite {
        Suite::Core => core_api::run(harness, ctx).await,
        Suite::Admin => admin::run(harness, ctx).await,
        Suite::Discovery => discovery::run(harness, ctx).await,
        Suite::Storage | Suite::Upload => match &harness.storage {
            Some(target) if suite == Suite::Storage => storage::run_storage(target, ctx).await,
            Some(target) => storage::run_upload(target, ctx).await,
            None => {
                ctx.section(suite.name());
                ctx.record(
                    suite.name(),
                    Verdict::fail("Storage configuration missing (NEXT_PUBLIC_SUPABASE_URL / NEXT_PUBLIC_SUPABASE_ANON_KEY)"),
                );
            }
        },
    }
}

/// CORS preflight headers absent from `outcome`.
pub fn missing_cors_headers(outcome: &Outcome) -> Vec<&'static str> {
    CORS_HEADERS
        .into_iter()
        .filter(|name| !outcome.has_header(name))
        .collect()
}

/// Problem with the CORS preflight for `path`, if any.
///
/// The preflight must answer 200 and carry every header in [`CORS_HEADERS`].
pub async fn cors_problem(api: &ApiClient, path: &str) -> Result<Option<String>, ClientError> {
    let outcome = api.options(path).await?;

    if outcome.status != 200 {
        return Ok(Some(format!(
            "OPTIONS request failed on {path}: HTTP {}",
            outcome.status
        )));
    }

    let missing = missing_cors_headers(&outcome);
    if missing.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "Missing CORS headers on {path}: {}",
            missing.join(", ")
        )))
    }
}

/// GET each path in order; the first response outside `statuses` fails.
pub async fn endpoints_respond(
    api: &ApiClient,
    paths: &[&str],
    statuses: &StatusSet,
) -> Result<Verdict, ClientError> {
    for path in paths {
        let outcome = api.get(path).await?;
        if !statuses.contains(outcome.status) {
            return Ok(Verdict::fail(format!(
                "Endpoint {path} failed with status {}",
                outcome.status
            ))
            .with_snapshot(outcome.snapshot()));
        }
    }

    Ok(Verdict::pass(format!(
        "All endpoints responded ({})",
        paths.join(", ")
    )))
}

/// Count a fixture when the server answered 201 Created.
pub fn tally_created(verdict: Verdict, outcome: &Outcome, entity: Entity) -> Verdict {
    if outcome.status == 201 {
        verdict.created(entity, 1)
    } else {
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Body;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_missing_cors_headers_lists_each_absent_header() {
        let mut outcome = Outcome::new(200, Body::Empty);
        outcome
            .headers
            .insert("access-control-allow-origin", HeaderValue::from_static("*"));

        assert_eq!(
            missing_cors_headers(&outcome),
            vec!["Access-Control-Allow-Methods", "Access-Control-Allow-Headers"]
        );
    }

    #[test]
    fn test_tally_created_only_counts_201() {
        let created = tally_created(Verdict::pass("ok"), &Outcome::new(201, Body::Empty), Entity::User);
        assert_eq!(created.created.users, 1);

        let rejected = tally_created(Verdict::fail("no"), &Outcome::new(400, Body::Empty), Entity::User);
        assert_eq!(rejected.created.users, 0);
    }
}
