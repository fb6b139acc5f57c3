//! Discovery suite integration tests.
//!
//! Runs the discovery suite against mocked backends: one that filters issues
//! by user and serves statistics, one that does neither, and one whose user
//! creation is broken.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use api_harness::config::{Config, Suite};
use api_harness::report::TestResult;
use api_harness::scenarios::{self, Harness};
use api_harness::sequencer::RunContext;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DISCOVERY_CHECKS: usize = 13;
const VALID_STATUSES: [&str; 4] = ["Submitted", "Acknowledged", "In Progress", "Resolved"];

fn harness_for(server: &MockServer) -> Harness {
    let vars = HashMap::from([
        ("NEXT_PUBLIC_BASE_URL".to_string(), server.uri()),
        ("HARNESS_CHECK_DELAY_MS".to_string(), "0".to_string()),
    ]);
    let config = Config::from_vars(&vars).expect("config");
    Harness::from_config(&config).expect("harness")
}

fn result<'a>(ctx: &'a RunContext, name: &str) -> &'a TestResult {
    ctx.results()
        .iter()
        .find(|result| result.name == name)
        .unwrap_or_else(|| panic!("no result named {name}"))
}

fn request_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or_else(|_| json!({}))
}

/// Echoes the first `accepted` user registrations; later ones fail.
struct UsersApi {
    accepted: usize,
    calls: AtomicUsize,
}

impl UsersApi {
    fn accepting(accepted: usize) -> Self {
        Self {
            accepted,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for UsersApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.accepted {
            ResponseTemplate::new(201).set_body_json(request_json(request))
        } else {
            ResponseTemplate::new(500).set_body_json(json!({"error": "duplicate key value"}))
        }
    }
}

/// Creates issues with sequential ids; rejects reports missing a field.
struct IssuesApi {
    next_id: AtomicUsize,
}

impl Respond for IssuesApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut issue = request_json(request);
        let complete = ["user_id", "category", "location", "coordinates"]
            .iter()
            .all(|field| issue.get(field).is_some());
        if !complete {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "Missing required fields"}));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(fields) = issue.as_object_mut() {
            fields.insert("id".to_string(), json!(format!("issue-{id}")));
            fields.insert("status".to_string(), json!("Submitted"));
        }
        ResponseTemplate::new(201).set_body_json(issue)
    }
}

/// Accepts known statuses only.
struct StatusUpdates;

impl Respond for StatusUpdates {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let update = request_json(request);
        let status = update.get("status").and_then(Value::as_str).unwrap_or("");
        if VALID_STATUSES.contains(&status) {
            ResponseTemplate::new(200).set_body_json(update)
        } else {
            ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid status value"}))
        }
    }
}

/// Serves a stored issue by id, without an image or a joined reporter.
struct IssueById;

impl Respond for IssueById {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request.url.path().rsplit('/').next().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({"id": id, "status": "Submitted"}))
    }
}

/// `GET /issues`, honoring `?user_id=` only when `filters` is set.
struct IssueListing {
    filters: bool,
}

impl Respond for IssueListing {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let user_id = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "user_id")
            .map(|(_, value)| value.into_owned());

        let body = match user_id {
            Some(user_id) if self.filters => json!([
                {"id": "issue-1", "user_id": user_id, "status": "Submitted"},
            ]),
            _ => json!([
                {"id": "issue-90", "user_id": "someone-else", "status": "Submitted"},
                {"id": "issue-91", "user_id": "another-user", "status": "Resolved"},
            ]),
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

async fn mount_backend(server: &MockServer, users: UsersApi, filters: bool) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/issues"))
        .respond_with(IssueListing { filters })
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/issues/issue-[0-9]+$"))
        .respond_with(IssueById)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(users)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/issues"))
        .respond_with(IssuesApi {
            next_id: AtomicUsize::new(0),
        })
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/api/issues/[^/]+$"))
        .respond_with(StatusUpdates)
        .mount(server)
        .await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/issues"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Access-Control-Allow-Origin", "*")
                .insert_header("Access-Control-Allow-Methods", "GET, POST, PUT, OPTIONS")
                .insert_header("Access-Control-Allow-Headers", "Content-Type"),
        )
        .mount(server)
        .await;
}

async fn run_discovery(server: &MockServer) -> RunContext {
    let harness = harness_for(server);
    let mut ctx = RunContext::quiet(Duration::ZERO);
    scenarios::run_suite(&harness, Suite::Discovery, &mut ctx).await;
    ctx
}

#[tokio::test]
async fn test_discovery_suite_passes_with_filtering_and_statistics() {
    let server = MockServer::start().await;
    mount_backend(&server, UsersApi::accepting(usize::MAX), true).await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 9, "resolved": 0})))
        .mount(&server)
        .await;

    let ctx = run_discovery(&server).await;

    assert_eq!(ctx.results().len(), DISCOVERY_CHECKS);
    for result in ctx.results() {
        assert!(result.success, "{} failed: {}", result.name, result.message);
    }

    assert_eq!(
        result(&ctx, "Setup Test Data").message,
        "Test data setup complete: 3 users, 6 issues, 6 status updates"
    );
    assert!(result(&ctx, "Personalized Issues API")
        .message
        .starts_with("Personalized issues working via: /issues?user_id="));
    assert_eq!(
        result(&ctx, "Overall Statistics API").message,
        "Statistics API working at: /stats"
    );
    assert_eq!(
        result(&ctx, "Error Handling Edge Cases").message,
        "All error handling tests passed"
    );
}

#[tokio::test]
async fn test_partial_setup_and_missing_routes_fall_back_to_issue_listing() {
    let server = MockServer::start().await;
    mount_backend(&server, UsersApi::accepting(1), false).await;

    let ctx = run_discovery(&server).await;

    let setup = result(&ctx, "Setup Test Data");
    assert!(setup.success, "{}", setup.message);
    assert!(setup
        .message
        .starts_with("Test data setup complete: 1 users, 2 issues, 2 status updates; problems: "));

    let personalized = result(&ctx, "Personalized Issues API");
    assert!(!personalized.success);
    assert!(personalized.message.starts_with("Tried 3 endpoint(s): "));
    assert!(personalized
        .message
        .contains("GET /issues returns ALL issues (2) instead of user-specific issues (0)"));

    let statistics = result(&ctx, "Overall Statistics API");
    assert!(!statistics.success);
    assert!(statistics
        .message
        .starts_with("No dedicated statistics endpoint found (Tried 5 endpoint(s): "));
    assert_eq!(
        statistics.response_data,
        Some(json!({
            "total": 2,
            "submitted": 1,
            "acknowledged": 0,
            "in_progress": 0,
            "resolved": 1
        }))
    );
}

#[tokio::test]
async fn test_failed_setup_skips_checks_that_need_a_cohort_user() {
    let server = MockServer::start().await;
    mount_backend(&server, UsersApi::accepting(0), true).await;

    let ctx = run_discovery(&server).await;

    assert!(!result(&ctx, "Setup Test Data").success);
    for name in [
        "Image Upload - Create with Image",
        "Image Upload - Create without Image",
        "Personalized Issues API",
    ] {
        assert_eq!(
            result(&ctx, name).message,
            "No user ID available (Setup Test Data did not complete)"
        );
    }
    assert_eq!(
        result(&ctx, "Image Upload - Retrieval").message,
        "No issue without image ID available (Image Upload - Create without Image did not complete)"
    );

    // Only the two malformed edge-case reports reach POST /issues.
    let issue_posts: Vec<Value> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "POST" && request.url.path() == "/api/issues")
        .map(request_json)
        .collect();
    assert_eq!(issue_posts.len(), 2);
    assert!(issue_posts.iter().all(|issue| issue.get("coordinates").is_none()));

    let edge_cases = result(&ctx, "Error Handling Edge Cases");
    assert!(edge_cases.success, "{}", edge_cases.message);
    assert!(edge_cases.message.contains("invalid status check skipped"));
}
