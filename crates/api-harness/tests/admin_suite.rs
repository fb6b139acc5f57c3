//! Admin suite integration tests.
//!
//! Runs the admin suite end to end against a mocked Civic Reporter backend.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use api_harness::config::{Config, Suite};
use api_harness::fixtures::Fixtures;
use api_harness::report::TestResult;
use api_harness::scenarios::{self, Harness};
use api_harness::sequencer::RunContext;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const ISSUE_ID: &str = "42";
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

fn json_with_cors(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("Access-Control-Allow-Origin", "*")
        .set_body_json(body)
}

fn request_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or_else(|_| json!({}))
}

/// Creates departments, defaulting `active` and rejecting nameless ones.
struct DepartmentsApi;

impl Respond for DepartmentsApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut body = request_json(request);
        if body.get("name").is_none() {
            return ResponseTemplate::new(400)
                .set_body_json(json!({"error": "Department name is required"}));
        }
        if let Some(fields) = body.as_object_mut() {
            fields.insert("id".to_string(), json!(7));
            fields.entry("active").or_insert(json!(true));
        }
        ResponseTemplate::new(201).set_body_json(body)
    }
}

/// Applies updates onto a fresh issue, the way a server that does not
/// merge partial updates would answer.
struct IssueUpdates;

impl Respond for IssueUpdates {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let update = request_json(request);
        let status = update.get("status").and_then(Value::as_str).unwrap_or("");
        if !VALID_STATUSES.contains(&status) {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid status value"}));
        }

        let mut issue = json!({
            "id": ISSUE_ID,
            "status": "Submitted",
            "assigned_department": null,
            "admin_remarks": null,
            "updated_at": "2024-05-01T10:00:00Z",
        });
        if let (Some(issue), Some(update)) = (issue.as_object_mut(), update.as_object()) {
            for (key, value) in update {
                issue.insert(key.clone(), value.clone());
            }
        }
        ResponseTemplate::new(200).set_body_json(issue)
    }
}

async fn mount_backend(server: &MockServer) {
    let departments = json!([
        {"id": 7, "name": "Public Works Department", "active": true},
        {"id": 8, "name": "Water & Sanitation", "active": true},
    ]);

    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(json_with_cors(
            200,
            json!({"status": "ok", "timestamp": "2024-05-01T10:00:00.000Z"}),
        ))
        .mount(server)
        .await;
    for list in ["/api/issues", "/api/users", "/api/stats"] {
        let body = if list == "/api/stats" {
            json!({"total": 0})
        } else {
            json!([])
        };
        Mock::given(method("GET"))
            .and(path(list))
            .respond_with(json_with_cors(200, body))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/departments"))
        .respond_with(json_with_cors(200, departments))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/departments"))
        .respond_with(DepartmentsApi)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "Admin Test User"})))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/api/issues/{ISSUE_ID}")))
        .respond_with(IssueUpdates)
        .mount(server)
        .await;

    Mock::given(method("OPTIONS"))
        .and(path_regex("^/api/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Access-Control-Allow-Origin", "*")
                .insert_header("Access-Control-Allow-Methods", "GET, POST, PUT, OPTIONS")
                .insert_header("Access-Control-Allow-Headers", "Content-Type"),
        )
        .mount(server)
        .await;
}

async fn mount_issue_creation(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/issues"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": ISSUE_ID, "status": "Submitted"})),
        )
        .mount(server)
        .await;
}

async fn mount_refetch(server: &MockServer, issue: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/issues/{ISSUE_ID}")))
        .respond_with(json_with_cors(200, issue))
        .mount(server)
        .await;
}

async fn run_admin(server: &MockServer) -> RunContext {
    let harness = harness_for(server);
    let mut ctx = RunContext::quiet(Duration::ZERO);
    scenarios::run_suite(&harness, Suite::Admin, &mut ctx).await;
    ctx
}

#[tokio::test]
async fn test_admin_suite_passes_against_conforming_backend() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    mount_issue_creation(&server).await;
    mount_refetch(
        &server,
        json!({
            "id": ISSUE_ID,
            "status": "Resolved",
            "assigned_department": "Public Works Department",
            "admin_remarks": Fixtures::triage_remarks(),
        }),
    )
    .await;

    let ctx = run_admin(&server).await;

    assert_eq!(ctx.results().len(), 14);
    for result in ctx.results() {
        assert!(result.success, "{} failed: {}", result.name, result.message);
    }

    // Two departments, one user, one issue.
    let created = ctx.created();
    assert_eq!(created.departments, 2);
    assert_eq!(created.users, 1);
    assert_eq!(created.issues, 1);
}

#[tokio::test]
async fn test_department_defaults_to_active() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    mount_issue_creation(&server).await;

    let ctx = run_admin(&server).await;

    let default_active = result(&ctx, "Create Department (Default Active)");
    assert!(default_active.success, "{}", default_active.message);
    assert!(default_active.message.contains("default active=true"));

    let missing_name = result(&ctx, "Create Department (Missing Name)");
    assert!(missing_name.success, "{}", missing_name.message);
}

#[tokio::test]
async fn test_status_only_update_that_clears_triage_fields_fails() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    mount_issue_creation(&server).await;
    mount_refetch(
        &server,
        json!({
            "id": ISSUE_ID,
            "status": "Resolved",
            "assigned_department": null,
            "admin_remarks": null,
        }),
    )
    .await;

    let ctx = run_admin(&server).await;

    assert!(result(&ctx, "Update Issue (Admin Fields)").success);

    let status_only = result(&ctx, "Update Issue (Status Only)");
    assert!(!status_only.success);
    assert!(status_only.message.contains("assigned_department"));
    assert!(status_only.message.contains("admin_remarks"));
    assert!(status_only.response_data.is_some());
}

#[tokio::test]
async fn test_failed_setup_skips_dependent_checks() {
    let server = MockServer::start().await;
    mount_backend(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/issues"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "insert failed"})))
        .mount(&server)
        .await;

    let ctx = run_admin(&server).await;

    assert!(!result(&ctx, "Setup Test Issue").success);
    assert_eq!(
        result(&ctx, "Update Issue (Admin Fields)").message,
        "No issue ID available (Setup Test Issue did not complete)"
    );
    assert_eq!(
        result(&ctx, "Update Issue (Status Only)").message,
        "No triaged issue snapshot available (Update Issue (Admin Fields) did not complete)"
    );
    assert!(!result(&ctx, "Update Issue (Invalid Status)").success);

    // The only PUT that still goes out targets a random issue id.
    let puts = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "PUT")
        .count();
    assert_eq!(puts, 1);
    assert!(result(&ctx, "Update Nonexistent Issue").success);

    // The suite still runs to completion.
    assert_eq!(ctx.results().len(), 14);
}
