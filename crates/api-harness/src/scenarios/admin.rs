//! Admin suite: departments and admin triage of issues.

use super::core_api::list;
use super::{cors_problem, endpoints_respond, tally_created, Harness};
use crate::client::{ApiClient, ClientError};
use crate::evaluator::{preserved_fields, Expectation, StatusSet, Verdict};
use crate::fixtures::Fixtures;
use crate::report::Entity;
use crate::sequencer::{Capture, RunContext};
use chrono::DateTime;
use common::{Department, Health, IssueStatus, IssueUpdate, NewDepartment, NewUser, UserId};
use serde_json::{json, Value};

/// Fields a status-only update must leave alone.
const TRIAGE_FIELDS: [&str; 2] = ["assigned_department", "admin_remarks"];

pub async fn run(harness: &Harness, ctx: &mut RunContext) {
    let api = &harness.api;
    let public_works = Fixtures::public_works_department();
    let sanitation = Fixtures::sanitation_department();
    let user_id = UserId::new();
    let user = harness.fixtures.admin_user(user_id);

    ctx.section("Admin Dashboard");

    ctx.check(
        "Existing API Health",
        endpoints_respond(
            api,
            &["/health", "/issues", "/users", "/stats"],
            &StatusSet::one(200),
        ),
    )
    .await;
    ctx.check("Get Departments (Initial)", list(api, "/departments", "departments"))
        .await;
    ctx.check("Create Department", create_department(api, &public_works))
        .await;
    ctx.check(
        "Create Department (Default Active)",
        create_department_default_active(api, &sanitation),
    )
    .await;
    ctx.check("Create Department (Missing Name)", create_unnamed_department(api))
        .await;
    ctx.check(
        "Get Departments (After Creation)",
        departments_after_creation(api, &[&public_works, &sanitation]),
    )
    .await;

    ctx.check("Setup Test Issue", setup_test_issue(api, &user, user_id))
        .await;

    let department = public_works.name.clone().unwrap_or_default();
    ctx.check_requiring("Update Issue (Admin Fields)", Capture::AdminIssueId, |id| {
        update_admin_fields(api, id, department)
    })
    .await;
    ctx.check_requiring("Update Issue (Status Only)", Capture::TriagedIssue, |before| {
        update_status_only(api, before)
    })
    .await;
    ctx.check_requiring("Update Issue (Invalid Status)", Capture::AdminIssueId, |id| {
        update_invalid_status(api, id)
    })
    .await;
    ctx.check("Update Nonexistent Issue", update_nonexistent_issue(api))
        .await;
    ctx.check_requiring("Get Issues (User Filter)", Capture::AdminUserId, |id| {
        issues_for_user(api, id)
    })
    .await;

    let issue_path = format!(
        "/issues/{}",
        ctx.captured(Capture::AdminIssueId).unwrap_or("test-id")
    );
    ctx.check(
        "CORS Headers (Admin Endpoints)",
        admin_cors(api, ["/departments", issue_path.as_str()]),
    )
    .await;
    ctx.check("API Response Consistency", response_consistency(api))
        .await;
}

async fn create_department(api: &ApiClient, department: &NewDepartment) -> Result<Verdict, ClientError> {
    let outcome = api.post("/departments", department).await?;

    let verdict = match Expectation::status(201)
        .field_eq("/name", department.name.clone())
        .field_eq("/description", department.description.clone())
        .field_eq("/contact_email", department.contact_email.clone())
        .field_eq("/active", department.active)
        .verify(&outcome)
    {
        Ok(()) => match outcome.parse::<Department>() {
            Ok(created) => Verdict::pass(format!(
                "Department created successfully with ID: {}",
                record_id(&created)
            )),
            Err(e) => Verdict::fail(format!("Unreadable department: {e}"))
                .with_snapshot(outcome.snapshot()),
        },
        Err(failure) => failure,
    };

    Ok(tally_created(verdict, &outcome, Entity::Department))
}

async fn create_department_default_active(
    api: &ApiClient,
    department: &NewDepartment,
) -> Result<Verdict, ClientError> {
    let outcome = api.post("/departments", department).await?;

    let verdict = match Expectation::status(201)
        .field_eq("/name", department.name.clone())
        .field_eq("/active", true)
        .verify(&outcome)
    {
        Ok(()) => match outcome.parse::<Department>() {
            Ok(created) => Verdict::pass(format!(
                "Department created with default active=true. ID: {}",
                record_id(&created)
            )),
            Err(e) => Verdict::fail(format!("Unreadable department: {e}"))
                .with_snapshot(outcome.snapshot()),
        },
        Err(failure) => failure,
    };

    Ok(tally_created(verdict, &outcome, Entity::Department))
}

async fn create_unnamed_department(api: &ApiClient) -> Result<Verdict, ClientError> {
    let outcome = api
        .post("/departments", &Fixtures::unnamed_department())
        .await?;

    let verdict = match Expectation::status(400)
        .field_mentions("/error", "name")
        .verify(&outcome)
    {
        Ok(()) => Verdict::pass("Correctly returned 400 for missing name field"),
        Err(failure) => failure,
    };

    Ok(tally_created(verdict, &outcome, Entity::Department))
}

async fn departments_after_creation(
    api: &ApiClient,
    created: &[&NewDepartment],
) -> Result<Verdict, ClientError> {
    let outcome = api.get("/departments").await?;
    if let Err(failure) = Expectation::status(200)
        .min_len(created.len())
        .verify(&outcome)
    {
        return Ok(failure);
    }

    let listed: Vec<Department> = match outcome.parse() {
        Ok(listed) => listed,
        Err(e) => {
            return Ok(Verdict::fail(format!("Unreadable department list: {e}"))
                .with_snapshot(outcome.snapshot()))
        }
    };
    let missing = missing_departments(&listed, created);

    Ok(if missing.is_empty() {
        Verdict::pass(format!(
            "Retrieved {} departments including created ones",
            listed.len()
        ))
    } else {
        Verdict::fail(format!(
            "Created departments missing from list: {}",
            missing.join(", ")
        ))
        .with_snapshot(outcome.snapshot())
    })
}

/// Names of `created` departments absent from `listed`.
fn missing_departments(listed: &[Department], created: &[&NewDepartment]) -> Vec<String> {
    created
        .iter()
        .filter_map(|department| department.name.clone())
        .filter(|name| !listed.iter().any(|entry| &entry.name == name))
        .collect()
}

fn record_id(department: &Department) -> String {
    department
        .id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

async fn setup_test_issue(api: &ApiClient, user: &NewUser, user_id: UserId) -> Result<Verdict, ClientError> {
    let created_user = api.post("/users", user).await?;
    if created_user.status != 201 {
        return Ok(Verdict::fail(format!(
            "Failed to create test user: {}",
            created_user.describe()
        ))
        .with_snapshot(created_user.snapshot()));
    }

    let created_issue = api
        .post("/issues", &Fixtures::water_supply_issue(user_id))
        .await?;
    let verdict = match (created_issue.status, created_issue.field_text("/id")) {
        (201, Some(id)) => Verdict::pass(format!("Test issue created with ID: {id}"))
            .capture(Capture::AdminIssueId, id),
        _ => Verdict::fail(format!(
            "Failed to create test issue: {}",
            created_issue.describe()
        ))
        .with_snapshot(created_issue.snapshot()),
    };

    Ok(tally_created(verdict, &created_issue, Entity::Issue)
        .created(Entity::User, 1)
        .capture(Capture::AdminUserId, user_id.to_string()))
}

async fn update_admin_fields(api: &ApiClient, id: String, department: String) -> Result<Verdict, ClientError> {
    let update = IssueUpdate::triage(
        IssueStatus::Acknowledged,
        department,
        Fixtures::triage_remarks(),
    );
    let outcome = api.put(&format!("/issues/{id}"), &update).await?;

    Ok(
        match Expectation::status(200)
            .field_eq("/status", IssueStatus::Acknowledged.as_str())
            .field_eq("/assigned_department", update.assigned_department.clone())
            .field_eq("/admin_remarks", update.admin_remarks.clone())
            .has_field("/updated_at")
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass("Issue updated successfully with admin fields and timestamp")
                .capture(
                    Capture::TriagedIssue,
                    outcome.json().cloned().unwrap_or(Value::Null).to_string(),
                ),
            Err(failure) => failure,
        },
    )
}

/// Move the triaged issue to Resolved and verify the triage fields survive.
///
/// `before` is the issue JSON returned by the admin-field update.
async fn update_status_only(api: &ApiClient, before: String) -> Result<Verdict, ClientError> {
    let before: Value = match serde_json::from_str(&before) {
        Ok(before) => before,
        Err(e) => return Ok(Verdict::fail(format!("Unreadable triaged issue snapshot: {e}"))),
    };
    let Some(id) = before.get("id").and_then(id_text) else {
        return Ok(Verdict::fail("Triaged issue snapshot has no id").with_snapshot(Some(before)));
    };

    let path = format!("/issues/{id}");
    let outcome = api
        .put(&path, &IssueUpdate::with_status(IssueStatus::Resolved))
        .await?;
    if let Err(failure) = Expectation::status(200)
        .field_eq("/status", IssueStatus::Resolved.as_str())
        .has_field("/updated_at")
        .verify(&outcome)
    {
        return Ok(failure);
    }

    let refetched = api.get(&path).await?;
    if let Err(failure) = Expectation::status(200).is_object().verify(&refetched) {
        return Ok(failure);
    }
    let after = refetched.json().cloned().unwrap_or(Value::Null);

    let preserved = preserved_fields(&before, &after, &TRIAGE_FIELDS);
    Ok(if preserved.passed {
        Verdict::pass("Status updated while preserving admin fields")
    } else {
        preserved
    })
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

async fn update_invalid_status(api: &ApiClient, id: String) -> Result<Verdict, ClientError> {
    let outcome = api
        .put(&format!("/issues/{id}"), &json!({"status": "InvalidStatus"}))
        .await?;

    Ok(
        match Expectation::status(400)
            .field_mentions("/error", "status")
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass("Correctly returned 400 for invalid status"),
            Err(failure) => failure,
        },
    )
}

async fn update_nonexistent_issue(api: &ApiClient) -> Result<Verdict, ClientError> {
    let outcome = api
        .put(
            &format!("/issues/{}", UserId::new()),
            &IssueUpdate::with_status(IssueStatus::Acknowledged),
        )
        .await?;

    Ok(
        match Expectation::any_status(&[404, 500]).verify(&outcome) {
            Ok(()) => Verdict::pass(format!(
                "Correctly returned {} for non-existent issue",
                outcome.status
            )),
            Err(failure) => failure,
        },
    )
}

async fn issues_for_user(api: &ApiClient, id: String) -> Result<Verdict, ClientError> {
    let outcome = api
        .get_with_query("/issues", &[("user_id".to_string(), id.clone())])
        .await?;
    if let Err(failure) = Expectation::status(200).is_array().verify(&outcome) {
        return Ok(failure);
    }

    if outcome.array_len() == Some(0) {
        return Ok(Verdict::pass("No issues found for user (acceptable)"));
    }

    Ok(
        match Expectation::status(200)
            .every_item("user_id", id.as_str())
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass(format!(
                "Retrieved {} issues for specific user",
                outcome.array_len().unwrap_or(0)
            )),
            Err(failure) => Verdict {
                message: format!("Filter not working: {}", failure.message),
                ..failure
            },
        },
    )
}

async fn admin_cors(api: &ApiClient, paths: [&str; 2]) -> Result<Verdict, ClientError> {
    for path in paths {
        if let Some(problem) = cors_problem(api, path).await? {
            return Ok(Verdict::fail(problem));
        }
    }
    Ok(Verdict::pass("All admin endpoints have proper CORS headers"))
}

/// Problem with a health timestamp, if it does not parse as RFC 3339.
fn timestamp_problem(timestamp: Option<&str>) -> Option<String> {
    let text = timestamp?;
    match DateTime::parse_from_rfc3339(text) {
        Ok(_) => None,
        Err(e) => Some(format!("Invalid timestamp format on /health: {text} ({e})")),
    }
}

async fn response_consistency(api: &ApiClient) -> Result<Verdict, ClientError> {
    for path in ["/health", "/issues", "/users", "/departments", "/stats"] {
        let outcome = api.get(path).await?;

        if outcome.status != 200 {
            return Ok(Verdict::fail(format!(
                "Endpoint {path} returned {}",
                outcome.status
            ))
            .with_snapshot(outcome.snapshot()));
        }
        if outcome.json().is_none() {
            return Ok(Verdict::fail(format!("Endpoint {path} did not return JSON"))
                .with_snapshot(outcome.snapshot()));
        }
        if !outcome.has_header("Access-Control-Allow-Origin") {
            return Ok(Verdict::fail(format!("Missing CORS headers on {path}")));
        }
        if path == "/health" {
            let health: Health = match outcome.parse() {
                Ok(health) => health,
                Err(e) => {
                    return Ok(Verdict::fail(format!("Unreadable /health payload: {e}"))
                        .with_snapshot(outcome.snapshot()))
                }
            };
            if let Some(problem) = timestamp_problem(health.timestamp.as_deref()) {
                return Ok(Verdict::fail(problem).with_snapshot(outcome.snapshot()));
            }
        }
    }

    Ok(Verdict::pass(
        "All API responses have consistent structure and proper headers",
    ))
}
