//! Core suite: issue and user CRUD, CORS and basic error handling.

use super::{cors_problem, endpoints_respond, tally_created, Harness};
use crate::client::{ApiClient, ClientError};
use crate::evaluator::{Expectation, StatusSet, Verdict};
use crate::fixtures::{Fixtures, CORE_IMAGE_URL};
use crate::report::Entity;
use crate::sequencer::{Capture, RunContext};
use common::{Issue, IssueStatus, IssueUpdate, NewIssue, NewUser, User, UserId};
use serde::Serialize;

pub async fn run(harness: &Harness, ctx: &mut RunContext) {
    let api = &harness.api;
    let user_id = UserId::new();
    let user = harness.fixtures.core_user(user_id);

    ctx.section("Core API");

    ctx.check("Root Endpoint", root_endpoint(api)).await;
    ctx.check("Health Endpoint", health_endpoint(api)).await;
    ctx.check("Get Issues", list(api, "/issues", "issues")).await;
    ctx.check("Get Users", list(api, "/users", "users")).await;
    ctx.check("Create User", create_user(api, &user)).await;
    ctx.check_requiring("User Round Trip", Capture::CoreUserId, |id| {
        user_round_trip(api, id, &user)
    })
    .await;

    let pothole = Fixtures::pothole_issue(user_id);
    ctx.check(
        "Create Issue",
        create_issue(api, &pothole, Capture::IssueId),
    )
    .await;
    let streetlight = Fixtures::streetlight_issue(user_id);
    ctx.check(
        "Create Issue with Image",
        create_issue(api, &streetlight, Capture::ImageIssueId),
    )
    .await;
    ctx.check(
        "Create Issue without Image",
        create_issue_without_image(api, &Fixtures::garbage_issue(user_id)),
    )
    .await;

    ctx.check_requiring("Get Specific Issue", Capture::IssueId, |id| {
        get_specific_issue(api, id, &pothole, &user)
    })
    .await;
    ctx.check_requiring("Update Issue Status", Capture::IssueId, |id| {
        update_issue_status(api, id)
    })
    .await;
    ctx.check_requiring("Image URL Storage/Retrieval", Capture::ImageIssueId, |id| {
        image_url_retrieval(api, id)
    })
    .await;

    ctx.check(
        "Backward Compatibility",
        endpoints_respond(
            api,
            &["/", "/health", "/issues", "/users"],
            &StatusSet::any_of(&[200, 201]),
        ),
    )
    .await;
    ctx.check("Enhanced Error Handling", enhanced_error_handling(api)).await;
    ctx.check("CORS Headers", cors_headers(api)).await;
    ctx.check(
        "Error Handling (404)",
        expect_status(api, "/invalid-route", &Expectation::status(404)),
    )
    .await;
    ctx.check(
        "Error Handling (Invalid ID)",
        expect_status(api, "/issues/invalid-id", &Expectation::any_status(&[404, 500])),
    )
    .await;
    ctx.check("Error Handling (Missing Fields)", missing_fields(api)).await;
}

async fn root_endpoint(api: &ApiClient) -> Result<Verdict, ClientError> {
    let outcome = api.get("/").await?;

    Ok(
        match Expectation::status(200)
            .has_field("/message")
            .has_field("/endpoints")
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass(format!(
                "API info retrieved successfully. Message: {}",
                outcome.field_text("/message").unwrap_or_default()
            )),
            Err(failure) => failure,
        },
    )
}

async fn health_endpoint(api: &ApiClient) -> Result<Verdict, ClientError> {
    let outcome = api.get("/health").await?;

    Ok(
        match Expectation::status(200)
            .field_eq("/status", "healthy")
            .has_field("/timestamp")
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass("Health check passed. Status: healthy"),
            Err(failure) => failure,
        },
    )
}

pub(super) async fn list(api: &ApiClient, path: &str, noun: &str) -> Result<Verdict, ClientError> {
    let outcome = api.get(path).await?;

    Ok(match Expectation::status(200).is_array().verify(&outcome) {
        Ok(()) => Verdict::pass(format!(
            "Retrieved {} {noun} successfully",
            outcome.array_len().unwrap_or(0)
        )),
        Err(failure) => failure,
    })
}

async fn create_user(api: &ApiClient, user: &NewUser) -> Result<Verdict, ClientError> {
    let id = user.id.map(|id| id.to_string()).unwrap_or_default();
    let outcome = api.post("/users", user).await?;

    let verdict = match Expectation::status(201)
        .field_eq("/id", id.as_str())
        .field_eq("/name", user.name.as_str())
        .verify(&outcome)
    {
        Ok(()) => Verdict::pass(format!("User created successfully with ID: {id}"))
            .capture(Capture::CoreUserId, id),
        Err(failure) => failure,
    };

    Ok(tally_created(verdict, &outcome, Entity::User))
}

async fn user_round_trip(api: &ApiClient, id: String, user: &NewUser) -> Result<Verdict, ClientError> {
    let outcome = api.get("/users").await?;
    if let Err(failure) = Expectation::status(200).is_array().verify(&outcome) {
        return Ok(failure);
    }

    let users: Vec<User> = match outcome.parse() {
        Ok(users) => users,
        Err(e) => return Ok(Verdict::fail(format!("Unreadable user list: {e}"))),
    };

    let Some(found) = users.iter().find(|candidate| candidate.id.as_deref() == Some(id.as_str())) else {
        return Ok(Verdict::fail(format!("User {id} not found in GET /users")));
    };

    if found.name.as_deref() == Some(user.name.as_str()) && found.email == user.email {
        Ok(Verdict::pass(format!(
            "User {id} read back with matching name and email"
        )))
    } else {
        Ok(Verdict::fail(format!(
            "Round trip mismatch for {id}: expected {} <{}>, got {} <{}>",
            user.name,
            user.email.as_deref().unwrap_or_default(),
            found.name.as_deref().unwrap_or_default(),
            found.email.as_deref().unwrap_or_default()
        )))
    }
}

async fn create_issue(api: &ApiClient, issue: &NewIssue, capture: Capture) -> Result<Verdict, ClientError> {
    let outcome = api.post("/issues", issue).await?;

    let mut expect = Expectation::status(201)
        .has_field("/id")
        .field_eq("/user_id", issue.user_id.clone())
        .field_eq("/description", issue.description.clone());
    if let Some(image_url) = &issue.image_url {
        expect = expect.field_eq("/image_url", image_url.as_str());
    }

    let verdict = match (expect.verify(&outcome), outcome.field_text("/id")) {
        (Ok(()), Some(id)) => {
            let what = if issue.image_url.is_some() {
                "Issue with image"
            } else {
                "Issue"
            };
            Verdict::pass(format!("{what} created successfully with ID: {id}")).capture(capture, id)
        }
        (Ok(()), None) => Verdict::fail("Issue created without a usable id")
            .with_snapshot(outcome.snapshot()),
        (Err(failure), _) => failure,
    };

    Ok(tally_created(verdict, &outcome, Entity::Issue))
}

async fn create_issue_without_image(api: &ApiClient, issue: &NewIssue) -> Result<Verdict, ClientError> {
    let outcome = api.post("/issues", issue).await?;

    let verdict = match Expectation::status(201)
        .field_eq("/user_id", issue.user_id.clone())
        .field_eq("/description", issue.description.clone())
        .field_absent("/image_url")
        .verify(&outcome)
    {
        Ok(()) => Verdict::pass(format!(
            "Issue without image created successfully. ID: {}",
            outcome.field_text("/id").unwrap_or_default()
        )),
        Err(failure) => failure,
    };

    Ok(tally_created(verdict, &outcome, Entity::Issue))
}

/// A joined reporter record, when present, must belong to `user`.
pub(super) fn joined_user_problem(issue: &Issue, user: &NewUser) -> Option<String> {
    let joined = issue.users.as_ref()?;

    if joined.name.as_deref() != Some(user.name.as_str()) {
        return Some(format!(
            "Joined user name mismatch: expected {}, got {}",
            user.name,
            joined.name.as_deref().unwrap_or("nothing")
        ));
    }
    if joined.email.is_some() && joined.email != user.email {
        return Some(format!(
            "Joined user email mismatch: expected {}, got {}",
            user.email.as_deref().unwrap_or_default(),
            joined.email.as_deref().unwrap_or_default()
        ));
    }
    None
}

async fn get_specific_issue(
    api: &ApiClient,
    id: String,
    submitted: &NewIssue,
    user: &NewUser,
) -> Result<Verdict, ClientError> {
    let outcome = api.get(&format!("/issues/{id}")).await?;

    if let Err(failure) = Expectation::status(200)
        .field_eq("/description", submitted.description.clone())
        .verify(&outcome)
    {
        return Ok(failure);
    }
    if outcome.field_text("/id").as_deref() != Some(id.as_str()) {
        return Ok(Verdict::fail(format!(
            "Issue id mismatch: expected {id}, got {}",
            outcome.field_text("/id").unwrap_or_default()
        ))
        .with_snapshot(outcome.snapshot()));
    }

    let issue: Issue = match outcome.parse() {
        Ok(issue) => issue,
        Err(e) => return Ok(Verdict::fail(format!("Unreadable issue: {e}"))),
    };
    let status = issue.status.as_deref().unwrap_or("unknown");

    Ok(match (&issue.users, joined_user_problem(&issue, user)) {
        (_, Some(problem)) => Verdict::fail(problem).with_snapshot(outcome.snapshot()),
        (Some(_), None) => Verdict::pass(format!("Issue retrieved with user data. Status: {status}")),
        (None, None) => Verdict::pass(format!("Issue retrieved successfully. Status: {status}")),
    })
}

async fn update_issue_status(api: &ApiClient, id: String) -> Result<Verdict, ClientError> {
    let outcome = api
        .put(&format!("/issues/{id}"), &IssueUpdate::with_status(IssueStatus::Acknowledged))
        .await?;

    Ok(
        match Expectation::status(200)
            .field_eq("/status", IssueStatus::Acknowledged.as_str())
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass("Issue status updated to: Acknowledged"),
            Err(failure) => failure,
        },
    )
}

async fn image_url_retrieval(api: &ApiClient, id: String) -> Result<Verdict, ClientError> {
    let outcome = api.get(&format!("/issues/{id}")).await?;

    Ok(
        match Expectation::status(200)
            .field_eq("/image_url", CORE_IMAGE_URL)
            .verify(&outcome)
        {
            Ok(()) => Verdict::pass(format!(
                "Image URL properly stored and retrieved: {CORE_IMAGE_URL}"
            )),
            Err(failure) => failure,
        },
    )
}

async fn rejects<T: Serialize + ?Sized>(
    api: &ApiClient,
    case: &str,
    body: &T,
    expect: &Expectation,
) -> Result<Option<Verdict>, ClientError> {
    let outcome = api.post("/issues", body).await?;
    Ok(expect.verify(&outcome).err().map(|failure| Verdict {
        message: format!("{case}: {}", failure.message),
        ..failure
    }))
}

async fn enhanced_error_handling(api: &ApiClient) -> Result<Verdict, ClientError> {
    if let Some(failure) = rejects(
        api,
        "Empty request body",
        &Fixtures::empty_issue(),
        &Expectation::status(400),
    )
    .await?
    {
        return Ok(failure);
    }
    if let Some(failure) = rejects(
        api,
        "Missing required fields",
        &Fixtures::description_only_issue(),
        &Expectation::status(400),
    )
    .await?
    {
        return Ok(failure);
    }
    if let Some(failure) = rejects(
        api,
        "Nonexistent user_id",
        &Fixtures::orphan_issue(),
        &Expectation::any_status(&[404, 500]),
    )
    .await?
    {
        return Ok(failure);
    }

    Ok(Verdict::pass(
        "Error handling working correctly for various scenarios",
    ))
}

async fn cors_headers(api: &ApiClient) -> Result<Verdict, ClientError> {
    Ok(match cors_problem(api, "/").await? {
        None => Verdict::pass("All required CORS headers present"),
        Some(problem) => Verdict::fail(problem),
    })
}

async fn expect_status(api: &ApiClient, path: &str, expect: &Expectation) -> Result<Verdict, ClientError> {
    let outcome = api.get(path).await?;

    Ok(match expect.verify(&outcome) {
        Ok(()) => Verdict::pass(format!("{path} returned {} as expected", outcome.status)),
        Err(failure) => failure,
    })
}

async fn missing_fields(api: &ApiClient) -> Result<Verdict, ClientError> {
    let outcome = api.post("/users", &Fixtures::nameless_email_user()).await?;

    Ok(match Expectation::status(400).verify(&outcome) {
        Ok(()) => Verdict::pass("Missing required fields returns 400 correctly"),
        Err(failure) => failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> NewUser {
        Fixtures::with_stamp(1).core_user(UserId::new())
    }

    fn issue_with(users: serde_json::Value) -> Issue {
        serde_json::from_value(json!({"id": "1", "users": users})).unwrap()
    }

    #[test]
    fn test_joined_user_must_match_fixture() {
        let user = user();

        let matching = issue_with(json!({"name": "Jane Smith", "email": user.email}));
        assert_eq!(joined_user_problem(&matching, &user), None);

        let other = issue_with(json!({"name": "Someone Else"}));
        assert!(joined_user_problem(&other, &user)
            .unwrap()
            .contains("name mismatch"));

        let wrong_email = issue_with(json!({"name": "Jane Smith", "email": "x@example.com"}));
        assert!(joined_user_problem(&wrong_email, &user)
            .unwrap()
            .contains("email mismatch"));
    }

    #[test]
    fn test_missing_join_is_not_a_problem() {
        let issue: Issue = serde_json::from_value(json!({"id": "1"})).unwrap();
        assert_eq!(joined_user_problem(&issue, &user()), None);
    }
}
