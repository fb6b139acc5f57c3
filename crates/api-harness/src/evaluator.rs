//! Expectation evaluation.
//!
//! An [`Expectation`] pairs a set of acceptable status codes with body rules
//! addressed by JSON pointer. Evaluating it against an [`Outcome`] yields a
//! [`Verdict`] whose message names the first rule that did not hold.
//!
//! The remote contract is being discovered rather than assumed, so two
//! policies live here as well:
//!
//! - [`probe`] walks an ordered list of [`Candidate`] endpoints and stops at
//!   the first one whose response satisfies the expectation.
//! - [`preserved_fields`] compares a record before and after a partial
//!   update and reports fields the update was not supposed to touch.

use crate::client::{ApiClient, Outcome};
use crate::report::{Entity, FixtureTally};
use crate::sequencer::Capture;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,

    /// Response body kept with the result, typically for failures.
    pub snapshot: Option<Value>,

    /// Values handed to later checks.
    pub captures: Vec<(Capture, String)>,

    /// Fixtures this check created on the server.
    pub created: FixtureTally,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(true, message.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(false, message.into())
    }

    fn new(passed: bool, message: String) -> Self {
        Self {
            passed,
            message,
            snapshot: None,
            captures: Vec::new(),
            created: FixtureTally::default(),
        }
    }

    /// Attach a response snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Option<Value>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Hand `value` to later checks under `capture`.
    #[must_use]
    pub fn capture(mut self, capture: Capture, value: impl Into<String>) -> Self {
        self.captures.push((capture, value.into()));
        self
    }

    /// Count fixtures created on the server by this check.
    #[must_use]
    pub fn created(mut self, entity: Entity, count: usize) -> Self {
        self.created.add(entity, count);
        self
    }
}

/// Acceptable status codes for a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSet(Vec<u16>);

impl StatusSet {
    pub fn one(code: u16) -> Self {
        Self(vec![code])
    }

    pub fn any_of(codes: &[u16]) -> Self {
        Self(codes.to_vec())
    }

    pub fn contains(&self, code: u16) -> bool {
        self.0.contains(&code)
    }
}

impl fmt::Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.0.iter().map(u16::to_string).collect();
        match codes.as_slice() {
            [single] => write!(f, "{single}"),
            [rest @ .., last] => write!(f, "{} or {}", rest.join(", "), last),
            [] => f.write_str("no status"),
        }
    }
}

/// A single body assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    IsArray,
    IsObject,
    MinLength(usize),
    HasField(String),
    FieldEquals(String, Value),
    /// Field is missing or explicitly null.
    FieldAbsent(String),
    /// String field contains the needle, ignoring case.
    FieldMentions(String, String),
    /// Every array item has `field == value`.
    EveryItem(String, Value),
    /// Object has at least one of the keys.
    AnyField(Vec<String>),
}

/// Expected status plus body rules, built fluently.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    statuses: StatusSet,
    rules: Vec<Rule>,
}

impl Expectation {
    /// Expect exactly `code`.
    pub fn status(code: u16) -> Self {
        Self {
            statuses: StatusSet::one(code),
            rules: Vec::new(),
        }
    }

    /// Expect any of `codes`.
    pub fn any_status(codes: &[u16]) -> Self {
        Self {
            statuses: StatusSet::any_of(codes),
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_array(self) -> Self {
        self.rule(Rule::IsArray)
    }

    #[must_use]
    pub fn is_object(self) -> Self {
        self.rule(Rule::IsObject)
    }

    #[must_use]
    pub fn min_len(self, len: usize) -> Self {
        self.rule(Rule::IsArray).rule(Rule::MinLength(len))
    }

    #[must_use]
    pub fn has_field(self, pointer: &str) -> Self {
        self.rule(Rule::HasField(pointer.to_string()))
    }

    #[must_use]
    pub fn field_eq(self, pointer: &str, value: impl Into<Value>) -> Self {
        self.rule(Rule::FieldEquals(pointer.to_string(), value.into()))
    }

    #[must_use]
    pub fn field_absent(self, pointer: &str) -> Self {
        self.rule(Rule::FieldAbsent(pointer.to_string()))
    }

    #[must_use]
    pub fn field_mentions(self, pointer: &str, needle: &str) -> Self {
        self.rule(Rule::FieldMentions(pointer.to_string(), needle.to_string()))
    }

    #[must_use]
    pub fn every_item(self, field: &str, value: impl Into<Value>) -> Self {
        self.rule(Rule::IsArray)
            .rule(Rule::EveryItem(field.to_string(), value.into()))
    }

    #[must_use]
    pub fn any_field(self, keys: &[&str]) -> Self {
        self.rule(Rule::IsObject).rule(Rule::AnyField(
            keys.iter().map(|key| (*key).to_string()).collect(),
        ))
    }

    fn rule(mut self, rule: Rule) -> Self {
        if !(matches!(rule, Rule::IsArray | Rule::IsObject) && self.rules.contains(&rule)) {
            self.rules.push(rule);
        }
        self
    }

    /// Check `outcome`, returning the failing verdict on the first mismatch.
    pub fn verify(&self, outcome: &Outcome) -> Result<(), Verdict> {
        if !self.statuses.contains(outcome.status) {
            return Err(Verdict::fail(format!(
                "Expected HTTP {}, got {}",
                self.statuses,
                outcome.describe()
            ))
            .with_snapshot(outcome.snapshot()));
        }

        for rule in &self.rules {
            if let Err(reason) = check_rule(rule, outcome) {
                return Err(Verdict::fail(reason).with_snapshot(outcome.snapshot()));
            }
        }

        Ok(())
    }

    /// Evaluate `outcome` into a verdict with a generic pass message.
    pub fn evaluate(&self, outcome: &Outcome) -> Verdict {
        match self.verify(outcome) {
            Ok(()) => Verdict::pass(format!("HTTP {} matched expectations", outcome.status)),
            Err(failure) => failure,
        }
    }
}

fn field_name(pointer: &str) -> &str {
    pointer.trim_start_matches('/')
}

fn render(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "nothing".to_string(),
    }
}

fn check_rule(rule: &Rule, outcome: &Outcome) -> Result<(), String> {
    let body = outcome.json();

    match rule {
        Rule::IsArray => match body {
            Some(Value::Array(_)) => Ok(()),
            _ => Err("Response is not an array".to_string()),
        },
        Rule::IsObject => match body {
            Some(Value::Object(_)) => Ok(()),
            _ => Err("Response is not an object".to_string()),
        },
        Rule::MinLength(min) => {
            let len = outcome.array_len().unwrap_or(0);
            if len >= *min {
                Ok(())
            } else {
                Err(format!("Expected at least {min} items, got {len}"))
            }
        }
        Rule::HasField(pointer) => match outcome.field(pointer) {
            Some(_) => Ok(()),
            None => Err(format!(
                "Response missing required field '{}'",
                field_name(pointer)
            )),
        },
        Rule::FieldEquals(pointer, expected) => {
            let actual = outcome.field(pointer);
            if actual == Some(expected) {
                Ok(())
            } else {
                Err(format!(
                    "Field '{}' mismatch: expected {}, got {}",
                    field_name(pointer),
                    expected,
                    render(actual)
                ))
            }
        }
        Rule::FieldAbsent(pointer) => match outcome.field(pointer) {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(format!(
                "Expected '{}' to be empty, got {}",
                field_name(pointer),
                other
            )),
        },
        Rule::FieldMentions(pointer, needle) => {
            let text = outcome
                .field(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if text.to_lowercase().contains(&needle.to_lowercase()) {
                Ok(())
            } else {
                Err(format!(
                    "Field '{}' does not mention '{}': {}",
                    field_name(pointer),
                    needle,
                    render(outcome.field(pointer))
                ))
            }
        }
        Rule::EveryItem(field, expected) => {
            let items = body.and_then(Value::as_array).cloned().unwrap_or_default();
            let matching = items
                .iter()
                .filter(|item| item.get(field) == Some(expected))
                .count();
            if matching == items.len() {
                Ok(())
            } else {
                Err(format!(
                    "Only {matching}/{} items have {field} == {expected}",
                    items.len()
                ))
            }
        }
        Rule::AnyField(keys) => {
            let found = body
                .and_then(Value::as_object)
                .is_some_and(|object| keys.iter().any(|key| object.contains_key(key)));
            if found {
                Ok(())
            } else {
                Err(format!("Response has none of the fields {}", keys.join(", ")))
            }
        }
    }
}

/// One endpoint shape to try while discovering a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Candidate {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (index, (key, value)) in self.query.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{key}={value}")?;
        }
        Ok(())
    }
}

/// Result of walking a candidate list.
#[derive(Debug)]
pub enum ProbeResult {
    /// The first candidate whose response satisfied the expectation.
    Found { candidate: Candidate, outcome: Outcome },

    /// Every candidate was rejected; one line per attempt.
    Exhausted { attempts: Vec<String> },
}

impl ProbeResult {
    /// Human-readable account of what was tried.
    pub fn describe_attempts(attempts: &[String]) -> String {
        format!(
            "Tried {} endpoint(s): {}",
            attempts.len(),
            attempts.join("; ")
        )
    }
}

/// Try `candidates` in order; the first response satisfying `expect` wins.
///
/// Transport errors and mismatches are noted and probing continues.
pub async fn probe(client: &ApiClient, candidates: &[Candidate], expect: &Expectation) -> ProbeResult {
    let mut attempts = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let result = if candidate.query.is_empty() {
            client.get(&candidate.path).await
        } else {
            client.get_with_query(&candidate.path, &candidate.query).await
        };

        match result {
            Ok(outcome) => match expect.verify(&outcome) {
                Ok(()) => {
                    debug!(%candidate, "Probe matched");
                    return ProbeResult::Found {
                        candidate: candidate.clone(),
                        outcome,
                    };
                }
                Err(rejection) => attempts.push(format!("{candidate} -> {}", rejection.message)),
            },
            Err(e) => attempts.push(format!("{candidate} -> {e}")),
        }
    }

    ProbeResult::Exhausted { attempts }
}

/// Compare `fields` of a record before and after a partial update.
pub fn preserved_fields(before: &Value, after: &Value, fields: &[&str]) -> Verdict {
    let changed: Vec<String> = fields
        .iter()
        .filter_map(|field| {
            let old = before.get(field);
            let new = after.get(field);
            (old != new).then(|| format!("{field} ({} -> {})", render(old), render(new)))
        })
        .collect();

    if changed.is_empty() {
        Verdict::pass(format!("Preserved {}", fields.join(", ")))
    } else {
        Verdict::fail(format!(
            "Partial update changed untouched fields: {}",
            changed.join(", ")
        ))
        .with_snapshot(Some(after.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Body;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn json_outcome(status: u16, value: Value) -> Outcome {
        Outcome::new(status, Body::Json(value))
    }

    #[test]
    fn test_status_set_display() {
        assert_eq!(StatusSet::one(200).to_string(), "200");
        assert_eq!(StatusSet::any_of(&[404, 500]).to_string(), "404 or 500");
        assert_eq!(StatusSet::any_of(&[200, 201, 204]).to_string(), "200, 201 or 204");
    }

    #[test]
    fn test_any_status_accepts_each_code() {
        let expect = Expectation::any_status(&[404, 500]);

        assert!(expect.evaluate(&Outcome::new(404, Body::Empty)).passed);
        assert!(expect.evaluate(&Outcome::new(500, Body::Empty)).passed);

        let verdict = expect.evaluate(&Outcome::new(200, Body::Empty));
        assert!(!verdict.passed);
        assert!(verdict.message.contains("Expected HTTP 404 or 500, got HTTP 200"));
    }

    #[test]
    fn test_status_mismatch_keeps_snapshot() {
        let outcome = json_outcome(500, json!({"error": "boom"}));

        let verdict = Expectation::status(201).evaluate(&outcome);
        assert!(!verdict.passed);
        assert_eq!(verdict.snapshot, Some(json!({"error": "boom"})));
    }

    #[test]
    fn test_field_equality_reports_first_mismatch() {
        let outcome = json_outcome(201, json!({"name": "Public Works Department", "active": false}));

        let verdict = Expectation::status(201)
            .field_eq("/name", "Public Works Department")
            .field_eq("/active", true)
            .evaluate(&outcome);

        assert!(!verdict.passed);
        assert_eq!(
            verdict.message,
            "Field 'active' mismatch: expected true, got false"
        );
    }

    #[test]
    fn test_missing_field_is_reported_by_name() {
        let outcome = json_outcome(200, json!({"status": "healthy"}));

        let verdict = Expectation::status(200)
            .has_field("/timestamp")
            .evaluate(&outcome);

        assert_eq!(verdict.message, "Response missing required field 'timestamp'");
    }

    #[test]
    fn test_field_absent_accepts_null_and_missing() {
        let expect = Expectation::status(201).field_absent("/image_url");

        assert!(expect.evaluate(&json_outcome(201, json!({"image_url": null}))).passed);
        assert!(expect.evaluate(&json_outcome(201, json!({}))).passed);
        assert!(!expect.evaluate(&json_outcome(201, json!({"image_url": "x"}))).passed);
    }

    #[test]
    fn test_field_mentions_is_case_insensitive() {
        let expect = Expectation::status(400).field_mentions("/error", "status");

        let outcome = json_outcome(400, json!({"error": "Invalid Status value"}));
        assert!(expect.evaluate(&outcome).passed);

        let outcome = json_outcome(400, json!({"error": "Bad request"}));
        let verdict = expect.evaluate(&outcome);
        assert!(!verdict.passed);
        assert!(verdict.message.contains("does not mention 'status'"));
    }

    #[test]
    fn test_array_rules() {
        let outcome = json_outcome(
            200,
            json!([
                {"name": "Public Works Department", "user_id": "u1"},
                {"name": "Water & Sanitation", "user_id": "u2"}
            ]),
        );

        assert!(Expectation::status(200).min_len(2).evaluate(&outcome).passed);

        let verdict = Expectation::status(200)
            .every_item("user_id", "u1")
            .evaluate(&outcome);
        assert!(!verdict.passed);
        assert_eq!(verdict.message, "Only 1/2 items have user_id == \"u1\"");

        let verdict = Expectation::status(200).min_len(3).evaluate(&outcome);
        assert_eq!(verdict.message, "Expected at least 3 items, got 2");
    }

    #[test]
    fn test_is_array_rejects_object() {
        let verdict = Expectation::status(200)
            .is_array()
            .evaluate(&json_outcome(200, json!({"items": []})));

        assert!(!verdict.passed);
        assert_eq!(verdict.message, "Response is not an array");
    }

    #[test]
    fn test_any_field_for_statistics_shape() {
        let expect = Expectation::status(200).any_field(&["total", "resolved"]);

        assert!(expect.evaluate(&json_outcome(200, json!({"resolved": 3}))).passed);
        assert!(!expect.evaluate(&json_outcome(200, json!({"count": 3}))).passed);
        assert!(!expect.evaluate(&json_outcome(200, json!([1, 2]))).passed);
    }

    #[test]
    fn test_shape_rules_are_not_duplicated() {
        let expect = Expectation::status(200).is_array().min_len(1).every_item("a", 1);
        assert_eq!(
            expect.rules,
            vec![
                Rule::IsArray,
                Rule::MinLength(1),
                Rule::EveryItem("a".to_string(), json!(1))
            ]
        );
    }

    #[test]
    fn test_preserved_fields_detects_changes() {
        let before = json!({"status": "Acknowledged", "assigned_department": "Roads", "admin_remarks": "soon"});
        let kept = json!({"status": "Resolved", "assigned_department": "Roads", "admin_remarks": "soon"});
        let lost = json!({"status": "Resolved", "assigned_department": null, "admin_remarks": "soon"});

        let fields = ["assigned_department", "admin_remarks"];
        assert!(preserved_fields(&before, &kept, &fields).passed);

        let verdict = preserved_fields(&before, &lost, &fields);
        assert!(!verdict.passed);
        assert!(verdict.message.contains("assigned_department (\"Roads\" -> null)"));
    }

    #[test]
    fn test_candidate_display() {
        let candidate = Candidate::path("/issues").with_query("user_id", "abc");
        assert_eq!(candidate.to_string(), "/issues?user_id=abc");
        assert_eq!(Candidate::path("/stats").to_string(), "/stats");
    }

    #[test]
    fn test_verdict_builders() {
        let verdict = Verdict::pass("created")
            .capture(Capture::IssueId, "42")
            .created(Entity::Issue, 1);

        assert!(verdict.passed);
        assert_eq!(verdict.captures, vec![(Capture::IssueId, "42".to_string())]);
        assert_eq!(verdict.created.issues, 1);
    }

    #[tokio::test]
    async fn test_probe_returns_first_matching_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/issues"))
            .and(query_param("user_id", "u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "1", "user_id": "u1"},
                {"id": "2", "user_id": "u2"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/issues/user/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "1", "user_id": "u1"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users/u1/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/api", server.uri()), Duration::from_secs(5))
            .expect("client should build");
        let candidates = [
            Candidate::path("/issues").with_query("user_id", "u1"),
            Candidate::path("/issues/user/u1"),
            Candidate::path("/users/u1/issues"),
        ];
        let expect = Expectation::status(200).min_len(1).every_item("user_id", "u1");

        match probe(&client, &candidates, &expect).await {
            ProbeResult::Found { candidate, outcome } => {
                assert_eq!(candidate.path, "/issues/user/u1");
                assert_eq!(outcome.array_len(), Some(1));
            }
            ProbeResult::Exhausted { attempts } => panic!("probe should match: {attempts:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_exhausted_describes_every_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/statistics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1})))
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/api", server.uri()), Duration::from_secs(5))
            .expect("client should build");
        let candidates = [Candidate::path("/stats"), Candidate::path("/statistics")];
        let expect = Expectation::status(200).any_field(&["total"]);

        match probe(&client, &candidates, &expect).await {
            ProbeResult::Exhausted { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("/stats -> Expected HTTP 200, got HTTP 404"));
                assert_eq!(
                    attempts[1],
                    "/statistics -> Response has none of the fields total"
                );
                let description = ProbeResult::describe_attempts(&attempts);
                assert!(description.starts_with("Tried 2 endpoint(s): /stats"));
            }
            ProbeResult::Found { candidate, .. } => panic!("unexpected match at {candidate}"),
        }
    }
}
