//! Typed records for the Civic Reporter API.
//!
//! Request payloads (`New*`, [`IssueUpdate`]) skip unset optional fields when
//! serialized so the server sees exactly the fields a caller named. Response
//! records default every field the backend may leave out.

use crate::types::{RecordId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload served by `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,

    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Request body for `POST /api/users`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhar_number: Option<String>,
}

/// User profile as returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,
}

/// Geographic position attached to an issue report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Request body for `POST /api/issues`.
///
/// Every field is optional so malformed submissions can be expressed with the
/// same type; [`NewIssue::report`] builds a complete one.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NewIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewIssue {
    /// A complete issue report filed by `user`.
    pub fn report(
        user: UserId,
        description: impl Into<String>,
        category: impl Into<String>,
        location: impl Into<String>,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            user_id: Some(user.to_string()),
            description: Some(description.into()),
            category: Some(category.into()),
            location: Some(location.into()),
            coordinates: Some(coordinates),
            image_url: None,
        }
    }

    /// Attach a photo URL to the report.
    #[must_use]
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Lifecycle states accepted by `PUT /api/issues/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    Submitted,
    Acknowledged,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl IssueStatus {
    /// Wire representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Submitted => "Submitted",
            IssueStatus::Acknowledged => "Acknowledged",
            IssueStatus::InProgress => "In Progress",
            IssueStatus::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue as returned by the backend, optionally with its reporter joined in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Issue {
    pub id: RecordId,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub coordinates: Option<Coordinates>,

    #[serde(default)]
    pub image_url: Option<String>,

    /// Raw status text; kept as a string so unknown states still parse.
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub assigned_department: Option<String>,

    #[serde(default)]
    pub admin_remarks: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,

    /// Reporter profile, present when the backend joins the users table.
    #[serde(default)]
    pub users: Option<User>,
}

/// Partial update body for `PUT /api/issues/{id}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_department: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_remarks: Option<String>,
}

impl IssueUpdate {
    /// Update that only moves the issue to `status`.
    pub fn with_status(status: IssueStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Update that triages the issue to a department with remarks.
    pub fn triage(
        status: IssueStatus,
        department: impl Into<String>,
        remarks: impl Into<String>,
    ) -> Self {
        Self {
            status: Some(status),
            assigned_department: Some(department.into()),
            admin_remarks: Some(remarks.into()),
        }
    }
}

/// Request body for `POST /api/departments`.
///
/// `name` is optional only so the validation path can be exercised.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NewDepartment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Department as returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Department {
    #[serde(default)]
    pub id: Option<RecordId>,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub contact_phone: Option<String>,

    #[serde(default)]
    pub active: Option<bool>,
}

/// Storage bucket entry from `GET /storage/v1/bucket`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub public: Option<bool>,
}

/// Object entry from `GET /storage/v1/object/list/{bucket}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageObject {
    pub name: String,

    #[serde(default)]
    pub id: Option<String>,
}
