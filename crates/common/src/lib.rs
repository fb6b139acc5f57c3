//! Shared types for the Civic Reporter API harness.

#![warn(clippy::pedantic)]

/// Module for entity records exchanged with the backend
pub mod models;

/// Module for identifier types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

pub use models::{
    Bucket, Coordinates, Department, Health, Issue, IssueStatus, IssueUpdate, NewDepartment, NewIssue,
    NewUser, StorageObject, User,
};
pub use types::{RecordId, UserId};
