//! Synthetic records injected into the backend.
//!
//! User ids are fresh UUIDs and emails carry the run's Unix timestamp, so
//! repeated runs against the same database never collide on unique columns.

use chrono::Utc;
use common::{Coordinates, NewDepartment, NewIssue, NewUser, UserId};
use serde_json::{json, Value};

/// Image URL attached to the core streetlight report.
pub const CORE_IMAGE_URL: &str = "https://example.com/test-image.jpg";

/// Image URL attached to the discovery image report.
pub const DISCOVERY_IMAGE_URL: &str = "https://example.com/enhanced-test-image.jpg";

/// Issues filed by each cohort user.
pub const ISSUES_PER_COHORT_USER: usize = 2;

/// Users in the discovery cohort.
pub const COHORT_SIZE: usize = 3;

const COHORT_CATEGORIES: [&str; 5] = ["Pothole", "Streetlight", "Garbage", "Water Supply", "Traffic"];

const MAIN_STREET: Coordinates = Coordinates {
    lat: 28.6139,
    lng: 77.2090,
};

/// Builds fixture payloads for one run.
#[derive(Debug, Clone, Copy)]
pub struct Fixtures {
    stamp: i64,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixtures {
    /// Fixtures stamped with the current time.
    pub fn new() -> Self {
        Self::with_stamp(Utc::now().timestamp())
    }

    /// Fixtures stamped with a fixed Unix timestamp.
    pub fn with_stamp(stamp: i64) -> Self {
        Self { stamp }
    }

    /// `<local>.<stamp>@example.com`
    pub fn email(&self, local: &str) -> String {
        format!("{local}.{}@example.com", self.stamp)
    }

    /// `<local>.<stamp>.<n>@example.com`
    pub fn numbered_email(&self, local: &str, n: usize) -> String {
        format!("{local}.{}.{n}@example.com", self.stamp)
    }

    // Core suite

    pub fn core_user(&self, id: UserId) -> NewUser {
        NewUser {
            id: Some(id),
            name: "Jane Smith".to_string(),
            email: Some(self.email("jane.smith")),
            phone: Some("9876543210".to_string()),
            address: Some("456 Oak Street, Test City, TC 12345".to_string()),
            aadhar_number: Some("987654321098".to_string()),
        }
    }

    pub fn pothole_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Large pothole causing traffic issues on Main Street near the intersection with Oak Avenue. The pothole is approximately 2 feet wide and 6 inches deep.",
            "Pothole",
            "Main Street & Oak Avenue, Test City",
            MAIN_STREET,
        )
    }

    pub fn streetlight_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Broken streetlight with exposed wiring creating safety hazard on Park Avenue near the bus stop. The light has been flickering for weeks and now completely dark.",
            "Streetlight",
            "Park Avenue Bus Stop, Test City",
            Coordinates {
                lat: 28.6129,
                lng: 77.2295,
            },
        )
        .with_image(CORE_IMAGE_URL)
    }

    pub fn garbage_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Garbage accumulation near the community center entrance. Multiple bags left unattended for several days attracting stray animals.",
            "Garbage",
            "Community Center Entrance, Test City",
            MAIN_STREET,
        )
    }

    // Admin suite

    pub fn admin_user(&self, id: UserId) -> NewUser {
        NewUser {
            id: Some(id),
            name: "Admin Test User".to_string(),
            email: Some(self.email("admin.test")),
            phone: Some("9876543210".to_string()),
            address: Some("123 Admin Street, Test City, TC 12345".to_string()),
            aadhar_number: Some("123456789012".to_string()),
        }
    }

    pub fn water_supply_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Water pipe burst on Main Street causing flooding and traffic disruption. Urgent repair needed.",
            "Water Supply",
            "Main Street & Central Avenue, Test City",
            MAIN_STREET,
        )
    }

    /// Department submitted with every field, `active` included.
    pub fn public_works_department() -> NewDepartment {
        NewDepartment {
            name: Some("Public Works Department".to_string()),
            description: Some(
                "Responsible for infrastructure maintenance, road repairs, and public utilities"
                    .to_string(),
            ),
            contact_email: Some("publicworks@testcity.gov".to_string()),
            contact_phone: Some("555-0123".to_string()),
            active: Some(true),
        }
    }

    /// Department submitted without `active`, to observe the server default.
    pub fn sanitation_department() -> NewDepartment {
        NewDepartment {
            name: Some("Water & Sanitation".to_string()),
            description: Some(
                "Manages water supply, sewage systems, and sanitation services".to_string(),
            ),
            contact_email: Some("water@testcity.gov".to_string()),
            contact_phone: Some("555-0124".to_string()),
            active: None,
        }
    }

    pub fn unnamed_department() -> NewDepartment {
        NewDepartment {
            description: Some("Test department without name".to_string()),
            contact_email: Some("test@example.com".to_string()),
            ..Default::default()
        }
    }

    pub fn triage_remarks() -> &'static str {
        "Issue has been reviewed and assigned to the appropriate department for resolution. Expected completion within 3-5 business days."
    }

    // Discovery suite

    /// Cohort user `index` (zero-based).
    pub fn cohort_user(&self, id: UserId, index: usize) -> NewUser {
        let n = index + 1;
        NewUser {
            id: Some(id),
            name: format!("Test User {n}"),
            email: Some(self.numbered_email("testuser", n)),
            phone: Some(format!("987654321{index}")),
            address: Some(format!("{n}00 Test Street, Test City, TC 1234{index}")),
            aadhar_number: Some(format!("98765432109{index}")),
        }
    }

    /// Issue `issue_index` of cohort user `user_index`; even issues carry an image.
    pub fn cohort_issue(user: UserId, user_name: &str, user_index: usize, issue_index: usize) -> NewIssue {
        let category = COHORT_CATEGORIES[issue_index % COHORT_CATEGORIES.len()];
        #[allow(clippy::cast_precision_loss)]
        let offset = user_index as f64 * 0.001 + issue_index as f64 * 0.0001;

        let issue = NewIssue::report(
            user,
            format!(
                "Test issue {} from {user_name} - {category} problem requiring attention.",
                issue_index + 1
            ),
            category,
            format!("Location {} for {user_name}, Test City", issue_index + 1),
            Coordinates {
                lat: MAIN_STREET.lat + offset,
                lng: MAIN_STREET.lng + offset,
            },
        );

        if issue_index % 2 == 0 {
            issue.with_image(format!(
                "https://example.com/test-image-{user_index}-{issue_index}.jpg"
            ))
        } else {
            issue
        }
    }

    pub fn profile_user(&self, id: UserId) -> NewUser {
        NewUser {
            id: Some(id),
            name: "Profile Test User".to_string(),
            email: Some(self.email("profiletest")),
            phone: Some("9876543210".to_string()),
            address: Some("123 Profile Test Street, Test City, TC 12345".to_string()),
            aadhar_number: Some("123456789012".to_string()),
        }
    }

    /// Minimal user for the issue/user join check.
    pub fn join_user(&self, id: UserId) -> NewUser {
        NewUser {
            id: Some(id),
            name: "Join Test User".to_string(),
            email: Some(self.email("jointest")),
            phone: Some("9876543210".to_string()),
            address: None,
            aadhar_number: None,
        }
    }

    pub fn join_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Join test issue",
            "Test",
            "Join Test Location",
            MAIN_STREET,
        )
    }

    pub fn discovery_image_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Test issue with image upload functionality - broken streetlight with exposed wiring",
            "Streetlight",
            "Test Location with Image, Test City",
            MAIN_STREET,
        )
        .with_image(DISCOVERY_IMAGE_URL)
    }

    pub fn discovery_plain_issue(user: UserId) -> NewIssue {
        NewIssue::report(
            user,
            "Test issue without image - garbage accumulation",
            "Garbage",
            "Test Location without Image, Test City",
            Coordinates {
                lat: 28.6140,
                lng: 77.2091,
            },
        )
    }

    // Invalid payloads

    pub fn empty_issue() -> Value {
        json!({})
    }

    pub fn description_only_issue() -> NewIssue {
        NewIssue {
            description: Some("Test issue without user_id".to_string()),
            ..Default::default()
        }
    }

    /// Issue filed by a user id that was never created.
    pub fn orphan_issue() -> NewIssue {
        NewIssue {
            user_id: Some(UserId::new().to_string()),
            description: Some("Test issue".to_string()),
            category: Some("Test".to_string()),
            location: Some("Test Location".to_string()),
            ..Default::default()
        }
    }

    /// User missing its required email.
    pub fn nameless_email_user() -> Value {
        json!({"name": "Test"})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails_carry_run_stamp() {
        let fixtures = Fixtures::with_stamp(1_700_000_000);

        assert_eq!(
            fixtures.core_user(UserId::new()).email.as_deref(),
            Some("jane.smith.1700000000@example.com")
        );
        assert_eq!(
            fixtures.cohort_user(UserId::new(), 2).email.as_deref(),
            Some("testuser.1700000000.3@example.com")
        );
    }

    #[test]
    fn test_user_fixture_uses_given_id() {
        let id = UserId::new();
        let user = Fixtures::with_stamp(1).admin_user(id);

        assert_eq!(user.id, Some(id));
        assert_eq!(user.name, "Admin Test User");
    }

    #[test]
    fn test_cohort_issues_alternate_images() {
        let user = UserId::new();

        let first = Fixtures::cohort_issue(user, "Test User 1", 0, 0);
        let second = Fixtures::cohort_issue(user, "Test User 1", 0, 1);

        assert_eq!(first.image_url.as_deref(), Some("https://example.com/test-image-0-0.jpg"));
        assert_eq!(first.category.as_deref(), Some("Pothole"));
        assert_eq!(second.image_url, None);
        assert_eq!(second.category.as_deref(), Some("Streetlight"));
        assert_eq!(second.user_id, Some(user.to_string()));
    }

    #[test]
    fn test_department_fixtures() {
        assert_eq!(Fixtures::public_works_department().active, Some(true));
        assert_eq!(Fixtures::sanitation_department().active, None);
        assert_eq!(Fixtures::unnamed_department().name, None);
    }

    #[test]
    fn test_invalid_issue_payloads() {
        let orphan = Fixtures::orphan_issue();
        assert!(orphan.user_id.is_some());
        assert!(orphan.coordinates.is_none());

        let description_only = Fixtures::description_only_issue();
        assert!(description_only.user_id.is_none());
        assert_eq!(Fixtures::empty_issue(), json!({}));
    }
}
