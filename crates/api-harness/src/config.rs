//! Harness configuration.
//!
//! Configuration is loaded once from environment variables at startup and
//! passed by reference to every component. The storage API key is held as a
//! [`SecretString`] and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default backend origin when `NEXT_PUBLIC_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Path prefix shared by every backend route.
pub const API_PREFIX: &str = "/api";

/// Default location of the JSON run summary.
pub const DEFAULT_RESULTS_PATH: &str = "test_results_detailed.json";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between checks.
pub const DEFAULT_CHECK_DELAY: Duration = Duration::from_millis(500);

/// Bucket the frontend uploads issue photos into.
pub const DEFAULT_STORAGE_BUCKET: &str = "issue-photos";

/// Suites run when `HARNESS_SUITES` is unset.
pub const DEFAULT_SUITES: [Suite; 3] = [Suite::Core, Suite::Admin, Suite::Discovery];

/// A named group of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    /// Issue and user CRUD, CORS and basic error handling.
    Core,
    /// Departments and admin triage of issues.
    Admin,
    /// Personalization, statistics and image-handling probes.
    Discovery,
    /// Storage bucket reachability and permissions.
    Storage,
    /// Frontend upload behavior against a missing bucket.
    Upload,
}

impl Suite {
    /// Name used in `HARNESS_SUITES` and the run summary.
    pub fn name(self) -> &'static str {
        match self {
            Suite::Core => "core",
            Suite::Admin => "admin",
            Suite::Discovery => "discovery",
            Suite::Storage => "storage",
            Suite::Upload => "upload",
        }
    }

    /// Whether the suite talks to the storage API and needs its credentials.
    pub fn needs_storage(self) -> bool {
        matches!(self, Suite::Storage | Suite::Upload)
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suite {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Suite::Core),
            "admin" => Ok(Suite::Admin),
            "discovery" => Ok(Suite::Discovery),
            "storage" => Ok(Suite::Storage),
            "upload" => Ok(Suite::Upload),
            other => Err(ConfigError::UnknownSuite(other.to_string())),
        }
    }
}

/// Storage API connection settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Project origin, e.g. `https://abc.supabase.co`.
    pub url: String,

    /// Anonymous API key sent as a bearer token.
    pub anon_key: SecretString,

    /// Bucket holding issue photos.
    pub bucket: String,
}

impl StorageConfig {
    /// Root of the storage REST API.
    pub fn storage_api_url(&self) -> String {
        format!("{}/storage/v1", self.url.trim_end_matches('/'))
    }

    /// Public URL the frontend would hand out for `object` in the bucket.
    pub fn public_object_url(&self, object: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.storage_api_url(),
            self.bucket,
            object
        )
    }
}

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin without the `/api` prefix.
    pub base_url: String,

    /// Suites to run, in order.
    pub suites: Vec<Suite>,

    /// Where the run summary is written.
    pub results_path: PathBuf,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// Pause after each check; zero disables it.
    pub check_delay: Duration,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,

    /// Storage settings; present whenever both storage variables are set.
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unknown suite '{0}' (expected core, admin, discovery, storage or upload)")]
    UnknownSuite(String),

    #[error("Invalid request timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid check delay configuration: {0}")]
    InvalidCheckDelay(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let base_url = vars
            .get("NEXT_PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let suites = match vars.get("HARNESS_SUITES") {
            Some(list) if !list.trim().is_empty() => {
                let mut suites = Vec::new();
                for name in list.split(',').filter(|name| !name.trim().is_empty()) {
                    let suite: Suite = name.parse()?;
                    if !suites.contains(&suite) {
                        suites.push(suite);
                    }
                }
                suites
            }
            _ => DEFAULT_SUITES.to_vec(),
        };

        let results_path = vars
            .get("HARNESS_RESULTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_PATH));

        let request_timeout = if let Some(value_str) = vars.get("HARNESS_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidTimeout(format!(
                    "HARNESS_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidTimeout(
                    "HARNESS_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_REQUEST_TIMEOUT
        };

        let check_delay = if let Some(value_str) = vars.get("HARNESS_CHECK_DELAY_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCheckDelay(format!(
                    "HARNESS_CHECK_DELAY_MS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            Duration::from_millis(value)
        } else {
            DEFAULT_CHECK_DELAY
        };

        let log_json = vars
            .get("HARNESS_LOG_JSON")
            .is_some_and(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes"));

        let storage_url = vars
            .get("NEXT_PUBLIC_SUPABASE_URL")
            .filter(|value| !value.is_empty());
        let storage_key = vars
            .get("NEXT_PUBLIC_SUPABASE_ANON_KEY")
            .filter(|value| !value.is_empty());

        let storage = match (storage_url, storage_key) {
            (Some(url), Some(key)) => Some(StorageConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key: SecretString::from(key.clone()),
                bucket: vars
                    .get("HARNESS_STORAGE_BUCKET")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string()),
            }),
            _ => None,
        };

        // Storage suites cannot run without credentials; fail before any check.
        if storage.is_none() && suites.iter().any(|suite| suite.needs_storage()) {
            let missing = if storage_url.is_none() {
                "NEXT_PUBLIC_SUPABASE_URL"
            } else {
                "NEXT_PUBLIC_SUPABASE_ANON_KEY"
            };
            return Err(ConfigError::MissingEnvVar(missing.to_string()));
        }

        Ok(Config {
            base_url,
            suites,
            results_path,
            request_timeout,
            check_delay,
            log_json,
            storage,
        })
    }

    /// Base URL for backend API calls (`<base_url>/api`).
    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url, API_PREFIX)
    }

    /// Names of the selected suites, in run order.
    pub fn suite_names(&self) -> Vec<String> {
        self.suites.iter().map(|suite| suite.name().to_string()).collect()
    }
}
