//! Civic Reporter API Harness
//!
//! Black-box checks for a deployed Civic Reporter backend. The harness
//! drives the public HTTP API with synthetic users, issues and departments,
//! evaluates each response against expectations, prints a PASS/FAIL line per
//! check, and writes a JSON run summary.
//!
//! # Suites
//!
//! - `core`: issue and user CRUD, image URLs, CORS, error handling
//! - `admin`: departments, admin triage of issues, response consistency
//! - `discovery`: personalization and statistics probes, image handling
//! - `storage`: storage bucket reachability and permissions (opt-in)
//! - `upload`: frontend upload behavior against a missing bucket (opt-in)
//!
//! # Usage
//!
//! ```bash
//! # Default suites (core, admin, discovery) against localhost:3000
//! cargo run -p api-harness
//!
//! # Against a deployment, storage included
//! NEXT_PUBLIC_BASE_URL=https://civic.example.com \
//! NEXT_PUBLIC_SUPABASE_URL=https://abc.supabase.co \
//! NEXT_PUBLIC_SUPABASE_ANON_KEY=... \
//! HARNESS_SUITES=core,admin,discovery,storage,upload \
//! cargo run -p api-harness
//!
//! # Live tests against a running backend
//! cargo test -p api-harness --features live
//! ```
//!
//! The run creates records on the target and never deletes them.

pub mod client;
pub mod config;
pub mod evaluator;
pub mod fixtures;
pub mod report;
pub mod scenarios;
pub mod sequencer;
