//! Secret types for values that must never reach logs or result artifacts.
//!
//! The storage API key is a JWT that grants access to the project's storage
//! buckets. It is held as a [`SecretString`] from the moment configuration is
//! read, so deriving `Debug` on any struct that carries it stays safe.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let key = SecretString::from("eyJhbGciOiJIUzI1NiJ9.payload.sig");
//!
//! // Redacted
//! println!("{key:?}");
//!
//! // Explicit access when building the Authorization header
//! let header = format!("Bearer {}", key.expose_secret());
//! assert!(header.starts_with("Bearer eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
