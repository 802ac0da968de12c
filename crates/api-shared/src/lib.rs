//! # API Shared
//!
//! Shared utilities and definitions for the Libris APIs.
//!
//! Contains:
//! - Request/response bodies (`types` module)
//! - Shared services like `HealthService`
//! - Token decoding and the single role check every protected endpoint uses
//!
//! Used by `libris-core`, `api-rest` and the CLI.

pub mod auth;
pub mod health;
pub mod types;

pub use auth::{require_role, AuthError, Claims, Identity, Role, TokenKeys};
pub use health::HealthService;
pub use types::*;
