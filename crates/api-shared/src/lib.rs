//! # API Shared
//!
//! Shared definitions for the filing service APIs.
//!
//! Contains:
//! - Response bodies serialised by the API surfaces (`HealthRes`, `UploadRes`)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the workspace binary.

pub mod health;
pub mod types;

pub use health::HealthService;
pub use types::{HealthRes, UploadRes};
