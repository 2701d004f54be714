//! # Filing Core
//!
//! Startup configuration and collaborators of the filing service that sit outside the
//! write protocol itself:
//! - [`CoreConfig`]: settings resolved once from the environment and turned into a
//!   configured [`filing_files::Filestore`]
//! - [`RescanNotifier`]: tells an external content index that a directory changed
//!
//! **No API concerns**: HTTP handling belongs in `api-rest`.

pub mod config;
pub mod constants;
pub mod error;
pub mod notifier;

pub use config::{CoreConfig, NextcloudConfig};
pub use constants::*;
pub use error::{CoreError, CoreResult};
pub use notifier::{NextcloudOcc, RescanNotifier};
