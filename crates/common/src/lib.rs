//! Screenplay Common Library
//!
//! Configuration snapshots and value types shared by the harness crates.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AuthType, EnvSource, HarnessConfig, ProcessEnv, WebConfig, CURRENT_BROWSER_VAR,
};
pub use error::{Error, Result};
pub use types::*;

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
