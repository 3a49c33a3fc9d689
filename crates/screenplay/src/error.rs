//! Error types for the Screenplay core

use thiserror::Error;

use crate::capability::Capability;
use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum ScreenplayError {
    #[error("Actor '{actor}' does not have the ability '{capability}'; register it before the scenario starts")]
    MissingAbility { actor: String, capability: Capability },

    #[error("No ability registered for capability '{0}'")]
    CapabilityNotFound(Capability),

    #[error("Invalid actor: {0}")]
    InvalidActor(String),

    #[error("{ability} is closed")]
    AbilityClosed { ability: &'static str },

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timed out after {timeout_ms} ms waiting for: {selector}")]
    ElementTimeout { selector: String, timeout_ms: u64 },

    #[error("HTTP {method} {url} failed with status {status_code}")]
    HttpRequestFailed {
        status_code: u16,
        url: String,
        method: String,
    },

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Step panicked: {0}")]
    StepPanicked(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] screenplay_common::Error),
}

impl ScreenplayError {
    /// Wiring defects: fatal to the scenario and never worth retrying
    pub fn is_setup_defect(&self) -> bool {
        matches!(
            self,
            ScreenplayError::MissingAbility { .. }
                | ScreenplayError::CapabilityNotFound(_)
                | ScreenplayError::InvalidActor(_)
        )
    }

    /// Expected conditions a caller may choose to handle
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScreenplayError::ElementNotFound { .. }
                | ScreenplayError::ElementTimeout { .. }
                | ScreenplayError::HttpRequestFailed { .. }
        )
    }
}

pub type ScreenplayResult<T> = Result<T, ScreenplayError>;
