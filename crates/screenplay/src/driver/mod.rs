//! Browser engine seam
//!
//! The web ability never talks to a browser directly. It goes through four
//! handles, each owned by the one above it:
//!
//! ```text
//! BrowserDriver  (factory, shared)
//!   └── BrowserEngine   (e.g. the Playwright bridge process)
//!         └── BrowserSession  (launched browser + context)
//!               └── BrowserPage     (the single page used by a scenario)
//! ```
//!
//! `PlaywrightDriver` is the production implementation. Tests plug in an
//! in-memory driver through the same traits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use screenplay_common::BrowserFamily;
use thiserror::Error;

mod playwright;

pub use playwright::{PlaywrightConfig, PlaywrightDriver};

/// Errors reported by a browser driver
#[derive(Debug, Error)]
pub enum DriverError {
    /// The engine or browser could not be started.
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    /// No element matched the selector.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The engine gave up waiting.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The engine rejected or failed an operation.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The engine connection broke.
    #[error("Communication error: {0}")]
    Communication(String),

    /// The handle was already released.
    #[error("Handle already closed")]
    Closed,
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::Communication(e.to_string())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        DriverError::Communication(format!("JSON error: {}", e))
    }
}

/// How a browser session is launched
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub family: BrowserFamily,
    pub headless: bool,
    /// Directory the session records video into, when recording
    pub record_video_dir: Option<PathBuf>,
    /// Default timeout the engine applies to navigation and actions
    pub default_timeout_ms: u64,
}

/// Starts engines. Shared across scenarios; holds no session state.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn start(&self) -> Result<Box<dyn BrowserEngine>, DriverError>;
}

#[async_trait]
pub trait BrowserEngine: Send {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, DriverError>;

    async fn shutdown(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait BrowserPage: Send {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// Text of the first match, `None` when nothing matches
    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, DriverError>;

    async fn url(&mut self) -> Result<String, DriverError>;

    /// `false` when nothing matches
    async fn is_visible(&mut self, selector: &str) -> Result<bool, DriverError>;

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<(), DriverError>;

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError>;

    async fn press(&mut self, selector: &str, key: &str) -> Result<(), DriverError>;

    /// Where the page's video is written, when the session records one
    async fn video_path(&mut self) -> Result<Option<PathBuf>, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}
