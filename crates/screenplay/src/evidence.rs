//! Evidence capture
//!
//! Artifacts are laid out as
//! `{base}/{category}/{scenario}/{browser}/{stepTag}_{timestamp}.{ext}`;
//! API exchanges drop the browser segment. Directories are created on demand
//! right before each write. Every recorded artifact is hashed so a report sink
//! can check it later.

use std::path::{Path, PathBuf};

use chrono::Local;
use screenplay_common::{sanitize_title, ArtifactKind, BrowserFamily, EvidenceArtifact, WebConfig};
use tracing::debug;

use crate::ability::LastOperation;

/// When the web ability captures evidence on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvidencePolicy {
    pub before_step: bool,
    pub after_step: bool,
    pub on_failure: bool,
    pub record_video: bool,
}

impl From<&WebConfig> for EvidencePolicy {
    fn from(config: &WebConfig) -> Self {
        Self {
            before_step: config.screenshots_before_step,
            after_step: config.screenshots_after_step,
            on_failure: config.screenshots_on_failure,
            record_video: config.record_video,
        }
    }
}

/// Builds evidence paths for one scenario and keeps the list of what was written
#[derive(Debug, Clone)]
pub struct EvidenceCollector {
    base_path: PathBuf,
    scenario: String,
    artifacts: Vec<EvidenceArtifact>,
}

impl EvidenceCollector {
    pub fn new(base_path: impl Into<PathBuf>, scenario_title: &str) -> Self {
        Self {
            base_path: base_path.into(),
            scenario: sanitize_title(scenario_title),
            artifacts: Vec::new(),
        }
    }

    /// Sanitized scenario title used as a path segment
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn artifacts(&self) -> &[EvidenceArtifact] {
        &self.artifacts
    }

    /// `step_NN` for automatic captures
    pub fn step_tag(counter: u32) -> String {
        format!("step_{:02}", counter)
    }

    pub fn timestamp() -> String {
        Local::now().format("%Y%m%d_%H%M%S").to_string()
    }

    /// Directory for a category, with the browser segment when given
    pub fn dir(&self, category: &str, browser: Option<BrowserFamily>) -> PathBuf {
        let dir = self.base_path.join(category).join(&self.scenario);
        match browser {
            Some(browser) => dir.join(browser.as_str()),
            None => dir,
        }
    }

    /// Where a session records its video
    pub fn video_dir(&self, browser: BrowserFamily) -> PathBuf {
        self.dir(ArtifactKind::Video.category(), Some(browser))
    }

    /// Create the target directory and return a fresh file path in it
    pub async fn allocate(
        &self,
        category: &str,
        browser: Option<BrowserFamily>,
        step_tag: &str,
        suffix: &str,
    ) -> std::io::Result<PathBuf> {
        let dir = self.dir(category, browser);
        tokio::fs::create_dir_all(&dir).await?;
        let tag = sanitize_title(step_tag);
        Ok(dir.join(format!("{}_{}{}", tag, Self::timestamp(), suffix)))
    }

    /// Path for an artifact of `kind` stored in its own category
    pub async fn allocate_for(
        &self,
        kind: ArtifactKind,
        browser: Option<BrowserFamily>,
        step_tag: &str,
    ) -> std::io::Result<PathBuf> {
        self.allocate(kind.category(), browser, step_tag, &format!(".{}", kind.extension()))
            .await
    }

    /// Remember a file that now exists on disk
    pub fn record(&mut self, path: PathBuf, kind: ArtifactKind, step: Option<&str>) -> &EvidenceArtifact {
        debug!("Evidence recorded: {}", path.display());
        let artifact = EvidenceArtifact::new(path, kind, &self.scenario, step);
        self.artifacts.push(artifact);
        // just pushed
        &self.artifacts[self.artifacts.len() - 1]
    }

    /// Write a structured error detail file under `errors/`
    pub async fn record_failure_detail(
        &mut self,
        browser: Option<BrowserFamily>,
        error: &str,
        last_operation: Option<&LastOperation>,
    ) -> std::io::Result<PathBuf> {
        let path = self
            .allocate(ArtifactKind::ErrorDetail.category(), browser, "failure", ".txt")
            .await?;

        let mut detail = String::new();
        detail.push_str(&format!("Scenario: {}\n", self.scenario));
        if let Some(browser) = browser {
            detail.push_str(&format!("Browser: {}\n", browser));
        }
        detail.push_str(&format!("Captured: {}\n", Local::now().to_rfc3339()));
        detail.push_str(&format!("Error: {}\n", error));
        if let Some(op) = last_operation {
            detail.push_str(&format!("Last operation: {} {}\n", op.method, op.target));
            if let Some(result) = &op.result {
                detail.push_str(&format!("Last result: {}\n", result));
            }
        }

        tokio::fs::write(&path, detail).await?;
        self.record(path.clone(), ArtifactKind::ErrorDetail, Some("failure"));
        Ok(path)
    }

    /// Write the request and response logs of one API exchange under `api/`
    pub async fn record_exchange(
        &mut self,
        step_tag: &str,
        exchange: &LastOperation,
    ) -> std::io::Result<(PathBuf, PathBuf)> {
        let category = ArtifactKind::RequestLog.category();
        let request_path = self.allocate(category, None, step_tag, "_request.txt").await?;
        let response_path = request_path.with_file_name(
            request_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.replace("_request.txt", "_response.json"))
                .unwrap_or_else(|| format!("{}_response.json", step_tag)),
        );

        let mut request = String::new();
        request.push_str(&format!("Method: {}\n", exchange.method));
        request.push_str(&format!("URL: {}\n", exchange.target));
        match exchange.status {
            Some(status) => request.push_str(&format!("Status: {}\n", status)),
            None => request.push_str("Status: none\n"),
        }
        if let Some(body) = exchange.payload.as_deref().filter(|b| !b.trim().is_empty()) {
            request.push_str("Body:\n");
            request.push_str(body);
            request.push('\n');
        }

        let response = exchange
            .raw_response
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or("null");

        tokio::fs::write(&request_path, request).await?;
        tokio::fs::write(&response_path, response).await?;

        self.record(request_path.clone(), ArtifactKind::RequestLog, Some(step_tag));
        self.record(response_path.clone(), ArtifactKind::ResponseLog, Some(step_tag));
        Ok((request_path, response_path))
    }
}
