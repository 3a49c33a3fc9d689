//! Browser ability
//!
//! `Uninitialized -> Active -> Closed`. The first verb starts an engine,
//! launches the configured browser family and opens the one page the scenario
//! uses. Every instrumented verb may be wrapped in before/after screenshots
//! and advances the step counter that names them. `close` releases page,
//! session and engine in that order; each release is attempted regardless of
//! the others. Nothing reopens a closed ability.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use screenplay_common::{ArtifactKind, BrowserFamily, EvidenceArtifact, WebConfig};
use tracing::{debug, info, warn};

use super::LastOperation;
use crate::driver::{
    BrowserDriver, BrowserEngine, BrowserPage, BrowserSession, DriverError, LaunchOptions,
};
use crate::error::{ScreenplayError, ScreenplayResult};
use crate::evidence::{EvidenceCollector, EvidencePolicy};

const ABILITY_NAME: &str = "WebAbility";

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

struct ActiveSession {
    engine: Box<dyn BrowserEngine>,
    session: Box<dyn BrowserSession>,
    page: Box<dyn BrowserPage>,
}

enum Session {
    Uninitialized,
    Active(Box<ActiveSession>),
    Closed,
}

enum WebOperation<'a> {
    Navigate { url: &'a str },
    Click { selector: &'a str },
    Fill { selector: &'a str, text: &'a str },
    GetText { selector: &'a str },
    CurrentUrl,
    IsVisible { selector: &'a str },
    WaitFor { selector: &'a str, timeout_ms: u64 },
    Screenshot { path: &'a Path },
    PressKey { selector: &'a str, key: &'a str },
}

impl WebOperation<'_> {
    fn name(&self) -> &'static str {
        match self {
            WebOperation::Navigate { .. } => "navigate",
            WebOperation::Click { .. } => "click",
            WebOperation::Fill { .. } => "fill",
            WebOperation::GetText { .. } => "get_text",
            WebOperation::CurrentUrl => "current_url",
            WebOperation::IsVisible { .. } => "is_visible",
            WebOperation::WaitFor { .. } => "wait_for",
            WebOperation::Screenshot { .. } => "screenshot",
            WebOperation::PressKey { .. } => "press_key",
        }
    }

    fn target(&self) -> String {
        match self {
            WebOperation::Navigate { url } => url.to_string(),
            WebOperation::Click { selector }
            | WebOperation::Fill { selector, .. }
            | WebOperation::GetText { selector }
            | WebOperation::IsVisible { selector }
            | WebOperation::WaitFor { selector, .. }
            | WebOperation::PressKey { selector, .. } => selector.to_string(),
            WebOperation::CurrentUrl => String::new(),
            WebOperation::Screenshot { path } => path.display().to_string(),
        }
    }

    fn payload(&self) -> Option<String> {
        match self {
            WebOperation::Fill { text, .. } => Some(text.to_string()),
            WebOperation::PressKey { key, .. } => Some(key.to_string()),
            WebOperation::WaitFor { timeout_ms, .. } => Some(format!("{} ms", timeout_ms)),
            _ => None,
        }
    }

    /// Screenshots are evidence themselves and are not wrapped in more of it
    fn is_instrumented(&self) -> bool {
        !matches!(self, WebOperation::Screenshot { .. })
    }

    fn describe(&self, outcome: &ScreenplayResult<WebOutput>) -> LastOperation {
        let result = match outcome {
            Ok(WebOutput::Unit) => "ok".to_string(),
            Ok(WebOutput::Text(text)) => text.clone(),
            Ok(WebOutput::Bool(value)) => value.to_string(),
            Err(e) => e.to_string(),
        };
        LastOperation {
            method: self.name().to_string(),
            target: self.target(),
            payload: self.payload(),
            status: None,
            result: Some(result),
            raw_response: None,
        }
    }
}

enum WebOutput {
    Unit,
    Text(String),
    Bool(bool),
}

impl WebOutput {
    fn into_text(self) -> String {
        match self {
            WebOutput::Text(text) => text,
            _ => String::new(),
        }
    }

    fn into_bool(self) -> bool {
        matches!(self, WebOutput::Bool(true))
    }
}

/// Ability to drive one browser page for one scenario
pub struct WebAbility {
    config: Arc<WebConfig>,
    browser: BrowserFamily,
    driver: Arc<dyn BrowserDriver>,
    policy: EvidencePolicy,
    state: Session,
    step_counter: u32,
    last_operation: Option<LastOperation>,
    video_path: Option<PathBuf>,
    evidence: EvidenceCollector,
}

impl WebAbility {
    /// Nothing is launched until the first verb
    pub fn new(
        config: Arc<WebConfig>,
        browser: BrowserFamily,
        driver: Arc<dyn BrowserDriver>,
        scenario: &str,
    ) -> Self {
        let evidence = EvidenceCollector::new(config.evidence_base_path.clone(), scenario);
        Self {
            policy: EvidencePolicy::from(config.as_ref()),
            config,
            browser,
            driver,
            state: Session::Uninitialized,
            step_counter: 0,
            last_operation: None,
            video_path: None,
            evidence,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            Session::Uninitialized => SessionState::Uninitialized,
            Session::Active(_) => SessionState::Active,
            Session::Closed => SessionState::Closed,
        }
    }

    pub fn browser(&self) -> BrowserFamily {
        self.browser
    }

    /// Instrumented verbs performed so far
    pub fn step_count(&self) -> u32 {
        self.step_counter
    }

    pub fn last_operation(&self) -> Option<&LastOperation> {
        self.last_operation.as_ref()
    }

    /// Video file of the session, known once the ability is closed
    pub fn video_path(&self) -> Option<&Path> {
        self.video_path.as_deref()
    }

    pub fn evidence(&self) -> &[EvidenceArtifact] {
        self.evidence.artifacts()
    }

    pub async fn navigate(&mut self, url: &str) -> ScreenplayResult<()> {
        self.perform(WebOperation::Navigate { url }).await?;
        Ok(())
    }

    pub async fn click(&mut self, selector: &str) -> ScreenplayResult<()> {
        self.perform(WebOperation::Click { selector }).await?;
        Ok(())
    }

    pub async fn fill(&mut self, selector: &str, text: &str) -> ScreenplayResult<()> {
        self.perform(WebOperation::Fill { selector, text }).await?;
        Ok(())
    }

    /// Fails with `ElementNotFound` when nothing matches
    pub async fn get_text(&mut self, selector: &str) -> ScreenplayResult<String> {
        Ok(self.perform(WebOperation::GetText { selector }).await?.into_text())
    }

    pub async fn current_url(&mut self) -> ScreenplayResult<String> {
        Ok(self.perform(WebOperation::CurrentUrl).await?.into_text())
    }

    /// `false` for a selector that matches nothing
    pub async fn is_visible(&mut self, selector: &str) -> ScreenplayResult<bool> {
        Ok(self.perform(WebOperation::IsVisible { selector }).await?.into_bool())
    }

    /// Fails with `ElementTimeout` once `timeout_ms` elapses without a match
    pub async fn wait_for(&mut self, selector: &str, timeout_ms: u64) -> ScreenplayResult<()> {
        self.perform(WebOperation::WaitFor { selector, timeout_ms })
            .await?;
        Ok(())
    }

    /// `wait_for` with the configured element wait timeout
    pub async fn wait_for_default(&mut self, selector: &str) -> ScreenplayResult<()> {
        let timeout_ms = self.config.element_wait_timeout_ms;
        self.wait_for(selector, timeout_ms).await
    }

    /// Screenshot to a caller-chosen path; the parent directory is created
    pub async fn screenshot(&mut self, path: &Path) -> ScreenplayResult<()> {
        self.perform(WebOperation::Screenshot { path }).await?;
        Ok(())
    }

    /// Screenshot into the evidence tree under a caller label
    pub async fn capture(&mut self, label: &str) -> ScreenplayResult<PathBuf> {
        self.ensure_active().await?;
        let path = self
            .evidence
            .allocate_for(ArtifactKind::Screenshot, Some(self.browser), label)
            .await?;
        self.screenshot(&path).await?;
        Ok(path)
    }

    pub async fn press_key(&mut self, selector: &str, key: &str) -> ScreenplayResult<()> {
        self.perform(WebOperation::PressKey { selector, key })
            .await?;
        Ok(())
    }

    /// Best-effort failure evidence: a screenshot and an error detail file
    /// under `errors/`. Only taken from a session that is already open.
    pub async fn capture_failure(&mut self, error: &str) -> Vec<PathBuf> {
        let mut captured = Vec::new();
        if !self.policy.on_failure {
            return captured;
        }
        let Session::Active(active) = &mut self.state else {
            debug!("No open browser session, skipping failure screenshot");
            return captured;
        };

        let category = ArtifactKind::ErrorDetail.category();
        match self
            .evidence
            .allocate(category, Some(self.browser), "failure", ".png")
            .await
        {
            Ok(path) => match active.page.screenshot(&path).await {
                Ok(()) => {
                    self.evidence
                        .record(path.clone(), ArtifactKind::Screenshot, Some("failure"));
                    captured.push(path);
                }
                Err(e) => warn!("Failed to capture failure screenshot: {}", e),
            },
            Err(e) => warn!("Failed to prepare failure screenshot path: {}", e),
        }

        match self
            .evidence
            .record_failure_detail(Some(self.browser), error, self.last_operation.as_ref())
            .await
        {
            Ok(path) => captured.push(path),
            Err(e) => warn!("Failed to write failure detail: {}", e),
        }

        captured
    }

    /// Release page, session and engine. A no-op unless a session is open.
    pub async fn close(&mut self) -> ScreenplayResult<()> {
        if !matches!(self.state, Session::Active(_)) {
            debug!("{} close requested with no open session", ABILITY_NAME);
            return Ok(());
        }
        let Session::Active(active) = std::mem::replace(&mut self.state, Session::Closed) else {
            return Ok(());
        };
        let ActiveSession {
            mut engine,
            mut session,
            mut page,
        } = *active;

        if self.policy.record_video {
            match page.video_path().await {
                Ok(path) => self.video_path = path,
                Err(e) => warn!("Failed to resolve video path: {}", e),
            }
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        if let Err(e) = engine.shutdown().await {
            warn!("Failed to shut down browser engine: {}", e);
        }

        if let Some(path) = self.video_path.clone() {
            if path.exists() {
                self.evidence.record(path, ArtifactKind::Video, None);
            } else {
                warn!("Video not found at {}", path.display());
            }
        }

        info!("{} ({}) closed after {} step(s)", ABILITY_NAME, self.browser, self.step_counter);
        Ok(())
    }

    async fn ensure_active(&mut self) -> ScreenplayResult<()> {
        match self.state {
            Session::Active(_) => Ok(()),
            Session::Closed => Err(ScreenplayError::AbilityClosed {
                ability: ABILITY_NAME,
            }),
            Session::Uninitialized => {
                let options = self.launch_options();
                if let Some(dir) = &options.record_video_dir {
                    tokio::fs::create_dir_all(dir).await?;
                }
                let active = open_session(self.driver.as_ref(), &options).await?;
                self.state = Session::Active(Box::new(active));
                Ok(())
            }
        }
    }

    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            family: self.browser,
            headless: self.config.headless,
            record_video_dir: self
                .policy
                .record_video
                .then(|| self.evidence.video_dir(self.browser)),
            default_timeout_ms: self.config.execution_timeout_ms,
        }
    }

    async fn perform(&mut self, op: WebOperation<'_>) -> ScreenplayResult<WebOutput> {
        self.ensure_active().await?;

        let instrumented = op.is_instrumented();
        let step = self.step_counter + 1;

        if instrumented && self.policy.before_step {
            self.capture_step(step, "before").await;
        }

        debug!("[web] {} {}", op.name(), op.target());
        let execution_timeout_ms = self.config.execution_timeout_ms;
        let outcome = match &mut self.state {
            Session::Active(active) => {
                dispatch(&mut *active.page, &op, execution_timeout_ms).await
            }
            _ => Err(ScreenplayError::AbilityClosed {
                ability: ABILITY_NAME,
            }),
        };

        if instrumented {
            self.step_counter = step;
            if outcome.is_ok() && self.policy.after_step {
                self.capture_step(step, "after").await;
            }
        }

        if let (WebOperation::Screenshot { path }, Ok(_)) = (&op, &outcome) {
            let tag = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(String::from);
            self.evidence
                .record(path.to_path_buf(), ArtifactKind::Screenshot, tag.as_deref());
        }

        self.last_operation = Some(op.describe(&outcome));
        outcome
    }

    async fn capture_step(&mut self, step: u32, phase: &str) {
        let tag = format!("{}_{}", EvidenceCollector::step_tag(step), phase);
        let Session::Active(active) = &mut self.state else {
            return;
        };

        let path = match self
            .evidence
            .allocate_for(ArtifactKind::Screenshot, Some(self.browser), &tag)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to prepare {} screenshot: {}", tag, e);
                return;
            }
        };

        match active.page.screenshot(&path).await {
            Ok(()) => {
                self.evidence.record(path, ArtifactKind::Screenshot, Some(&tag));
            }
            Err(e) => warn!("Failed to capture {} screenshot: {}", tag, e),
        }
    }
}

/// Start an engine, launch a session and open its page. Whatever was opened
/// before a failing step is released again.
async fn open_session(
    driver: &dyn BrowserDriver,
    options: &LaunchOptions,
) -> ScreenplayResult<ActiveSession> {
    info!(
        "Opening {} session (headless={})",
        options.family, options.headless
    );

    let mut engine = driver.start().await?;

    let mut session = match engine.launch(options).await {
        Ok(session) => session,
        Err(e) => {
            if let Err(shutdown) = engine.shutdown().await {
                warn!("Failed to shut down engine after launch failure: {}", shutdown);
            }
            return Err(e.into());
        }
    };

    let page = match session.new_page().await {
        Ok(page) => page,
        Err(e) => {
            if let Err(close) = session.close().await {
                warn!("Failed to close session after page failure: {}", close);
            }
            if let Err(shutdown) = engine.shutdown().await {
                warn!("Failed to shut down engine after page failure: {}", shutdown);
            }
            return Err(e.into());
        }
    };

    Ok(ActiveSession {
        engine,
        session,
        page,
    })
}

async fn dispatch(
    page: &mut dyn BrowserPage,
    op: &WebOperation<'_>,
    execution_timeout_ms: u64,
) -> ScreenplayResult<WebOutput> {
    let element_error = |selector: &str, e: DriverError| match e {
        DriverError::ElementNotFound(_) => ScreenplayError::ElementNotFound {
            selector: selector.to_string(),
        },
        DriverError::Timeout(_) => ScreenplayError::ElementTimeout {
            selector: selector.to_string(),
            timeout_ms: execution_timeout_ms,
        },
        other => ScreenplayError::Driver(other),
    };

    match *op {
        WebOperation::Navigate { url } => {
            page.goto(url).await?;
            Ok(WebOutput::Unit)
        }
        WebOperation::Click { selector } => {
            page.click(selector)
                .await
                .map_err(|e| element_error(selector, e))?;
            Ok(WebOutput::Unit)
        }
        WebOperation::Fill { selector, text } => {
            page.fill(selector, text)
                .await
                .map_err(|e| element_error(selector, e))?;
            Ok(WebOutput::Unit)
        }
        WebOperation::GetText { selector } => {
            match page
                .text_content(selector)
                .await
                .map_err(|e| element_error(selector, e))?
            {
                Some(text) => Ok(WebOutput::Text(text)),
                None => Err(ScreenplayError::ElementNotFound {
                    selector: selector.to_string(),
                }),
            }
        }
        WebOperation::CurrentUrl => Ok(WebOutput::Text(page.url().await?)),
        WebOperation::IsVisible { selector } => match page.is_visible(selector).await {
            Ok(visible) => Ok(WebOutput::Bool(visible)),
            Err(DriverError::ElementNotFound(_)) => Ok(WebOutput::Bool(false)),
            Err(e) => Err(e.into()),
        },
        WebOperation::WaitFor {
            selector,
            timeout_ms,
        } => {
            let timed_out = || ScreenplayError::ElementTimeout {
                selector: selector.to_string(),
                timeout_ms,
            };
            let wait = page.wait_for_selector(selector, timeout_ms);
            match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
                Ok(Ok(())) => Ok(WebOutput::Unit),
                Ok(Err(DriverError::Timeout(_))) | Ok(Err(DriverError::ElementNotFound(_))) => {
                    Err(timed_out())
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(timed_out()),
            }
        }
        WebOperation::Screenshot { path } => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            page.screenshot(path).await?;
            Ok(WebOutput::Unit)
        }
        WebOperation::PressKey { selector, key } => {
            page.press(selector, key)
                .await
                .map_err(|e| element_error(selector, e))?;
            Ok(WebOutput::Unit)
        }
    }
}

impl Drop for WebAbility {
    fn drop(&mut self) {
        if matches!(self.state, Session::Active(_)) {
            warn!(
                "{} ({}) dropped with an open session; call close() at scenario end",
                ABILITY_NAME, self.browser
            );
        }
    }
}

impl std::fmt::Debug for WebAbility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebAbility")
            .field("browser", &self.browser)
            .field("state", &self.state())
            .field("step_counter", &self.step_counter)
            .finish()
    }
}
