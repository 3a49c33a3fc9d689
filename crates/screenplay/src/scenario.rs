//! Scenario lifecycle
//!
//! `ScenarioHarness::run` is the before/after hook pair around one scenario:
//! decide on tags, build a fresh actor, run the body, capture failure
//! evidence, close every ability. Teardown happens whatever the body did,
//! including panicking.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use screenplay_common::{
    ApiConfig, ArtifactKind, BrowserFamily, EnvSource, EvidenceArtifact, WebConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::ability::{ApiAbility, WebAbility};
use crate::actor::Actor;
use crate::capability::{Capability, CapabilityRegistry};
use crate::driver::BrowserDriver;
use crate::error::{ScreenplayError, ScreenplayResult};

/// What the harness needs to know about a scenario before running it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tags inherited from the enclosing feature
    #[serde(default)]
    pub feature_tags: Vec<String>,
}

impl ScenarioInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_feature_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Scenario and feature tags together
    pub fn all_tags(&self) -> Vec<&str> {
        self.tags
            .iter()
            .chain(self.feature_tags.iter())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

/// Result of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub title: String,
    pub browser: Option<BrowserFamily>,
    #[serde(flatten)]
    pub outcome: ScenarioOutcome,
    pub duration_ms: u64,
    #[serde(default)]
    pub evidence: Vec<EvidenceArtifact>,
}

impl ScenarioReport {
    pub fn is_passed(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Skipped { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ScenarioOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Builds one actor per scenario from frozen configuration and guarantees
/// its teardown
#[derive(Clone)]
pub struct ScenarioHarness {
    web: Arc<WebConfig>,
    api: Arc<ApiConfig>,
    driver: Arc<dyn BrowserDriver>,
    browser: BrowserFamily,
    actor_name: String,
    capabilities: Vec<Capability>,
}

impl ScenarioHarness {
    /// Both abilities are granted by default, and the browser is the first
    /// matrix entry.
    pub fn new(web: Arc<WebConfig>, api: Arc<ApiConfig>, driver: Arc<dyn BrowserDriver>) -> Self {
        let browser = web
            .browser_matrix()
            .first()
            .copied()
            .unwrap_or(web.browser);
        Self {
            web,
            api,
            driver,
            browser,
            actor_name: "Tester".to_string(),
            capabilities: vec![Capability::Web, Capability::Api],
        }
    }

    pub fn with_browser(mut self, browser: BrowserFamily) -> Self {
        self.browser = browser;
        self
    }

    /// Browser picked by `CURRENT_BROWSER` in `env` when it names a matrix
    /// entry
    pub fn with_env(mut self, env: &impl EnvSource) -> Self {
        self.browser = self.web.current_browser(env);
        self
    }

    pub fn with_actor_name(mut self, name: impl Into<String>) -> Self {
        self.actor_name = name.into();
        self
    }

    /// Grant only these abilities
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    pub fn browser(&self) -> BrowserFamily {
        self.browser
    }

    pub fn web_config(&self) -> &WebConfig {
        &self.web
    }

    pub fn api_config(&self) -> &ApiConfig {
        &self.api
    }

    /// Tag decision. Each configured filter must admit the scenario; an
    /// empty filter admits everything.
    pub fn admits(&self, info: &ScenarioInfo) -> bool {
        let tags = info.all_tags();
        self.web.tag_filter().admits(&tags) && self.api.tag_filter().admits(&tags)
    }

    /// Fresh registry and actor; nothing is launched here
    pub fn build_actor(&self, info: &ScenarioInfo) -> ScreenplayResult<Actor> {
        let mut registry = CapabilityRegistry::new();
        for capability in &self.capabilities {
            match capability {
                Capability::Web => {
                    registry.register(WebAbility::new(
                        self.web.clone(),
                        self.browser,
                        self.driver.clone(),
                        &info.title,
                    ));
                }
                Capability::Api => {
                    registry.register(ApiAbility::new(self.api.clone(), &info.title)?);
                }
            }
        }
        Actor::new(self.actor_name.clone(), registry)
    }

    pub async fn run<F>(&self, info: &ScenarioInfo, body: F) -> ScenarioReport
    where
        F: for<'a> FnOnce(&'a mut Actor) -> BoxFuture<'a, ScreenplayResult<()>>,
    {
        let start = Instant::now();
        let browser = self
            .capabilities
            .contains(&Capability::Web)
            .then_some(self.browser);

        if !self.admits(info) {
            info!("Skipping '{}': tags {:?} not selected", info.title, info.all_tags());
            return ScenarioReport {
                title: info.title.clone(),
                browser,
                outcome: ScenarioOutcome::Skipped {
                    reason: "tag filter".to_string(),
                },
                duration_ms: 0,
                evidence: Vec::new(),
            };
        }

        info!("=== Scenario: {} ===", info.title);

        let mut actor = match self.build_actor(info) {
            Ok(actor) => actor,
            Err(e) => {
                error!("✗ {} - setup failed: {}", info.title, e);
                return ScenarioReport {
                    title: info.title.clone(),
                    browser,
                    outcome: ScenarioOutcome::Failed {
                        error: e.to_string(),
                    },
                    duration_ms: start.elapsed().as_millis() as u64,
                    evidence: Vec::new(),
                };
            }
        };

        let actor_ref = &mut actor;
        let scenario = futures::future::lazy(move |_| body(actor_ref)).flatten();
        let result = match AssertUnwindSafe(scenario).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ScreenplayError::StepPanicked(panic_message(panic.as_ref()))),
        };

        if let Err(e) = &result {
            capture_failure(&mut actor, e).await;
        }

        actor.dismiss().await;

        let evidence = self.reportable(actor.evidence());
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok(()) => {
                info!("✓ {} ({} ms)", info.title, duration_ms);
                ScenarioOutcome::Passed
            }
            Err(e) => {
                error!("✗ {} - {}", info.title, e);
                ScenarioOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        ScenarioReport {
            title: info.title.clone(),
            browser,
            outcome,
            duration_ms,
            evidence,
        }
    }

    /// Web and API evidence are listed according to their own report switch
    fn reportable(&self, evidence: Vec<EvidenceArtifact>) -> Vec<EvidenceArtifact> {
        evidence
            .into_iter()
            .filter(|artifact| match artifact.kind {
                ArtifactKind::RequestLog | ArtifactKind::ResponseLog => self.api.generate_report,
                _ => self.web.generate_report,
            })
            .collect()
    }
}

async fn capture_failure(actor: &mut Actor, error: &ScreenplayError) {
    let message = error.to_string();
    let mut captured = Vec::new();

    if let Ok(web) = actor.ability::<WebAbility>() {
        captured.extend(web.capture_failure(&message).await);
    }
    if let Ok(api) = actor.ability::<ApiAbility>() {
        captured.extend(api.capture_failure(&message).await);
    }

    if captured.is_empty() {
        warn!("No failure evidence captured for: {}", message);
    } else {
        for path in &captured {
            info!("Failure evidence saved to {}", path.display());
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tags_include_feature() {
        let info = ScenarioInfo::new("search")
            .with_tags(["@smoke"])
            .with_feature_tags(["@web"]);
        assert_eq!(info.all_tags(), vec!["@smoke", "@web"]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_outcome_serialization() {
        let report = ScenarioReport {
            title: "t".to_string(),
            browser: Some(BrowserFamily::Firefox),
            outcome: ScenarioOutcome::Failed {
                error: "boom".to_string(),
            },
            duration_ms: 5,
            evidence: Vec::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["browser"], "firefox");
        assert!(report.is_failed());
        assert_eq!(report.error(), Some("boom"));
    }
}
