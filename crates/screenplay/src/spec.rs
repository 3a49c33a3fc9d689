//! Declarative YAML scenarios
//!
//! Every step is a `Task`, so a spec runs through the actor exactly like
//! hand-written tasks do.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Method;
use screenplay_common::{BrowserFamily, TagFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ability::{ApiAbility, WebAbility};
use crate::actor::Actor;
use crate::error::{ScreenplayError, ScreenplayResult};
use crate::interactions::{Click, Fill, Navigate, PressKey, SetHeader, TakeScreenshot, WaitForElement};
use crate::probes::{lookup, CurrentUrl, ElementAppears, LastStatusCode, Visibility};
use crate::scenario::ScenarioInfo;
use crate::task::Task;

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Browsers to run on; empty uses the configured matrix
    #[serde(default)]
    pub browsers: Vec<BrowserFamily>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL
    Navigate { url: String },

    /// Click an element
    Click { selector: String },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Press a key on an element
    Press { selector: String, key: String },

    /// Wait for an element to appear
    Wait {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Take a screenshot into the evidence tree
    Screenshot { name: String },

    /// Assert an element is (or is not) visible
    ExpectVisible {
        selector: String,
        #[serde(default = "default_true")]
        visible: bool,
        /// Wait this long for the element before deciding
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert on an element's text
    ExpectText {
        selector: String,
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Assert on the current URL
    ExpectUrl {
        #[serde(default)]
        equals: Option<String>,
        #[serde(default)]
        contains: Option<String>,
    },

    /// Add or replace a request header
    SetHeader { name: String, value: String },

    /// Send an HTTP request
    Request {
        #[serde(default = "default_method")]
        method: String,
        endpoint: String,
        #[serde(default)]
        query: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<Value>,
        /// Accept this status even when it is not 2xx
        #[serde(default)]
        expect_status: Option<u16>,
    },

    /// Assert the last response status
    ExpectStatus { status: u16 },

    /// Assert the last response has a property, optionally with a value
    ExpectProperty {
        path: String,
        #[serde(default)]
        equals: Option<Value>,
    },
}

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "GET".to_string()
}

impl TestStep {
    /// Steps that need a browser
    pub fn uses_web(&self) -> bool {
        matches!(
            self,
            TestStep::Navigate { .. }
                | TestStep::Click { .. }
                | TestStep::Fill { .. }
                | TestStep::Press { .. }
                | TestStep::Wait { .. }
                | TestStep::Screenshot { .. }
                | TestStep::ExpectVisible { .. }
                | TestStep::ExpectText { .. }
                | TestStep::ExpectUrl { .. }
        )
    }

    pub fn uses_api(&self) -> bool {
        !self.uses_web()
    }
}

fn check_text(what: &str, actual: &str, equals: &Option<String>, contains: &Option<String>) -> ScreenplayResult<()> {
    if let Some(expected) = equals {
        if actual.trim() != expected.trim() {
            return Err(ScreenplayError::AssertionFailed(format!(
                "{}: expected '{}', got '{}'",
                what, expected, actual
            )));
        }
    }
    if let Some(fragment) = contains {
        if !actual.contains(fragment.as_str()) {
            return Err(ScreenplayError::AssertionFailed(format!(
                "{}: expected to contain '{}', got '{}'",
                what, fragment, actual
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Task for TestStep {
    fn description(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate to {}", url),
            TestStep::Click { selector } => format!("click {}", selector),
            TestStep::Fill { selector, .. } => format!("fill {}", selector),
            TestStep::Press { selector, key } => format!("press {} on {}", key, selector),
            TestStep::Wait { selector, .. } => format!("wait for {}", selector),
            TestStep::Screenshot { name } => format!("screenshot {}", name),
            TestStep::ExpectVisible { selector, visible, .. } => {
                format!("expect {} visible={}", selector, visible)
            }
            TestStep::ExpectText { selector, .. } => format!("expect text of {}", selector),
            TestStep::ExpectUrl { .. } => "expect url".to_string(),
            TestStep::SetHeader { name, .. } => format!("set header {}", name),
            TestStep::Request {
                method, endpoint, ..
            } => format!("{} {}", method.to_uppercase(), endpoint),
            TestStep::ExpectStatus { status } => format!("expect status {}", status),
            TestStep::ExpectProperty { path, .. } => format!("expect property {}", path),
        }
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        match self {
            TestStep::Navigate { url } => actor.execute(&Navigate::to(url.as_str())).await,
            TestStep::Click { selector } => actor.execute(&Click::on(selector.as_str())).await,
            TestStep::Fill { selector, value } => {
                actor
                    .execute(&Fill::new(selector.as_str(), value.as_str()))
                    .await
            }
            TestStep::Press { selector, key } => {
                actor
                    .execute(&PressKey::new(selector.as_str(), key.as_str()))
                    .await
            }
            TestStep::Wait {
                selector,
                timeout_ms,
            } => {
                let wait = WaitForElement::new(selector.as_str());
                let wait = match timeout_ms {
                    Some(ms) => wait.within(*ms),
                    None => wait,
                };
                actor.execute(&wait).await
            }
            TestStep::Screenshot { name } => {
                actor.execute(&TakeScreenshot::named(name.as_str())).await
            }
            TestStep::ExpectVisible {
                selector,
                visible,
                timeout_ms,
            } => {
                let actual = match timeout_ms {
                    Some(ms) if *visible => {
                        actor
                            .answer(&ElementAppears::within(selector.as_str(), *ms))
                            .await?
                    }
                    _ => actor.answer(&Visibility::of(selector.as_str())).await?,
                };
                if actual != *visible {
                    return Err(ScreenplayError::AssertionFailed(format!(
                        "{}: expected visible={}, got {}",
                        selector, visible, actual
                    )));
                }
                Ok(())
            }
            TestStep::ExpectText {
                selector,
                equals,
                contains,
            } => {
                let text = actor.ability::<WebAbility>()?.get_text(selector).await?;
                check_text(selector, &text, equals, contains)
            }
            TestStep::ExpectUrl { equals, contains } => {
                let url = actor.answer(&CurrentUrl).await?;
                check_text("url", &url, equals, contains)
            }
            TestStep::SetHeader { name, value } => {
                actor
                    .execute(&SetHeader::new(name.as_str(), value.as_str()))
                    .await
            }
            TestStep::Request {
                method,
                endpoint,
                query,
                body,
                expect_status,
            } => {
                let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
                    .map_err(|_| ScreenplayError::SpecParse(format!("unknown HTTP method: {}", method)))?;
                let query: Vec<(String, String)> =
                    query.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

                let api = actor.ability::<ApiAbility>()?;
                match api.send(method, endpoint, &query, body.as_ref()).await {
                    Ok(_) => {}
                    Err(ScreenplayError::HttpRequestFailed { status_code, .. })
                        if Some(status_code) == *expect_status => {}
                    Err(e) => return Err(e),
                }
                if let Some(expected) = expect_status {
                    let actual = api.last_status_code();
                    if actual != Some(*expected) {
                        return Err(ScreenplayError::AssertionFailed(format!(
                            "expected status {}, got {:?}",
                            expected, actual
                        )));
                    }
                }
                Ok(())
            }
            TestStep::ExpectStatus { status } => {
                let actual = actor.answer(&LastStatusCode).await?;
                if actual != Some(*status) {
                    return Err(ScreenplayError::AssertionFailed(format!(
                        "expected status {}, got {:?}",
                        status, actual
                    )));
                }
                Ok(())
            }
            TestStep::ExpectProperty { path, equals } => {
                let body = actor.ability_ref::<ApiAbility>()?.last_response_json()?;
                match (lookup(&body, path), equals) {
                    (None, _) => Err(ScreenplayError::AssertionFailed(format!(
                        "response has no property '{}'",
                        path
                    ))),
                    (Some(actual), Some(expected)) if actual != expected => {
                        Err(ScreenplayError::AssertionFailed(format!(
                            "property '{}': expected {}, got {}",
                            path, expected, actual
                        )))
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

#[async_trait]
impl Task for TestSpec {
    fn description(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, self.description)
        }
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        for step in &self.steps {
            actor.execute(step).await?;
        }
        Ok(())
    }
}

impl TestSpec {
    /// Parse a spec from a YAML string
    pub fn from_yaml(yaml: &str) -> ScreenplayResult<Self> {
        serde_yaml::from_str(yaml).map_err(ScreenplayError::from)
    }

    /// Parse a spec from a YAML file
    pub fn from_file(path: &Path) -> ScreenplayResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| ScreenplayError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all specs under a directory, in path order
    pub fn load_all(dir: &Path) -> ScreenplayResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Specs the filter admits
    pub fn filter_by_tags<'a>(specs: &'a [Self], filter: &TagFilter) -> Vec<&'a Self> {
        specs.iter().filter(|s| filter.admits(&s.tags)).collect()
    }

    pub fn uses_web(&self) -> bool {
        self.steps.iter().any(TestStep::uses_web)
    }

    pub fn uses_api(&self) -> bool {
        self.steps.iter().any(TestStep::uses_api)
    }

    pub fn scenario_info(&self) -> ScenarioInfo {
        ScenarioInfo::new(self.name.clone()).with_tags(self.tags.iter().cloned())
    }
}
