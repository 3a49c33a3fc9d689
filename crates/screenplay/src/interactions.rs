//! Built-in tasks for web and API scenarios

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::ability::{ApiAbility, WebAbility};
use crate::actor::Actor;
use crate::error::ScreenplayResult;
use crate::task::Task;

/// Open a URL in the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigate {
    url: String,
}

impl Navigate {
    pub fn to(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Task for Navigate {
    fn description(&self) -> String {
        format!("navigate to {}", self.url)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor.ability::<WebAbility>()?.navigate(&self.url).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Click {
    selector: String,
}

impl Click {
    pub fn on(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl Task for Click {
    fn description(&self) -> String {
        format!("click {}", self.selector)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor.ability::<WebAbility>()?.click(&self.selector).await
    }
}

/// Type text into a field, replacing what was there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    selector: String,
    text: String,
}

impl Fill {
    pub fn new(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl Task for Fill {
    fn description(&self) -> String {
        format!("fill {} with '{}'", self.selector, self.text)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor
            .ability::<WebAbility>()?
            .fill(&self.selector, &self.text)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressKey {
    selector: String,
    key: String,
}

impl PressKey {
    pub fn new(selector: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl Task for PressKey {
    fn description(&self) -> String {
        format!("press {} on {}", self.key, self.selector)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor
            .ability::<WebAbility>()?
            .press_key(&self.selector, &self.key)
            .await
    }
}

/// Wait for an element; fails with `ElementTimeout` when it never shows up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitForElement {
    selector: String,
    timeout_ms: Option<u64>,
}

impl WaitForElement {
    /// Uses the configured element wait timeout
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            timeout_ms: None,
        }
    }

    pub fn within(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[async_trait]
impl Task for WaitForElement {
    fn description(&self) -> String {
        match self.timeout_ms {
            Some(ms) => format!("wait up to {} ms for {}", ms, self.selector),
            None => format!("wait for {}", self.selector),
        }
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        let web = actor.ability::<WebAbility>()?;
        match self.timeout_ms {
            Some(ms) => web.wait_for(&self.selector, ms).await,
            None => web.wait_for_default(&self.selector).await,
        }
    }
}

/// Screenshot into the evidence tree under a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeScreenshot {
    label: String,
}

impl TakeScreenshot {
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl Task for TakeScreenshot {
    fn description(&self) -> String {
        format!("take screenshot '{}'", self.label)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor.ability::<WebAbility>()?.capture(&self.label).await?;
        Ok(())
    }
}

/// One HTTP request. Query parameters are URL-encoded onto the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl SendRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

#[async_trait]
impl Task for SendRequest {
    fn description(&self) -> String {
        format!("send {} {}", self.method, self.endpoint)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor
            .ability::<ApiAbility>()?
            .send(
                self.method.clone(),
                &self.endpoint,
                &self.query,
                self.body.as_ref(),
            )
            .await?;
        Ok(())
    }
}

/// Add or replace a header on later requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetHeader {
    name: String,
    value: String,
}

impl SetHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Task for SetHeader {
    fn description(&self) -> String {
        format!("set header {}", self.name)
    }

    async fn perform_as(&self, actor: &mut Actor) -> ScreenplayResult<()> {
        actor
            .ability::<ApiAbility>()?
            .set_header(&self.name, &self.value)
    }
}
