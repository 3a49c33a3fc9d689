//! Built-in questions for web and API scenarios

use async_trait::async_trait;
use serde_json::Value;

use crate::ability::{ApiAbility, WebAbility};
use crate::actor::Actor;
use crate::error::{ScreenplayError, ScreenplayResult};
use crate::json_case::keys_match;
use crate::question::Question;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentUrl;

#[async_trait]
impl Question for CurrentUrl {
    type Answer = String;

    fn description(&self) -> String {
        "the current url".to_string()
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<String> {
        actor.ability::<WebAbility>()?.current_url().await
    }
}

/// Text of an element; `ElementNotFound` when it does not exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOf {
    selector: String,
}

impl TextOf {
    pub fn element(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl Question for TextOf {
    type Answer = String;

    fn description(&self) -> String {
        format!("the text of {}", self.selector)
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<String> {
        actor.ability::<WebAbility>()?.get_text(&self.selector).await
    }
}

/// Whether an element is visible right now; missing elements are not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    selector: String,
}

impl Visibility {
    pub fn of(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// Visibility of a piece of text anywhere on the page
    pub fn of_text(text: &str) -> Self {
        Self::of(format!("text={}", text))
    }
}

#[async_trait]
impl Question for Visibility {
    type Answer = bool;

    fn description(&self) -> String {
        format!("whether {} is visible", self.selector)
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<bool> {
        actor.ability::<WebAbility>()?.is_visible(&self.selector).await
    }
}

/// Waits for an element, then checks it is visible. Timing out or not
/// finding it answers `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementAppears {
    selector: String,
    timeout_ms: u64,
}

impl ElementAppears {
    pub fn within(selector: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            selector: selector.into(),
            timeout_ms,
        }
    }
}

#[async_trait]
impl Question for ElementAppears {
    type Answer = bool;

    fn description(&self) -> String {
        format!("whether {} appears within {} ms", self.selector, self.timeout_ms)
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<bool> {
        let web = actor.ability::<WebAbility>()?;
        match web.wait_for(&self.selector, self.timeout_ms).await {
            Ok(()) => web.is_visible(&self.selector).await,
            Err(ScreenplayError::ElementTimeout { .. }) | Err(ScreenplayError::ElementNotFound { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// The page title, or the current URL when the title cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTitle;

#[async_trait]
impl Question for PageTitle {
    type Answer = String;

    fn description(&self) -> String {
        "the page title".to_string()
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<String> {
        let web = actor.ability::<WebAbility>()?;
        match web.get_text("title").await {
            Ok(title) if !title.trim().is_empty() => Ok(title),
            Ok(_) => web.current_url().await,
            Err(e) if e.is_recoverable() => web.current_url().await,
            Err(e) => Err(e),
        }
    }
}

/// Status code of the last API call, `None` before any response arrived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastStatusCode;

#[async_trait]
impl Question for LastStatusCode {
    type Answer = Option<u16>;

    fn description(&self) -> String {
        "the last status code".to_string()
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<Option<u16>> {
        Ok(actor.ability_ref::<ApiAbility>()?.last_status_code())
    }
}

/// The last response body as JSON, keys as received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastResponse;

#[async_trait]
impl Question for LastResponse {
    type Answer = Value;

    fn description(&self) -> String {
        "the last response".to_string()
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<Value> {
        actor.ability_ref::<ApiAbility>()?.last_response_json()
    }
}

/// Whether the last response has a property at a dot path such as
/// `data.items.0.id`. Segments match keys case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHasProperty {
    path: String,
}

impl ResponseHasProperty {
    pub fn at(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Question for ResponseHasProperty {
    type Answer = bool;

    fn description(&self) -> String {
        format!("whether the response has '{}'", self.path)
    }

    async fn answered_by(&self, actor: &mut Actor) -> ScreenplayResult<bool> {
        let body = actor.ability_ref::<ApiAbility>()?.last_response_json()?;
        Ok(lookup(&body, &self.path).is_some())
    }
}

/// Follow a dot path through objects and array indexes
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment).or_else(|| {
                map.iter()
                    .find(|(key, _)| keys_match(key, segment))
                    .map(|(_, value)| value)
            }),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
