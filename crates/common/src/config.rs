//! Harness configuration
//!
//! Configuration is read once from an optional TOML file, then overridden from
//! the environment, then frozen. Nothing here is global: callers hand the
//! resulting snapshots to whoever builds actors and abilities.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{BrowserFamily, TagFilter};

/// Variable consulted to pick one entry of the browser matrix
pub const CURRENT_BROWSER_VAR: &str = "CURRENT_BROWSER";

/// Source of environment overrides
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for std::collections::HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Top-level configuration file with `[web]` and `[api]` tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub web: WebConfig,
    pub api: ApiConfig,
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from file and apply environment overrides on top
    pub fn resolve(path: Option<&Path>, env: &impl EnvSource) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Reject values no scenario could run with
    pub fn validate(&self) -> Result<()> {
        if self.web.execution_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "web.execution_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.web.element_wait_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "web.element_wait_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.api.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "api.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("api.base_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply_env(&mut self, env: &impl EnvSource) {
        self.web.apply_env(env);
        self.api.apply_env(env);
    }
}

/// Web UI automation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Default timeout handed to the browser for navigation and actions
    pub execution_timeout_ms: u64,

    /// Default timeout when waiting for an element
    pub element_wait_timeout_ms: u64,

    pub browser: BrowserFamily,

    pub headless: bool,

    /// Browsers for matrix runs; empty means just `browser`
    pub browsers: Vec<BrowserFamily>,

    pub record_video: bool,

    pub screenshots_before_step: bool,

    pub screenshots_after_step: bool,

    pub screenshots_on_failure: bool,

    pub evidence_base_path: PathBuf,

    /// List captured evidence in scenario reports
    pub generate_report: bool,

    /// Tags to run; empty runs everything
    pub tags: Vec<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            execution_timeout_ms: 30_000,
            element_wait_timeout_ms: 10_000,
            browser: BrowserFamily::Chromium,
            headless: false,
            browsers: Vec::new(),
            record_video: false,
            screenshots_before_step: false,
            screenshots_after_step: false,
            screenshots_on_failure: true,
            evidence_base_path: PathBuf::from("TestResults/Evidence"),
            generate_report: true,
            tags: Vec::new(),
        }
    }
}

impl WebConfig {
    pub fn apply_env(&mut self, env: &impl EnvSource) {
        if let Some(browser) = env_string(env, "BROWSER") {
            self.browser = BrowserFamily::from_name(&browser);
        }
        if let Some(browsers) = env_list(env, "BROWSERS") {
            self.browsers = browsers.iter().map(|b| BrowserFamily::from_name(b)).collect();
        }
        override_parsed(env, "HEADLESS", &mut self.headless);
        override_parsed(env, "EXECUTION_TIMEOUT_MS", &mut self.execution_timeout_ms);
        override_parsed(env, "ELEMENT_WAIT_TIMEOUT_MS", &mut self.element_wait_timeout_ms);
        override_parsed(env, "RECORD_VIDEO", &mut self.record_video);
        override_parsed(env, "SCREENSHOTS_BEFORE_STEP", &mut self.screenshots_before_step);
        override_parsed(env, "SCREENSHOTS_AFTER_STEP", &mut self.screenshots_after_step);
        override_parsed(env, "SCREENSHOTS_ON_FAILURE", &mut self.screenshots_on_failure);
        override_parsed(env, "GENERATE_REPORT", &mut self.generate_report);
        if let Some(path) = env_string(env, "EVIDENCE_BASE_PATH") {
            self.evidence_base_path = PathBuf::from(path);
        }
        if let Some(tags) = env_list(env, "TEST_TAGS") {
            self.tags = tags;
        }
    }

    /// Browser families a matrix run covers, one scenario run per family
    pub fn browser_matrix(&self) -> Vec<BrowserFamily> {
        if self.browsers.is_empty() {
            vec![self.browser]
        } else {
            let mut matrix = Vec::new();
            for family in &self.browsers {
                if !matrix.contains(family) {
                    matrix.push(*family);
                }
            }
            matrix
        }
    }

    /// Browser for a single-family run: `CURRENT_BROWSER` when it names a
    /// matrix entry, otherwise the first entry.
    pub fn current_browser(&self, env: &impl EnvSource) -> BrowserFamily {
        let matrix = self.browser_matrix();
        if let Some(name) = env_string(env, CURRENT_BROWSER_VAR) {
            let requested = BrowserFamily::from_name(&name);
            if matrix.contains(&requested) {
                return requested;
            }
        }
        matrix.first().copied().unwrap_or(self.browser)
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(&self.tags)
    }
}

/// Authentication applied to every API request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    Basic,
}

impl AuthType {
    /// Unrecognized names mean no authentication
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "bearer" => AuthType::Bearer,
            "basic" => AuthType::Basic,
            _ => AuthType::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::Bearer => "bearer",
            AuthType::Basic => "basic",
        }
    }
}

impl From<String> for AuthType {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<AuthType> for String {
    fn from(auth: AuthType) -> Self {
        auth.as_str().to_string()
    }
}

/// HTTP API testing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,

    pub timeout_ms: u64,

    pub auth_type: AuthType,

    pub bearer_token: Option<String>,

    pub basic_user: Option<String>,

    pub basic_password: Option<String>,

    /// Headers sent with every request, applied after authentication
    pub default_headers: BTreeMap<String, String>,

    pub generate_report: bool,

    pub tags: Vec<String>,

    pub evidence_base_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://httpbin.org".to_string(),
            timeout_ms: 15_000,
            auth_type: AuthType::None,
            bearer_token: None,
            basic_user: None,
            basic_password: None,
            default_headers: BTreeMap::new(),
            generate_report: true,
            tags: Vec::new(),
            evidence_base_path: PathBuf::from("TestResults/Evidence"),
        }
    }
}

impl ApiConfig {
    pub fn apply_env(&mut self, env: &impl EnvSource) {
        if let Some(base_url) = env_string(env, "API_BASE_URL") {
            self.base_url = base_url;
        }
        override_parsed(env, "API_TIMEOUT_MS", &mut self.timeout_ms);
        if let Some(auth) = env_string(env, "API_AUTH_TYPE") {
            self.auth_type = AuthType::from_name(&auth);
        }
        if let Some(token) = env_string(env, "API_BEARER_TOKEN") {
            self.bearer_token = Some(token);
        }
        if let Some(user) = env_string(env, "API_BASIC_USER") {
            self.basic_user = Some(user);
        }
        if let Some(password) = env_string(env, "API_BASIC_PASSWORD") {
            self.basic_password = Some(password);
        }
        override_parsed(env, "GENERATE_REPORT", &mut self.generate_report);
        if let Some(path) = env_string(env, "EVIDENCE_BASE_PATH") {
            self.evidence_base_path = PathBuf::from(path);
        }
        if let Some(tags) = env_list(env, "TEST_TAGS") {
            self.tags = tags;
        }
        if let Some(raw) = env_string(env, "API_DEFAULT_HEADERS") {
            let headers = parse_header_list(&raw);
            if !headers.is_empty() {
                self.default_headers = headers;
            }
        }
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(&self.tags)
    }
}

/// Parse `Name: value; Other: value` pairs. Malformed pairs are dropped.
pub fn parse_header_list(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn env_string(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Comma list, de-duplicated case-insensitively, keeping first spelling
fn env_list(env: &impl EnvSource, key: &str) -> Option<Vec<String>> {
    let raw = env_string(env, key)?;
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            items.push(item.to_string());
        }
    }
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn override_parsed<T: std::str::FromStr>(env: &impl EnvSource, key: &str, target: &mut T) {
    if let Some(parsed) = env_string(env, key).and_then(|v| v.to_ascii_lowercase().parse().ok()) {
        *target = parsed;
    }
}
