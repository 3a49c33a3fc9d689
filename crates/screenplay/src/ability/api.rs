//! HTTP API ability
//!
//! Auth and default headers are computed once at construction; the client
//! itself is built on the first request. Every exchange, successful or not,
//! is kept as the last operation and written out as request/response logs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use screenplay_common::{ApiConfig, AuthType, EvidenceArtifact};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{LastOperation, SessionState};
use crate::error::{ScreenplayError, ScreenplayResult};
use crate::evidence::EvidenceCollector;
use crate::json_case::{self, camelize_keys};

const ABILITY_NAME: &str = "ApiAbility";

/// Ability to call one HTTP API for one scenario
pub struct ApiAbility {
    config: Arc<ApiConfig>,
    base_url: Url,
    headers: HeaderMap,
    client: Option<Client>,
    closed: bool,
    last_operation: Option<LastOperation>,
    exchange_counter: u32,
    evidence: EvidenceCollector,
}

impl ApiAbility {
    pub fn new(config: Arc<ApiConfig>, scenario: &str) -> ScreenplayResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ScreenplayError::InvalidEndpoint(format!("base url {}: {}", config.base_url, e))
        })?;
        let headers = build_headers(&config)?;
        let evidence = EvidenceCollector::new(config.evidence_base_path.clone(), scenario);

        Ok(Self {
            config,
            base_url,
            headers,
            client: None,
            closed: false,
            last_operation: None,
            exchange_counter: 0,
            evidence,
        })
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.client.is_some() {
            SessionState::Active
        } else {
            SessionState::Uninitialized
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Headers sent with every request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn last_operation(&self) -> Option<&LastOperation> {
        self.last_operation.as_ref()
    }

    pub fn last_status_code(&self) -> Option<u16> {
        self.last_operation.as_ref().and_then(|op| op.status)
    }

    pub fn last_url(&self) -> Option<&str> {
        self.last_operation.as_ref().map(|op| op.target.as_str())
    }

    pub fn last_method(&self) -> Option<&str> {
        self.last_operation.as_ref().map(|op| op.method.as_str())
    }

    /// Serialized request body; `None` for GET and DELETE
    pub fn last_request_body(&self) -> Option<&str> {
        self.last_operation
            .as_ref()
            .and_then(|op| op.payload.as_deref())
    }

    pub fn last_response_body(&self) -> Option<&str> {
        self.last_operation
            .as_ref()
            .and_then(|op| op.raw_response.as_deref())
    }

    /// Last response body decoded as JSON, keys as received
    pub fn last_response_json(&self) -> ScreenplayResult<Value> {
        decode(self.last_response_body().unwrap_or_default())
    }

    pub fn evidence(&self) -> &[EvidenceArtifact] {
        self.evidence.artifacts()
    }

    /// Add or replace a header for subsequent requests
    pub fn set_header(&mut self, name: &str, value: &str) -> ScreenplayResult<()> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&mut self, endpoint: &str) -> ScreenplayResult<T> {
        let url = self.resolve(endpoint)?;
        let raw = self.exchange(Method::GET, url, None).await?;
        decode(&raw)
    }

    pub async fn post<Req, Resp>(&mut self, endpoint: &str, body: &Req) -> ScreenplayResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.resolve(endpoint)?;
        let raw = self.exchange(Method::POST, url, Some(encode(body)?)).await?;
        decode(&raw)
    }

    pub async fn put<Req, Resp>(&mut self, endpoint: &str, body: &Req) -> ScreenplayResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.resolve(endpoint)?;
        let raw = self.exchange(Method::PUT, url, Some(encode(body)?)).await?;
        decode(&raw)
    }

    pub async fn delete(&mut self, endpoint: &str) -> ScreenplayResult<()> {
        let url = self.resolve(endpoint)?;
        self.exchange(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Any method, with query parameters appended to the resolved URL.
    /// Returns the decoded response, `Null` for an empty body.
    pub async fn send(
        &mut self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> ScreenplayResult<Value> {
        let mut url = self.resolve(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        let body = body.map(encode).transpose()?;
        let raw = self.exchange(method, url, body).await?;
        decode(&raw)
    }

    /// Relative endpoints resolve against the base URL; absolute ones are kept
    pub fn resolve(&self, endpoint: &str) -> ScreenplayResult<Url> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ScreenplayError::InvalidEndpoint(
                "endpoint is empty".to_string(),
            ));
        }
        if let Ok(url) = Url::parse(endpoint) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(url);
            }
        }
        self.base_url
            .join(endpoint)
            .map_err(|e| ScreenplayError::InvalidEndpoint(format!("{}: {}", endpoint, e)))
    }

    /// Error detail file under `errors/`, written only once a request was made
    pub async fn capture_failure(&mut self, error: &str) -> Option<PathBuf> {
        let last = self.last_operation.as_ref()?;
        match self.evidence.record_failure_detail(None, error, Some(last)).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to write failure detail: {}", e);
                None
            }
        }
    }

    /// Drop the client. Later requests fail with `AbilityClosed`.
    pub async fn close(&mut self) -> ScreenplayResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.client.take().is_some() {
            info!("{} closed after {} request(s)", ABILITY_NAME, self.exchange_counter);
        }
        self.closed = true;
        Ok(())
    }

    fn client(&mut self) -> ScreenplayResult<Client> {
        if self.closed {
            return Err(ScreenplayError::AbilityClosed {
                ability: ABILITY_NAME,
            });
        }
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .build()?;
        debug!("Built HTTP client for {}", self.base_url);
        self.client = Some(client.clone());
        Ok(client)
    }

    async fn exchange(&mut self, method: Method, url: Url, body: Option<String>) -> ScreenplayResult<String> {
        let client = self.client()?;
        self.exchange_counter += 1;
        debug!("[api] {} {}", method, url);

        let mut record = LastOperation {
            method: method.as_str().to_string(),
            target: url.to_string(),
            payload: body.clone(),
            ..Default::default()
        };

        let mut request = client.request(method.clone(), url.clone()).headers(self.headers.clone());
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let outcome = match request.send().await {
            Ok(response) => {
                let status = response.status();
                record.status = Some(status.as_u16());
                match response.text().await {
                    Ok(text) => {
                        record.raw_response = Some(text.clone());
                        if status.is_success() {
                            record.result = Some("ok".to_string());
                            Ok(text)
                        } else {
                            let err = ScreenplayError::HttpRequestFailed {
                                status_code: status.as_u16(),
                                url: url.to_string(),
                                method: method.to_string(),
                            };
                            record.result = Some(err.to_string());
                            Err(err)
                        }
                    }
                    Err(e) => {
                        record.result = Some(e.to_string());
                        Err(ScreenplayError::Http(e))
                    }
                }
            }
            Err(e) => {
                record.result = Some(e.to_string());
                Err(ScreenplayError::Http(e))
            }
        };

        let tag = format!("request_{:02}", self.exchange_counter);
        if let Err(e) = self.evidence.record_exchange(&tag, &record).await {
            warn!("Failed to write API evidence for {}: {}", tag, e);
        }
        self.last_operation = Some(record);
        outcome
    }
}

impl std::fmt::Debug for ApiAbility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAbility")
            .field("base_url", &self.base_url.as_str())
            .field("state", &self.state())
            .field("exchanges", &self.exchange_counter)
            .finish()
    }
}

/// Authorization from config, then default headers on top. A default header
/// only replaces auth when it is itself named `Authorization`.
fn build_headers(config: &ApiConfig) -> ScreenplayResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    match config.auth_type {
        AuthType::None => {}
        AuthType::Bearer => match non_blank(&config.bearer_token) {
            Some(token) => {
                let (_, value) = header_pair(AUTHORIZATION.as_str(), &format!("Bearer {}", token))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!("Bearer auth configured without a token; sending no Authorization"),
        },
        AuthType::Basic => match (non_blank(&config.basic_user), non_blank(&config.basic_password)) {
            (Some(user), Some(password)) => {
                let token = BASE64.encode(format!("{}:{}", user, password));
                let (_, value) = header_pair(AUTHORIZATION.as_str(), &format!("Basic {}", token))?;
                headers.insert(AUTHORIZATION, value);
            }
            _ => warn!("Basic auth configured without user and password; sending no Authorization"),
        },
    }

    for (name, value) in &config.default_headers {
        let (name, value) = header_pair(name, value)?;
        if name == AUTHORIZATION && headers.contains_key(AUTHORIZATION) {
            debug!("Default Authorization header replaces configured auth");
        }
        headers.insert(name, value);
    }

    Ok(headers)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn header_pair(name: &str, value: &str) -> ScreenplayResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| ScreenplayError::InvalidHeader(format!("{}: {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| ScreenplayError::InvalidHeader(format!("{}: {}", name, e)))?;
    Ok((header_name, header_value))
}

/// Serialize with camelCase keys
fn encode<T: Serialize + ?Sized>(body: &T) -> ScreenplayResult<String> {
    let value = camelize_keys(serde_json::to_value(body)?);
    Ok(serde_json::to_string(&value)?)
}

/// Decode with case-insensitive field matching. An empty body decodes from `null`.
fn decode<T: DeserializeOwned>(raw: &str) -> ScreenplayResult<T> {
    let value = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(raw)?
    };
    Ok(json_case::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ability(config: ApiConfig) -> ApiAbility {
        ApiAbility::new(Arc::new(config), "unit").unwrap()
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let api = ability(ApiConfig {
            base_url: "https://api.example.com".to_string(),
            ..Default::default()
        });
        assert_eq!(
            api.resolve("/users").unwrap().as_str(),
            "https://api.example.com/users"
        );
        assert_eq!(
            api.resolve("users/7").unwrap().as_str(),
            "https://api.example.com/users/7"
        );
        assert_eq!(
            api.resolve("https://other.example.com/x").unwrap().as_str(),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_resolve_rejects_empty() {
        let api = ability(ApiConfig::default());
        assert!(matches!(
            api.resolve("  "),
            Err(ScreenplayError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ApiAbility::new(Arc::new(config), "unit"),
            Err(ScreenplayError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_bearer_header() {
        let api = ability(ApiConfig {
            auth_type: AuthType::Bearer,
            bearer_token: Some("T".to_string()),
            ..Default::default()
        });
        assert_eq!(api.headers()[AUTHORIZATION], "Bearer T");
    }

    #[test]
    fn test_basic_header() {
        let api = ability(ApiConfig {
            auth_type: AuthType::Basic,
            basic_user: Some("u".to_string()),
            basic_password: Some("p".to_string()),
            ..Default::default()
        });
        assert_eq!(api.headers()[AUTHORIZATION], "Basic dTpw");
    }

    #[test]
    fn test_auth_without_credentials_sends_nothing() {
        let api = ability(ApiConfig {
            auth_type: AuthType::Bearer,
            bearer_token: Some("  ".to_string()),
            ..Default::default()
        });
        assert!(!api.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_default_headers_extend_auth() {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("X-Trace".to_string(), "on".to_string());
        let api = ability(ApiConfig {
            auth_type: AuthType::Bearer,
            bearer_token: Some("T".to_string()),
            default_headers,
            ..Default::default()
        });
        assert_eq!(api.headers()[AUTHORIZATION], "Bearer T");
        assert_eq!(api.headers()["x-trace"], "on");
    }

    #[test]
    fn test_explicit_authorization_default_header_wins() {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Authorization".to_string(), "Token abc".to_string());
        let api = ability(ApiConfig {
            auth_type: AuthType::Bearer,
            bearer_token: Some("T".to_string()),
            default_headers,
            ..Default::default()
        });
        assert_eq!(api.headers()[AUTHORIZATION], "Token abc");
    }

    #[test]
    fn test_set_header_replaces() {
        let mut api = ability(ApiConfig::default());
        api.set_header("X-Env", "a").unwrap();
        api.set_header("x-env", "b").unwrap();
        assert_eq!(api.headers().get_all("x-env").iter().count(), 1);
        assert_eq!(api.headers()["x-env"], "b");
        assert!(matches!(
            api.set_header("bad header", "x"),
            Err(ScreenplayError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_encode_camel_cases_keys() {
        #[derive(Serialize)]
        struct NewUser {
            first_name: String,
        }
        let body = encode(&NewUser {
            first_name: "Ana".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"firstName":"Ana"}"#);
    }

    #[test]
    fn test_decode_matches_case_insensitively() {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Item {
            id: u64,
            display_name: String,
        }
        let item: Item = decode(r#"{"Id":1,"DisplayName":"a"}"#).unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.display_name, "a");

        let shouted: Item = decode(r#"{"ID":2,"DISPLAYNAME":"b"}"#).unwrap();
        assert_eq!(shouted.id, 2);
        assert_eq!(shouted.display_name, "b");

        let empty: Option<Item> = decode("").unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn test_decode_keeps_raw_keys() {
        let value: Value = decode(r#"{"headers":{"X-Request-Id":"abc"},"Id":1,"id":2}"#).unwrap();
        assert_eq!(value["headers"]["X-Request-Id"], "abc");
        assert_eq!(value["Id"], 1);
        assert_eq!(value["id"], 2);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let mut api = ability(ApiConfig::default());
        assert_eq!(api.state(), SessionState::Uninitialized);
        api.close().await.unwrap();
        api.close().await.unwrap();
        assert_eq!(api.state(), SessionState::Closed);

        let err = api.delete("/items/1").await.unwrap_err();
        assert!(matches!(err, ScreenplayError::AbilityClosed { .. }));
        assert!(api.last_operation().is_none());
    }
}
