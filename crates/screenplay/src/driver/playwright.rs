//! Playwright browser automation
//!
//! A Node.js child process runs `bridge.js` and executes Playwright calls on
//! our behalf. Requests and responses are line-delimited JSON over
//! stdin/stdout, matched by id. One bridge process backs one engine, so every
//! scenario gets its own process and nothing is shared between scenarios.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use super::{BrowserDriver, BrowserEngine, BrowserPage, BrowserSession, DriverError, LaunchOptions};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Configuration for the Playwright bridge
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Node.js executable
    pub node_path: PathBuf,
    /// Directory the bridge script is written to; must resolve the `playwright` package
    pub work_dir: Option<PathBuf>,
    /// Upper bound on any single bridge call, on top of Playwright's own timeouts
    pub response_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_path: PathBuf::from("node"),
            work_dir: None,
            response_timeout_ms: 120_000,
        }
    }
}

/// Starts one Playwright bridge process per engine
#[derive(Debug, Clone, Default)]
pub struct PlaywrightDriver {
    config: PlaywrightConfig,
}

impl PlaywrightDriver {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn start(&self) -> Result<Box<dyn BrowserEngine>, DriverError> {
        let bridge = Bridge::spawn(&self.config).await?;
        Ok(Box::new(PlaywrightEngine {
            bridge: Arc::new(bridge),
        }))
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<BridgeErrorResponse>,
}

#[derive(Debug, Deserialize)]
struct BridgeErrorResponse {
    message: String,
    #[serde(default)]
    name: Option<String>,
}

impl BridgeErrorResponse {
    fn into_driver_error(self) -> DriverError {
        match self.name.as_deref() {
            Some("TimeoutError") => DriverError::Timeout(self.message),
            Some("ElementNotFound") => DriverError::ElementNotFound(self.message),
            _ => DriverError::OperationFailed(self.message),
        }
    }
}

type PendingRequests = HashMap<u64, oneshot::Sender<Result<Value, DriverError>>>;

/// At most the first 200 characters of a protocol line, for logging
fn preview(line: &str) -> &str {
    line.char_indices()
        .nth(200)
        .map_or(line, |(end, _)| &line[..end])
}

/// Route each response line to its waiting caller. Once the bridge output
/// ends, every request still pending fails.
async fn read_responses<R>(output: R, pending: Arc<Mutex<PendingRequests>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(output).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Bridge response: {}", preview(&line));

        match serde_json::from_str::<BridgeResponse>(&line) {
            Ok(response) => {
                if let Some(sender) = pending.lock().await.remove(&response.id) {
                    let result = match response.error {
                        Some(err) => Err(err.into_driver_error()),
                        None => Ok(response.result.unwrap_or(Value::Null)),
                    };
                    let _ = sender.send(result);
                }
            }
            Err(e) => error!("Failed to parse bridge response: {} - {}", e, preview(&line)),
        }
    }

    for (_, sender) in pending.lock().await.drain() {
        let _ = sender.send(Err(DriverError::Communication(
            "Bridge process exited".to_string(),
        )));
    }
}

/// Handle to a running bridge process
struct Bridge {
    process: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    request_id: AtomicU64,
    pending: Arc<Mutex<PendingRequests>>,
    response_timeout: Duration,
    _script_dir: script_dir::ScriptDir,
}

impl Bridge {
    async fn spawn(config: &PlaywrightConfig) -> Result<Self, DriverError> {
        let script_dir = script_dir::ScriptDir::create(config.work_dir.as_deref()).await?;
        let script_path = script_dir.script_path();
        tokio::fs::write(&script_path, BRIDGE_SCRIPT).await.map_err(|e| {
            DriverError::LaunchFailed(format!("Failed to write bridge script: {}", e))
        })?;

        info!("Starting Playwright bridge at {}", script_path.display());

        let mut child = Command::new(&config.node_path)
            .arg(&script_path)
            .current_dir(script_dir.cwd())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DriverError::LaunchFailed(format!(
                    "Failed to spawn {}: {}",
                    config.node_path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::LaunchFailed("Failed to get bridge stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::LaunchFailed("Failed to get bridge stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[playwright bridge] {}", line);
                }
            });
        }

        let pending: Arc<Mutex<PendingRequests>> = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(read_responses(stdout, pending.clone()));

        let bridge = Self {
            process: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            request_id: AtomicU64::new(1),
            pending,
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            _script_dir: script_dir,
        };

        let ready = bridge.call("ping", json!({})).await?;
        if ready.as_str() != Some("pong") {
            return Err(DriverError::LaunchFailed(
                "Bridge did not respond correctly to ping".to_string(),
            ));
        }

        info!("Playwright bridge started");
        Ok(bridge)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::to_string(&BridgeRequest { id, method, params })?;

        debug!("Bridge request: {}", preview(&request));

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        {
            let mut stdin_guard = self.stdin.lock().await;
            let stdin = stdin_guard.as_mut().ok_or(DriverError::Closed)?;
            stdin.write_all(request.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DriverError::Communication(
                "Response channel closed".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(DriverError::Timeout(format!(
                    "Bridge method {} did not answer within {} ms",
                    method,
                    self.response_timeout.as_millis()
                )))
            }
        }
    }

    async fn stop(&self) -> Result<(), DriverError> {
        let _ = self.call("shutdown", json!({})).await;
        self.stdin.lock().await.take();

        if let Some(mut child) = self.process.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!("Bridge already gone: {}", e);
            }
        }

        info!("Playwright bridge stopped");
        Ok(())
    }
}

/// Script location for a bridge process
mod script_dir {
    use std::path::{Path, PathBuf};

    use uuid::Uuid;

    /// Writes the script next to a `node_modules` when a work dir is given,
    /// otherwise into a fresh directory under the system temp dir.
    pub(super) struct ScriptDir {
        dir: PathBuf,
        cwd: PathBuf,
        owned: bool,
    }

    impl ScriptDir {
        pub(super) async fn create(work_dir: Option<&Path>) -> std::io::Result<Self> {
            match work_dir {
                Some(work_dir) => Ok(Self {
                    dir: work_dir.to_path_buf(),
                    cwd: work_dir.to_path_buf(),
                    owned: false,
                }),
                None => {
                    let dir = std::env::temp_dir()
                        .join(format!("screenplay-bridge-{}", Uuid::new_v4().simple()));
                    tokio::fs::create_dir_all(&dir).await?;
                    let cwd = std::env::current_dir().unwrap_or_else(|_| dir.clone());
                    Ok(Self { dir, cwd, owned: true })
                }
            }
        }

        pub(super) fn script_path(&self) -> PathBuf {
            self.dir.join("screenplay_playwright_bridge.js")
        }

        pub(super) fn cwd(&self) -> &Path {
            &self.cwd
        }
    }

    impl Drop for ScriptDir {
        fn drop(&mut self) {
            if self.owned {
                let _ = std::fs::remove_dir_all(&self.dir);
            } else {
                let _ = std::fs::remove_file(self.script_path());
            }
        }
    }
}

struct PlaywrightEngine {
    bridge: Arc<Bridge>,
}

#[async_trait]
impl BrowserEngine for PlaywrightEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, DriverError> {
        info!(
            "Launching {} (headless={}, video={})",
            options.family,
            options.headless,
            options.record_video_dir.is_some()
        );

        let result = self
            .bridge
            .call(
                "launch",
                json!({
                    "browser": options.family.as_str(),
                    "headless": options.headless,
                    "recordVideoDir": options.record_video_dir,
                    "timeoutMs": options.default_timeout_ms,
                }),
            )
            .await?;

        let session_id = result
            .as_str()
            .map(String::from)
            .ok_or_else(|| DriverError::LaunchFailed("Invalid session id response".to_string()))?;

        Ok(Box::new(PlaywrightSession {
            bridge: self.bridge.clone(),
            session_id,
        }))
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        self.bridge.stop().await
    }
}

struct PlaywrightSession {
    bridge: Arc<Bridge>,
    session_id: String,
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, DriverError> {
        let result = self
            .bridge
            .call("newPage", json!({ "sessionId": self.session_id }))
            .await?;

        let page_id = result
            .as_str()
            .map(String::from)
            .ok_or_else(|| DriverError::OperationFailed("Invalid page id response".to_string()))?;

        Ok(Box::new(PlaywrightPage {
            bridge: self.bridge.clone(),
            page_id,
        }))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.bridge
            .call("closeSession", json!({ "sessionId": self.session_id }))
            .await?;
        Ok(())
    }
}

struct PlaywrightPage {
    bridge: Arc<Bridge>,
    page_id: String,
}

impl PlaywrightPage {
    async fn call(&self, method: &str, mut params: Value) -> Result<Value, DriverError> {
        params["pageId"] = Value::String(self.page_id.clone());
        self.bridge.call(method, params).await
    }
}

#[async_trait]
impl BrowserPage for PlaywrightPage {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.call("goto", json!({ "url": url })).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.call("click", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.call("fill", json!({ "selector": selector, "value": text }))
            .await?;
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, DriverError> {
        let result = self
            .call("textContent", json!({ "selector": selector }))
            .await?;
        Ok(result.as_str().map(String::from))
    }

    async fn url(&mut self) -> Result<String, DriverError> {
        let result = self.call("url", json!({})).await?;
        result
            .as_str()
            .map(String::from)
            .ok_or_else(|| DriverError::OperationFailed("Invalid url response".to_string()))
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, DriverError> {
        let result = self
            .call("isVisible", json!({ "selector": selector }))
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<(), DriverError> {
        self.call(
            "waitForSelector",
            json!({ "selector": selector, "timeoutMs": timeout_ms }),
        )
        .await?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        self.call("screenshot", json!({ "path": path })).await?;
        Ok(())
    }

    async fn press(&mut self, selector: &str, key: &str) -> Result<(), DriverError> {
        self.call("press", json!({ "selector": selector, "key": key }))
            .await?;
        Ok(())
    }

    async fn video_path(&mut self) -> Result<Option<PathBuf>, DriverError> {
        let result = self.call("videoPath", json!({})).await?;
        Ok(result.as_str().map(PathBuf::from))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.call("closePage", json!({})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = PlaywrightConfig::default();
        assert_eq!(config.node_path, PathBuf::from("node"));
        assert!(config.work_dir.is_none());
        assert_eq!(config.response_timeout_ms, 120_000);
    }

    #[test]
    fn test_bridge_error_mapping() {
        let timeout = BridgeErrorResponse {
            message: "waiting for #missing".to_string(),
            name: Some("TimeoutError".to_string()),
        };
        assert!(matches!(timeout.into_driver_error(), DriverError::Timeout(_)));

        let other = BridgeErrorResponse {
            message: "boom".to_string(),
            name: None,
        };
        assert!(matches!(other.into_driver_error(), DriverError::OperationFailed(_)));
    }

    #[test]
    fn test_response_parsing() {
        let ok: BridgeResponse = serde_json::from_str(r#"{"id":3,"result":"pong"}"#).unwrap();
        assert_eq!(ok.id, 3);
        assert_eq!(ok.result, Some(Value::String("pong".to_string())));

        let err: BridgeResponse =
            serde_json::from_str(r#"{"id":4,"error":{"message":"nope","name":"Error"}}"#).unwrap();
        assert!(err.result.is_none());
        assert_eq!(err.error.unwrap().message, "nope");
    }

    #[test]
    fn test_bridge_script_covers_page_methods() {
        for method in [
            "launch",
            "newPage",
            "goto",
            "textContent",
            "isVisible",
            "waitForSelector",
            "videoPath",
            "closeSession",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("{}:", method)), "missing {}", method);
        }
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        let line = format!("{}{}", "a".repeat(199), "é".repeat(20));
        let cut = preview(&line);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with('é'));

        assert_eq!(preview("short"), "short");
        assert_eq!(preview(""), "");
    }

    #[tokio::test]
    async fn test_reader_routes_multibyte_responses() {
        let text = format!("{}{}", "a".repeat(178), "é".repeat(20));
        let output = format!(
            "{}\nnot json\n\n{}\n",
            json!({"id": 4, "result": text.clone()}),
            json!({"id": 5, "error": {"message": "gone", "name": "ElementNotFound"}}),
        );

        let pending: Arc<Mutex<PendingRequests>> = Arc::new(Mutex::new(HashMap::new()));
        let mut receivers = Vec::new();
        for id in [4, 5, 6] {
            let (tx, rx) = oneshot::channel();
            pending.lock().await.insert(id, tx);
            receivers.push(rx);
        }

        read_responses(output.as_bytes(), pending.clone()).await;

        let mut receivers = receivers.into_iter();
        let answered = receivers.next().unwrap().await.unwrap().unwrap();
        assert_eq!(answered.as_str(), Some(text.as_str()));
        assert!(matches!(
            receivers.next().unwrap().await.unwrap(),
            Err(DriverError::ElementNotFound(_))
        ));
        assert!(matches!(
            receivers.next().unwrap().await.unwrap(),
            Err(DriverError::Communication(_))
        ));
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_node_fails_launch() {
        let driver = PlaywrightDriver::new(PlaywrightConfig {
            node_path: PathBuf::from("/nonexistent/node-binary"),
            ..Default::default()
        });
        let err = driver.start().await.err().unwrap();
        assert!(matches!(err, DriverError::LaunchFailed(_)));
    }
}
