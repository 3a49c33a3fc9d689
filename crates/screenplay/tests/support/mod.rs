//! In-memory browser driver for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use screenplay::driver::{BrowserEngine, BrowserPage, BrowserSession, DriverError, LaunchOptions};
use screenplay::BrowserDriver;
use screenplay_common::{ApiConfig, WebConfig};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub text: String,
    pub visible: bool,
}

/// Everything the fake browser did, plus the page it serves
#[derive(Debug, Default)]
pub struct World {
    pub elements: HashMap<String, FakeElement>,
    /// Elements that show up once Enter is pressed anywhere
    pub revealed_on_enter: Vec<(String, String)>,
    pub url: String,

    pub starts: usize,
    pub launches: usize,
    pub pages_opened: usize,
    pub pages_closed: usize,
    pub sessions_closed: usize,
    pub shutdowns: usize,

    pub fail_launch: bool,
    pub fail_page_close: bool,

    pub launch_options: Vec<LaunchOptions>,
    pub actions: Vec<String>,
    pub screenshots: Vec<PathBuf>,
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    world: Arc<Mutex<World>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, selector: &str, text: &str) -> Self {
        self.world.lock().elements.insert(
            selector.to_string(),
            FakeElement {
                text: text.to_string(),
                visible: true,
            },
        );
        self
    }

    pub fn with_hidden_element(self, selector: &str) -> Self {
        self.world.lock().elements.insert(
            selector.to_string(),
            FakeElement {
                text: String::new(),
                visible: false,
            },
        );
        self
    }

    pub fn revealing_on_enter(self, selector: &str, text: &str) -> Self {
        self.world
            .lock()
            .revealed_on_enter
            .push((selector.to_string(), text.to_string()));
        self
    }

    pub fn world(&self) -> parking_lot::MutexGuard<'_, World> {
        self.world.lock()
    }

    pub fn shared(&self) -> Arc<dyn BrowserDriver> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn start(&self) -> Result<Box<dyn BrowserEngine>, DriverError> {
        self.world.lock().starts += 1;
        Ok(Box::new(FakeEngine {
            world: self.world.clone(),
        }))
    }
}

struct FakeEngine {
    world: Arc<Mutex<World>>,
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, DriverError> {
        let mut world = self.world.lock();
        if world.fail_launch {
            return Err(DriverError::LaunchFailed("browser binary missing".to_string()));
        }
        world.launches += 1;
        world.launch_options.push(options.clone());
        Ok(Box::new(FakeSession {
            world: self.world.clone(),
            video_dir: options.record_video_dir.clone(),
        }))
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        self.world.lock().shutdowns += 1;
        Ok(())
    }
}

struct FakeSession {
    world: Arc<Mutex<World>>,
    video_dir: Option<PathBuf>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, DriverError> {
        let number = {
            let mut world = self.world.lock();
            world.pages_opened += 1;
            world.pages_opened
        };
        let video = match &self.video_dir {
            Some(dir) => {
                let path = dir.join(format!("page-{}.webm", number));
                std::fs::write(&path, b"webm")?;
                Some(path)
            }
            None => None,
        };
        Ok(Box::new(FakePage {
            world: self.world.clone(),
            video,
        }))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.world.lock().sessions_closed += 1;
        Ok(())
    }
}

struct FakePage {
    world: Arc<Mutex<World>>,
    video: Option<PathBuf>,
}

impl FakePage {
    fn require(&self, selector: &str) -> Result<(), DriverError> {
        if self.world.lock().elements.contains_key(selector) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    fn act(&self, action: String) {
        self.world.lock().actions.push(action);
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.world.lock().url = url.to_string();
        self.act(format!("goto {}", url));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.require(selector)?;
        self.act(format!("click {}", selector));
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.require(selector)?;
        if let Some(element) = self.world.lock().elements.get_mut(selector) {
            element.text = text.to_string();
        }
        self.act(format!("fill {} {}", selector, text));
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> Result<Option<String>, DriverError> {
        Ok(self
            .world
            .lock()
            .elements
            .get(selector)
            .map(|e| e.text.clone()))
    }

    async fn url(&mut self) -> Result<String, DriverError> {
        Ok(self.world.lock().url.clone())
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, DriverError> {
        Ok(self
            .world
            .lock()
            .elements
            .get(selector)
            .map(|e| e.visible)
            .unwrap_or(false))
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout_ms: u64) -> Result<(), DriverError> {
        if self.world.lock().elements.contains_key(selector) {
            return Ok(());
        }
        // Never resolves; the ability's own timeout has to end the wait.
        futures::future::pending::<()>().await;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        std::fs::write(path, b"png")?;
        self.world.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn press(&mut self, selector: &str, key: &str) -> Result<(), DriverError> {
        self.require(selector)?;
        let mut world = self.world.lock();
        if key == "Enter" {
            let revealed: Vec<(String, String)> = world.revealed_on_enter.drain(..).collect();
            for (selector, text) in revealed {
                world.elements.insert(selector, FakeElement { text, visible: true });
            }
        }
        world.actions.push(format!("press {} {}", selector, key));
        Ok(())
    }

    async fn video_path(&mut self) -> Result<Option<PathBuf>, DriverError> {
        Ok(self.video.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let mut world = self.world.lock();
        world.pages_closed += 1;
        if world.fail_page_close {
            return Err(DriverError::OperationFailed("page crashed".to_string()));
        }
        Ok(())
    }
}

/// Web config writing evidence into `dir`
pub fn web_config(dir: &Path) -> WebConfig {
    WebConfig {
        evidence_base_path: dir.to_path_buf(),
        ..Default::default()
    }
}

/// Api config writing evidence into `dir`
pub fn api_config(dir: &Path, base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        evidence_base_path: dir.to_path_buf(),
        ..Default::default()
    }
}

/// Files under `dir`, recursively
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    walk(dir)
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(walk(&path));
            } else {
                files.push(path);
            }
        }
    }
    files
}
