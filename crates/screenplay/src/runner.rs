//! Suite runner
//!
//! Expands each spec into scenario runs (one per browser for specs that drive
//! a browser), runs them concurrently up to the configured parallelism with a
//! separate actor each, and collects a suite report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use screenplay_common::{ApiConfig, BrowserFamily, WebConfig};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::capability::Capability;
use crate::driver::BrowserDriver;
use crate::error::ScreenplayResult;
use crate::scenario::{ScenarioHarness, ScenarioReport};
use crate::spec::TestSpec;

/// Configuration for the suite runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Scenario runs in flight at once
    pub parallelism: usize,
    pub actor_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("TestResults"),
            parallelism: 1,
            actor_name: "Tester".to_string(),
        }
    }
}

/// Result of running a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// One planned scenario run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRun {
    /// Index into the spec list
    pub spec: usize,
    /// `None` for runs that need no browser
    pub browser: Option<BrowserFamily>,
    pub capabilities: Vec<Capability>,
}

pub struct SuiteRunner {
    web: Arc<WebConfig>,
    api: Arc<ApiConfig>,
    driver: Arc<dyn BrowserDriver>,
    config: RunnerConfig,
}

impl SuiteRunner {
    pub fn new(
        web: Arc<WebConfig>,
        api: Arc<ApiConfig>,
        driver: Arc<dyn BrowserDriver>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            web,
            api,
            driver,
            config,
        }
    }

    /// Run every spec in the specs directory
    pub async fn run_all(&self) -> ScreenplayResult<SuiteReport> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        Ok(self.run_specs(specs).await)
    }

    /// One run per browser for web specs, a single browserless run otherwise
    pub fn plan(&self, specs: &[TestSpec]) -> Vec<ScenarioRun> {
        let matrix = self.web.browser_matrix();
        let mut runs = Vec::new();

        for (index, spec) in specs.iter().enumerate() {
            let mut capabilities = Vec::new();
            if spec.uses_web() {
                capabilities.push(Capability::Web);
            }
            if spec.uses_api() {
                capabilities.push(Capability::Api);
            }

            if spec.uses_web() {
                let browsers = if spec.browsers.is_empty() {
                    matrix.clone()
                } else {
                    spec.browsers.clone()
                };
                for browser in browsers {
                    runs.push(ScenarioRun {
                        spec: index,
                        browser: Some(browser),
                        capabilities: capabilities.clone(),
                    });
                }
            } else {
                runs.push(ScenarioRun {
                    spec: index,
                    browser: None,
                    capabilities,
                });
            }
        }

        runs
    }

    pub async fn run_specs(&self, specs: Vec<TestSpec>) -> SuiteReport {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        let plan = self.plan(&specs);
        let specs: Vec<Arc<TestSpec>> = specs.into_iter().map(Arc::new).collect();

        info!(
            "Running {} scenario run(s) from {} spec(s) [run {}]",
            plan.len(),
            specs.len(),
            run_id
        );

        let parallelism = self.config.parallelism.max(1);
        let mut indexed: Vec<(usize, ScenarioReport)> = stream::iter(plan.into_iter().enumerate())
            .map(|(order, run)| {
                let spec = specs[run.spec].clone();
                async move { (order, self.run_one(spec, &run).await) }
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;
        indexed.sort_by_key(|(order, _)| *order);

        let results: Vec<ScenarioReport> = indexed.into_iter().map(|(_, report)| report).collect();
        let passed = results.iter().filter(|r| r.is_passed()).count();
        let failed = results.iter().filter(|r| r.is_failed()).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );
        for report in results.iter().filter(|r| r.is_failed()) {
            error!(
                "✗ {} [{}] - {}",
                report.title,
                report.browser.map(|b| b.as_str()).unwrap_or("api"),
                report.error().unwrap_or("unknown error")
            );
        }

        SuiteReport {
            run_id,
            started_at,
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    async fn run_one(&self, spec: Arc<TestSpec>, run: &ScenarioRun) -> ScenarioReport {
        let mut harness = ScenarioHarness::new(self.web.clone(), self.api.clone(), self.driver.clone())
            .with_actor_name(self.config.actor_name.clone())
            .with_capabilities(&run.capabilities);
        if let Some(browser) = run.browser {
            harness = harness.with_browser(browser);
        }

        let info = spec.scenario_info();
        harness
            .run(&info, move |actor| {
                Box::pin(async move { actor.execute(spec.as_ref()).await })
            })
            .await
    }

    /// Write the suite report as pretty JSON
    pub fn write_results(&self, report: &SuiteReport) -> ScreenplayResult<PathBuf> {
        write_results(&self.config.output_dir, report)
    }
}

pub fn write_results(output_dir: &Path, report: &SuiteReport) -> ScreenplayResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::TestStep;
    use crate::driver::{BrowserEngine, DriverError};
    use async_trait::async_trait;

    struct NoBrowser;

    #[async_trait]
    impl BrowserDriver for NoBrowser {
        async fn start(&self) -> Result<Box<dyn BrowserEngine>, DriverError> {
            Err(DriverError::LaunchFailed("no browser in unit tests".to_string()))
        }
    }

    fn spec(name: &str, steps: Vec<TestStep>) -> TestSpec {
        TestSpec {
            name: name.to_string(),
            description: String::new(),
            tags: Vec::new(),
            browsers: Vec::new(),
            steps,
        }
    }

    fn runner(web: WebConfig) -> SuiteRunner {
        SuiteRunner::new(
            Arc::new(web),
            Arc::new(ApiConfig::default()),
            Arc::new(NoBrowser),
            RunnerConfig::default(),
        )
    }

    #[test]
    fn test_plan_expands_web_specs_over_matrix() {
        let runner = runner(WebConfig {
            browsers: vec![BrowserFamily::Chromium, BrowserFamily::Firefox],
            ..Default::default()
        });
        let specs = vec![
            spec(
                "web",
                vec![TestStep::Navigate {
                    url: "https://example.com".to_string(),
                }],
            ),
            spec("api", vec![TestStep::ExpectStatus { status: 200 }]),
        ];

        let plan = runner.plan(&specs);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].browser, Some(BrowserFamily::Chromium));
        assert_eq!(plan[1].browser, Some(BrowserFamily::Firefox));
        assert_eq!(plan[0].capabilities, vec![Capability::Web]);
        assert_eq!(plan[2].browser, None);
        assert_eq!(plan[2].capabilities, vec![Capability::Api]);
    }

    #[test]
    fn test_plan_honours_spec_browsers() {
        let runner = runner(WebConfig::default());
        let mut web = spec(
            "web",
            vec![TestStep::Click {
                selector: "#go".to_string(),
            }],
        );
        web.browsers = vec![BrowserFamily::Webkit];

        let plan = runner.plan(&[web]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].browser, Some(BrowserFamily::Webkit));
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let report = SuiteReport {
            run_id: "r".to_string(),
            started_at: Utc::now(),
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
            results: Vec::new(),
        };
        let path = write_results(dir.path(), &report).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"run_id\": \"r\""));
        assert!(report.success());
    }
}
