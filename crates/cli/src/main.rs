//! Screenplay CLI - Main Entry Point
//!
//! Loads the harness configuration, runs a directory of YAML scenarios across
//! the browser matrix and writes `test-results.json`.
//!
//! Exit codes: 0 when nothing failed, 1 when a scenario failed, 2 when the
//! run could not be set up.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use screenplay::{PlaywrightConfig, PlaywrightDriver, RunnerConfig, SuiteRunner, TestSpec};
use screenplay_common::{BrowserFamily, HarnessConfig, ProcessEnv};
use tracing::debug;

mod output;

use output::{OutputFormat, PlannedRun};

/// Screenplay - acceptance scenarios for web UIs and HTTP APIs
#[derive(Parser, Debug)]
#[command(name = "screenplay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Harness configuration file with [web] and [api] tables
    #[arg(short, long, env = "SCREENPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of YAML scenario specs
    #[arg(short, long, default_value = "scenarios")]
    specs: PathBuf,

    /// Only run scenarios carrying one of these tags
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// Run on these browsers instead of the configured matrix
    #[arg(short, long = "browser")]
    browsers: Vec<String>,

    /// Run browsers headless
    #[arg(long)]
    headless: bool,

    /// Scenario runs in flight at once
    #[arg(short, long, default_value_t = 1)]
    parallel: usize,

    /// Directory for test-results.json
    #[arg(short, long, default_value = "TestResults")]
    output: PathBuf,

    /// Node.js executable for the Playwright bridge
    #[arg(long, default_value = "node")]
    node: PathBuf,

    /// Directory the bridge runs in; must resolve the `playwright` package
    #[arg(long)]
    bridge_dir: Option<PathBuf>,

    /// Show the planned scenario runs without executing them
    #[arg(long)]
    list: bool,

    /// Output format
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when a scenario failed
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = HarnessConfig::resolve(cli.config.as_deref(), &ProcessEnv)
        .context("loading configuration")?;
    apply_overrides(&mut config, &cli);
    debug!("Resolved configuration: {:?}", config);

    let specs = TestSpec::load_all(&cli.specs)
        .with_context(|| format!("loading scenarios from {}", cli.specs.display()))?;
    if specs.is_empty() {
        anyhow::bail!("no scenario specs found under {}", cli.specs.display());
    }

    let web_filter = config.web.tag_filter();
    let api_filter = config.api.tag_filter();

    let driver = PlaywrightDriver::new(PlaywrightConfig {
        node_path: cli.node.clone(),
        work_dir: cli.bridge_dir.clone(),
        ..Default::default()
    });
    let runner = SuiteRunner::new(
        Arc::new(config.web),
        Arc::new(config.api),
        Arc::new(driver),
        RunnerConfig {
            specs_dir: cli.specs.clone(),
            output_dir: cli.output.clone(),
            parallelism: cli.parallel,
            ..Default::default()
        },
    );

    if cli.list {
        let planned: Vec<PlannedRun> = runner
            .plan(&specs)
            .into_iter()
            .map(|run| {
                let spec = &specs[run.spec];
                PlannedRun {
                    scenario: spec.name.clone(),
                    browser: run.browser.map(|b| b.to_string()),
                    abilities: run.capabilities.iter().map(|c| c.to_string()).collect(),
                    tags: spec.tags.clone(),
                    selected: web_filter.admits(&spec.tags) && api_filter.admits(&spec.tags),
                }
            })
            .collect();
        output::print_list(&planned, cli.format);
        return Ok(true);
    }

    let report = runner.run_specs(specs).await;
    let path = runner
        .write_results(&report)
        .context("writing test results")?;

    output::print_report(&report, cli.format);
    if cli.format == OutputFormat::Table {
        output::print_info(&format!("Results written to {}", path.display()));
    }
    Ok(report.success())
}

/// Command-line flags win over file and environment values
fn apply_overrides(config: &mut HarnessConfig, cli: &Cli) {
    if !cli.tags.is_empty() {
        config.web.tags = cli.tags.clone();
        config.api.tags = cli.tags.clone();
    }
    if !cli.browsers.is_empty() {
        config.web.browsers = cli
            .browsers
            .iter()
            .map(|name| BrowserFamily::from_name(name))
            .collect();
    }
    if cli.headless {
        config.web.headless = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["screenplay"]).unwrap();
        assert_eq!(cli.specs, PathBuf::from("scenarios"));
        assert_eq!(cli.parallel, 1);
        assert_eq!(cli.format, OutputFormat::Table);
        assert!(!cli.list);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "screenplay",
            "--tag",
            "@smoke",
            "--tag",
            "api",
            "-b",
            "firefox",
            "-b",
            "WEBKIT",
            "--headless",
        ])
        .unwrap();
        let mut config = HarnessConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.web.tags, vec!["@smoke", "api"]);
        assert_eq!(config.api.tags, config.web.tags);
        assert_eq!(
            config.web.browser_matrix(),
            vec![BrowserFamily::Firefox, BrowserFamily::Webkit]
        );
        assert!(config.web.headless);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let cli = Cli::try_parse_from(["screenplay", "--parallel", "4"]).unwrap();
        let mut config = HarnessConfig::default();
        config.web.tags = vec!["regression".to_string()];
        apply_overrides(&mut config, &cli);

        assert_eq!(config.web.tags, vec!["regression"]);
        assert!(!config.web.headless);
        assert_eq!(cli.parallel, 4);
    }
}
