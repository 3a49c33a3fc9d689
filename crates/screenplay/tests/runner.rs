mod support;

use std::path::Path;
use std::sync::Arc;

use screenplay::{RunnerConfig, SuiteRunner};
use screenplay_common::{ApiConfig, BrowserFamily, WebConfig};
use serde_json::json;
use support::{api_config, web_config, FakeDriver};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH: &str = r##"
name: Search
tags: ["@smoke"]
steps:
  - action: navigate
    url: https://example.com
  - action: fill
    selector: "#q"
    value: rust
  - action: press
    selector: "#q"
    key: Enter
  - action: wait
    selector: "#results"
    timeout_ms: 500
  - action: expect_text
    selector: "#results"
    contains: results
"##;

const CREATE_ITEM: &str = r##"
name: Create item
tags: ["@smoke"]
steps:
  - action: request
    method: POST
    endpoint: /items
    body:
      display_name: a
    expect_status: 201
  - action: expect_property
    path: id
    equals: 1
"##;

const BROKEN: &str = r##"
name: Broken button
tags: ["@smoke"]
steps:
  - action: navigate
    url: https://example.com
  - action: click
    selector: "#missing"
"##;

const WIP: &str = r##"
name: Work in progress
tags: ["@wip"]
steps:
  - action: expect_status
    status: 200
"##;

fn write_specs(dir: &Path) {
    std::fs::write(dir.join("01_search.yaml"), SEARCH).unwrap();
    std::fs::write(dir.join("02_create_item.yml"), CREATE_ITEM).unwrap();
    std::fs::write(dir.join("03_broken.yaml"), BROKEN).unwrap();
    std::fs::write(dir.join("04_wip.yaml"), WIP).unwrap();
    std::fs::write(dir.join("README.md"), "not a spec").unwrap();
}

#[tokio::test]
async fn test_suite_over_browser_matrix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_json(json!({"displayName": "a"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let specs = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let evidence = tempfile::tempdir().unwrap();
    write_specs(specs.path());

    let driver = FakeDriver::new()
        .with_element("#q", "")
        .with_element("#results", "3 results");
    let web = WebConfig {
        browsers: vec![BrowserFamily::Chromium, BrowserFamily::Firefox],
        ..web_config(evidence.path())
    };
    let api = ApiConfig {
        tags: vec!["smoke".to_string()],
        ..api_config(evidence.path(), &server.uri())
    };
    let runner = SuiteRunner::new(
        Arc::new(web),
        Arc::new(api),
        driver.shared(),
        RunnerConfig {
            specs_dir: specs.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            parallelism: 2,
            actor_name: "Runner".to_string(),
        },
    );

    let report = runner.run_all().await.unwrap();

    assert_eq!(report.total, 6);
    assert_eq!(report.passed, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.skipped, 1);
    assert!(!report.success());

    let titles: Vec<(&str, Option<BrowserFamily>)> = report
        .results
        .iter()
        .map(|r| (r.title.as_str(), r.browser))
        .collect();
    assert_eq!(
        titles,
        vec![
            ("Search", Some(BrowserFamily::Chromium)),
            ("Search", Some(BrowserFamily::Firefox)),
            ("Create item", None),
            ("Broken button", Some(BrowserFamily::Chromium)),
            ("Broken button", Some(BrowserFamily::Firefox)),
            ("Work in progress", None),
        ]
    );
    assert!(report.results[3].error().unwrap().contains("#missing"));
    assert!(report.results[5].is_skipped());

    {
        let world = driver.world();
        assert_eq!(world.starts, 4);
        assert_eq!(world.shutdowns, 4);
        assert_eq!(world.sessions_closed, 4);
    }

    let path = runner.write_results(&report).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written["total"], 6);
    assert_eq!(written["results"][3]["status"], "failed");
    assert_eq!(written["results"][3]["browser"], "chromium");
}

#[tokio::test]
async fn test_bad_spec_fails_the_load() {
    let specs = tempfile::tempdir().unwrap();
    std::fs::write(specs.path().join("bad.yaml"), "name: x\nsteps:\n  - action: teleport\n").unwrap();

    let evidence = tempfile::tempdir().unwrap();
    let runner = SuiteRunner::new(
        Arc::new(web_config(evidence.path())),
        Arc::new(api_config(evidence.path(), "http://localhost:9")),
        FakeDriver::new().shared(),
        RunnerConfig {
            specs_dir: specs.path().to_path_buf(),
            ..Default::default()
        },
    );

    let err = runner.run_all().await.unwrap_err();
    assert!(err.to_string().contains("bad.yaml"));
}
