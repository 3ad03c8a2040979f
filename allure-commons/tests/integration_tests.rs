//! End-to-end tests against the process-wide default instance and the
//! filesystem writer: validates the files an adapter-driven run produces.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use allure_commons::model::{TestResult, TestResultContainer};
use allure_commons::{api, bdd, lifecycle};
use serde_json::Value;

static RESULTS_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Configures the default instance once, pointing it at a per-process
/// scratch directory.
fn results_dir() -> &'static Path {
    RESULTS_DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("allure-commons-it-{}", std::process::id()));
        allure_commons::configure()
            .results_dir(dir.to_string_lossy().to_string())
            .clean_results(true)
            .init()
            .unwrap();
        dir
    })
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_default_instance_writes_result_file() {
    let dir = results_dir();

    let test = TestResult::named("end to end").with_full_name("it::end_to_end");
    let uuid = test.uuid.clone();
    lifecycle().start_new_test_case(test).unwrap();

    api::step("call the service", || ()).unwrap();
    bdd::given("a warmed cache", || ()).unwrap();
    api::attach_text("trace", "GET /health -> 200").unwrap();
    api::tag("smoke").unwrap();

    lifecycle()
        .stop_test_case_with(|test| test.status = allure_commons::Status::Passed)
        .unwrap();
    lifecycle().write_test_case().unwrap();

    let json = read_json(&dir.join(format!("{uuid}-result.json")));
    assert_eq!(json["uuid"], uuid.as_str());
    assert_eq!(json["status"], "passed");
    assert_eq!(json["fullName"], "it::end_to_end");
    assert!(json["historyId"].is_string());
    assert!(json["testCaseId"].is_string());

    let steps: Vec<_> = json["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(steps, vec!["call the service", "Given a warmed cache"]);

    let labels = json["labels"].as_array().unwrap();
    assert!(labels
        .iter()
        .any(|l| l["name"] == "tag" && l["value"] == "smoke"));

    // The attachment payload landed next to the result file.
    let source = json["attachments"][0]["source"].as_str().unwrap();
    assert_eq!(fs::read_to_string(dir.join(source)).unwrap(), "GET /health -> 200");
}

#[test]
fn test_default_instance_writes_container_file() {
    let dir = results_dir();

    let container = TestResultContainer::named("it suite");
    let container_uuid = container.uuid.clone();
    lifecycle().start_test_container(container).unwrap();

    api::before("boot", || ()).unwrap();

    let test = TestResult::named("contained");
    let test_uuid = test.uuid.clone();
    lifecycle().start_new_test_case(test).unwrap();
    lifecycle().stop_test_case().unwrap();
    lifecycle().write_test_case().unwrap();

    api::after("shutdown", || ()).unwrap();

    lifecycle().stop_test_container().unwrap();
    lifecycle().write_test_container().unwrap();

    let json = read_json(&dir.join(format!("{container_uuid}-container.json")));
    assert_eq!(json["name"], "it suite");
    assert_eq!(json["children"][0], test_uuid.as_str());
    assert_eq!(json["befores"][0]["name"], "boot");
    assert_eq!(json["befores"][0]["status"], "passed");
    assert_eq!(json["afters"][0]["name"], "shutdown");
    assert!(json["start"].is_i64() && json["stop"].is_i64());
}
