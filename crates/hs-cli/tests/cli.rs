// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end tests driving the hs binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A command with an isolated home directory, so user config and cookie
/// files stay out of the picture.
fn hs(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hs").expect("binary builds");
    cmd.env("HOME", home.path());
    cmd
}

#[test]
fn expr_applies_expression_to_json_stream() {
    let home = tempfile::tempdir().unwrap();
    hs(&home)
        .args(["expr", ".a"])
        .write_stdin("{\"a\":1}\n{\"a\":\"x\"}\n")
        .assert()
        .success()
        .stdout("1\n\"x\"\n");
}

#[test]
fn expr_with_function_call() {
    let home = tempfile::tempdir().unwrap();
    hs(&home)
        .args(["expr", "cat .first \"-\" .last"])
        .write_stdin("{\"first\":\"ada\",\"last\":\"l\"}\n")
        .assert()
        .success()
        .stdout("\"ada-l\"\n");
}

#[test]
fn expr_unknown_variable_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    hs(&home)
        .args(["expr", "nosuchvar"])
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("undeclared variable"));
}

#[test]
fn build_expands_url_templates_per_record() {
    let home = tempfile::tempdir().unwrap();
    let out = hs(&home)
        .args(["build", "GET", "https://x.example/${.name}"])
        .write_stdin("{\"name\":\"alice\"}\n{\"name\":\"bob\"}\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            json!({"method": "GET", "url": "https://x.example/alice"}),
            json!({"method": "GET", "url": "https://x.example/bob"}),
        ]
    );
}

#[test]
fn build_reads_csv_input() {
    let home = tempfile::tempdir().unwrap();
    hs(&home)
        .args(["build", "GET", "https://x.example/${.id}", "--in", "csv"])
        .write_stdin("id,name\n7,seven\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://x.example/7"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn get_runs_a_single_request_with_null_input() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let out = hs(&home)
        .args([
            "GET",
            &format!("{}/ping", server.uri()),
            "--in",
            "null",
            "--out",
            "reqresp",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rec: Value = serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
    assert_eq!(rec["method"], json!("GET"));
    assert_eq!(rec["response"]["status"], json!(200));
    assert_eq!(rec["response"]["body"], json!("pong"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn template_urls_fan_out_over_input_records() {
    let server = MockServer::start().await;
    for name in ["alice", "bob"] {
        Mock::given(method("GET"))
            .and(path(format!("/users/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(name))
            .expect(1)
            .mount(&server)
            .await;
    }

    let home = tempfile::tempdir().unwrap();
    hs(&home)
        .args([
            "GET",
            &format!("{}/users/${{.name}}", server.uri()),
            "--out",
            "body",
            "-P",
            "2",
        ])
        .write_stdin("{\"name\":\"alice\"}\n{\"name\":\"bob\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice").and(predicate::str::contains("bob")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_split_to_the_fail_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let fail_path = home.path().join("fails.json");
    hs(&home)
        .args([
            "GET",
            &server.uri(),
            "--in",
            "null",
            "-F",
            fail_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout("");

    let fails = std::fs::read_to_string(&fail_path).unwrap();
    let rec: Value = serde_json::from_str(fails.trim()).unwrap();
    assert_eq!(rec["response"]["status"], json!(404));
    // The fail record is a full request record, re-runnable as-is.
    assert_eq!(rec["method"], json!("GET"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retries_record_their_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let out = hs(&home)
        .args([
            "GET",
            &server.uri(),
            "--in",
            "null",
            "--out",
            "reqresp",
            "-r",
            "2",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rec: Value = serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
    assert_eq!(rec["response"]["status"], json!(200));
    assert_eq!(rec["response"]["retries"], json!([{"status": 500}, {"status": 500}]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_executes_prebuilt_request_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request_record = json!({
        "method": "POST",
        "url": format!("{}/submit", server.uri()),
        "body": "payload",
    });

    let home = tempfile::tempdir().unwrap();
    hs(&home)
        .args(["run", "--out", "resp"])
        .write_stdin(format!("{request_record}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":201"));
}

#[test]
fn init_writes_config_once() {
    let home = tempfile::tempdir().unwrap();
    hs(&home).arg("init").assert().success();
    assert!(home.path().join(".hs").exists());

    hs(&home)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn config_host_fills_in_bare_paths() {
    // HOST comes from the environment; the URL template is just a path and
    // the scheme defaults to https.
    let home = tempfile::tempdir().unwrap();
    let out = hs(&home)
        .env("HS_HOST", "cfg.example")
        .args(["build", "GET", "/from-config", "--in", "null"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rec: Value = serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
    assert_eq!(rec["url"], json!("https://cfg.example/from-config"));
}

#[test]
fn host_alias_resolves_from_config() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join(".hs"),
        "HOST_ALIASES:\n  prod: example.com\n",
    )
    .unwrap();

    let out = hs(&home)
        .args(["build", "GET", "https://@prod/path", "--in", "null"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rec: Value = serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
    assert_eq!(rec["url"], json!("https://example.com/path"));

    hs(&home)
        .args(["build", "GET", "https://@unknown/", "--in", "null"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown host alias @unknown"));
}
