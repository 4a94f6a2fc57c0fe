//! CLI tests for the matrix binary.
//!
//! Spawns the binary and checks output and exit codes for each command.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use matrix::exit_codes;

const MODIFY_ROW: &str = r#"
[[scenarios]]
mode = "old"
pre_state = "exists_without_marker"
transport = "web_api"
operation = "modify"
request = "with_marker"
outcome = "success"
post_state = "exists_with_marker"
"#;

fn matrix(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_matrix"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn matrix")
}

fn write_suite(dir: &Path, rows: &str) -> PathBuf {
    let path = dir.join("suite.toml");
    fs::write(&path, format!("[suite]\nname = \"cli\"\n{rows}")).expect("write suite");
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn list_prints_canonical_strings() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_suite(temp.path(), MODIFY_ROW);

    let output = matrix(temp.path(), &["list", "suite.toml"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        "GIVEN( OLD_MODE, OBJ_EXISTS_NO_CHANGED__ ) WHEN( REST___  MODIFY, WITH_CHANGED ) \
         THEN( SUCCESS, OBJ_EXISTS_WITH_CHANGED )\n"
    );
}

#[test]
fn check_accepts_shipped_suite() {
    let suite = Path::new(env!("CARGO_MANIFEST_DIR")).join("suites/history_marker.toml");
    let temp = tempfile::tempdir().expect("tempdir");

    let output = matrix(temp.path(), &["check", suite.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).starts_with("ok: history_marker ("));
}

#[test]
fn check_rejects_duplicate_scenarios() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_suite(temp.path(), &format!("{MODIFY_ROW}{MODIFY_ROW}"));

    let output = matrix(temp.path(), &["check", "suite.toml"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("scenarios[1] duplicates"));
}

#[test]
fn check_rejects_missing_suite() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = matrix(temp.path(), &["check", "absent.toml"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("read suite"));
}

#[test]
fn init_config_writes_once_unless_forced() {
    let temp = tempfile::tempdir().expect("tempdir");

    let first = matrix(temp.path(), &["init-config", "conf/matrix.toml"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(temp.path().join("conf/matrix.toml")).expect("read config");
    assert!(written.contains("[web_api]"));

    let second = matrix(temp.path(), &["init-config", "conf/matrix.toml"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = matrix(temp.path(), &["init-config", "conf/matrix.toml", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[test]
fn run_with_missing_config_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_suite(temp.path(), MODIFY_ROW);

    let output = matrix(temp.path(), &["run", "suite.toml", "--config", "absent.toml"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn run_against_unreachable_backend_reports_errors() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_suite(temp.path(), MODIFY_ROW);
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    fs::write(
        temp.path().join("matrix.toml"),
        format!(
            "operation_timeout_secs = 2\n\n[web_api]\nbase_url = \"http://127.0.0.1:{port}/whois\"\n"
        ),
    )
    .expect("write config");

    let output = matrix(
        temp.path(),
        &["run", "suite.toml", "--config", "matrix.toml", "--json"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::ERRORED));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["suite"], "cli");
    assert_eq!(report["totals"]["error"], 1);
    assert_eq!(report["results"][0]["verdict"], "error");
    assert_eq!(report["results"][0]["transport"], "web_api");
}

#[test]
fn transport_filter_can_select_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_suite(temp.path(), MODIFY_ROW);

    let output = matrix(temp.path(), &["run", "suite.toml", "--transport", "sync_batch"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("total: 0 scenarios"));
}
