//! CLI subprocess integration tests.
//!
//! These tests invoke the `envcast` binary as a subprocess and verify exit
//! codes, stdout content and JSON output stability. Every run uses an offline
//! sysreqs database and skips the registry tag check, so no network is needed.

use std::path::{Path, PathBuf};
use std::process::Command;

fn envcast_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_envcast"));
    cmd.env_remove("ENVCAST_LOG");
    cmd
}

fn write_session(dir: &Path) -> PathBuf {
    let path = dir.join("session.json");
    std::fs::write(
        &path,
        r#"{
  "r_version": "4.3.1",
  "packages": [
    {"package": "sf", "version": "1.0-14", "attached": true, "source": "CRAN (R 4.3.0)"},
    {"package": "tool", "version": "0.1", "attached": true, "source": "Github (alice/tool@v2)"},
    {"package": "grid", "version": "4.3.1", "attached": true, "source": "local", "priority": "base"},
    {"package": "Rcpp", "version": "1.0.11", "attached": false, "source": "CRAN (R 4.3.0)"}
  ]
}"#,
    )
    .unwrap();
    path
}

fn write_sysreqs_db(dir: &Path) -> PathBuf {
    let path = dir.join("sysreqs.json");
    std::fs::write(
        &path,
        r#"{"ubuntu": {"sf": [{"name": "libgdal-dev"}, {"name": "libproj-dev"}]}}"#,
    )
    .unwrap();
    path
}

fn generate_session(dir: &Path, extra: &[&str]) -> std::process::Output {
    let session = write_session(dir);
    let db = write_sysreqs_db(dir);
    envcast_bin()
        .arg("generate")
        .arg("--session")
        .arg(&session)
        .arg("--sysreqs-db")
        .arg(&db)
        .arg("--context")
        .arg(dir)
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn cli_version_exits_zero() {
    let output = envcast_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "envcast --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("envcast"),
        "version output must contain 'envcast': {stdout}"
    );
}

#[test]
fn cli_help_lists_commands() {
    let output = envcast_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("generate"), "help must list 'generate'");
    assert!(stdout.contains("config"), "help must list 'config'");
    assert!(stdout.contains("completions"), "help must list 'completions'");
}

#[test]
fn cli_generate_from_session_prints_dockerfile() {
    let dir = tempfile::tempdir().unwrap();
    let output = generate_session(dir.path(), &[]);
    assert!(
        output.status.success(),
        "generate must exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "FROM rocker/r-ver:4.3.1\n\
         RUN export DEBIAN_FRONTEND=noninteractive; apt-get -y update && apt-get install -y libgdal-dev libproj-dev\n\
         RUN [\"install2.r\", \"--error\", \"--skipinstalled\", \"sf\"]\n\
         RUN [\"installGithub.r\", \"alice/tool@v2\"]\n\
         CMD [\"R\"]\n"
    );
}

#[test]
fn cli_generate_json_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let first = generate_session(dir.path(), &["--json"]);
    let second = generate_session(dir.path(), &["--json"]);
    assert!(first.status.success());
    assert!(second.status.success());

    let a: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    let b: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    assert_eq!(a["digest"], b["digest"]);
    assert_eq!(a["dockerfile"], b["dockerfile"]);
    assert_eq!(a["base_image"], "rocker/r-ver:4.3.1");
    assert_eq!(a["platform"], "ubuntu:22.04");
    assert_eq!(a["packages"].as_array().unwrap().len(), 2);
    assert_eq!(a["digest"].as_str().unwrap().len(), 64);
}

#[test]
fn cli_generate_writes_output_and_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("Dockerfile");
    let output = generate_session(
        dir.path(),
        &[
            "--output",
            target.to_str().unwrap(),
            "--save-state",
            "--maintainer",
            "Jane Doe",
            "--env",
            "TZ=UTC",
        ],
    );
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty(), "Dockerfile goes to the file");

    let dockerfile = std::fs::read_to_string(&target).unwrap();
    assert!(dockerfile.contains("LABEL maintainer=\"Jane Doe\"\n"));
    assert!(dockerfile.contains("ENV TZ=\"UTC\"\n"));
    assert!(dockerfile.contains("WORKDIR /payload/\n"));
    assert!(dockerfile.contains("COPY [\"envcast-state.json\", \"envcast-state.json\"]\n"));

    let state = std::fs::read_to_string(dir.path().join("envcast-state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["base_image"], "rocker/r-ver:4.3.1");
    assert_eq!(state["session"]["r_version"], "4.3.1");
}

#[test]
fn cli_generate_from_package_table() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("packages.toml");
    std::fs::write(
        &table,
        "[[package]]\nname = \"tool\"\nversion = \"0.0.1\"\nsource = \"GITHUB (alice/tool@v2)\"\n",
    )
    .unwrap();
    let db = write_sysreqs_db(dir.path());
    let output = envcast_bin()
        .args(["generate", "--r-version", "4.2.0", "--packages"])
        .arg(&table)
        .arg("--sysreqs-db")
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("FROM rocker/r-ver:4.2.0\n"));
    assert!(stdout.contains("RUN [\"installGithub.r\", \"alice/tool@v2\"]\n"));
}

#[test]
fn cli_generate_without_input_is_minimal() {
    let dir = tempfile::tempdir().unwrap();
    let output = envcast_bin()
        .arg("generate")
        .arg("--context")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "FROM rocker/r-ver:latest\nCMD [\"R\"]\n"
    );
}

#[test]
fn cli_missing_input_exits_with_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = envcast_bin()
        .arg("generate")
        .arg(dir.path().join("missing.R"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("input error:"), "stderr: {stderr}");
}

#[test]
fn cli_empty_directory_exits_with_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = envcast_bin()
        .arg("generate")
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_conflicting_sources_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let session = write_session(dir.path());
    let output = envcast_bin()
        .arg("generate")
        .arg("--session")
        .arg(&session)
        .args(["--expr", "library(sf)"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn cli_invalid_config_exits_with_input_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("envcast.toml"), "config_version = 2\n").unwrap();
    let output = envcast_bin()
        .arg("generate")
        .arg("--context")
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config error:"), "stderr: {stderr}");
}

#[test]
fn cli_config_reads_context_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("envcast.toml"),
        "config_version = 1\n[image]\nbase = \"rocker/geospatial:4.3.1\"\n[layout]\nworkdir = false\n",
    )
    .unwrap();
    let output = envcast_bin()
        .arg("--json")
        .arg("config")
        .arg("--context")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let options: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(options["base_image"], "rocker/geospatial:4.3.1");
    assert!(options["workdir"].is_null());
}

#[test]
fn cli_completions_bash() {
    let output = envcast_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("envcast"));
}
