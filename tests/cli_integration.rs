// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the gitmap CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const REPOS: &str = r#"{
    "acme/core": {"stargazers_count": 40, "crawled": true,
                  "contributors": {"alice": {"log1p_contributions": 3.0},
                                   "bob": {"log1p_contributions": 1.0}},
                  "total_log1p_contribs": 4.0},
    "acme/cli": {"stargazers_count": 12, "crawled": true,
                 "contributors": {"alice": {"log1p_contributions": 2.0}},
                 "total_log1p_contribs": 2.0},
    "other/lib": {"stargazers_count": 7, "crawled": true,
                  "contributors": {"carol": {"log1p_contributions": 1.5}},
                  "total_log1p_contribs": 1.5}
}"#;

const USERS: &str = r#"{
    "alice": {"starweight": 2.0, "crawled": true, "stars": {"other/lib": 1}},
    "bob": {"starweight": 1.0, "crawled": true, "stars": {"acme/cli": 1}},
    "carol": {"starweight": 1.0, "crawled": true, "stars": {"acme/core": 1}}
}"#;

/// Temp dir with snapshots under `data/` and an empty config file
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("cached_repos.json"), REPOS).unwrap();
    fs::write(data.join("cached_users.json"), USERS).unwrap();
    fs::write(dir.path().join("gitmap.toml"), "").unwrap();
    dir
}

/// gitmap pinned to the workspace config file
fn gitmap(ws: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gitmap").unwrap();
    cmd.arg("--config")
        .arg(ws.join("gitmap.toml"))
        .env_remove("NO_COLOR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_writes_map() {
    let ws = workspace();
    let out = ws.path().join("map.json");

    gitmap(ws.path())
        .args(["run", "--data-dir"])
        .arg(ws.path().join("data"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("related pairs"));

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["tree"]["name"], "github");
    assert!(doc["links"].is_array());
}

#[test]
fn test_run_missing_snapshots_fails() {
    let ws = workspace();
    gitmap(ws.path())
        .args(["run", "--data-dir"])
        .arg(ws.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load snapshots"));
}

#[test]
fn test_env_overrides_config() {
    let ws = workspace();
    let out = ws.path().join("map.json");
    gitmap(ws.path())
        .env("GITMAP__TREE__ROOT_NAME", "forge")
        .args(["-q", "run", "--data-dir"])
        .arg(ws.path().join("data"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["tree"]["name"], "forge");
}

#[test]
fn test_rank_table() {
    let ws = workspace();
    gitmap(ws.path())
        .args(["--no-color", "rank", "--users", "--top", "5", "--data-dir"])
        .arg(ws.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Repositories"))
        .stdout(predicate::str::contains("acme/core"))
        .stdout(predicate::str::contains("alice"));
}

#[test]
fn test_rank_json() {
    let ws = workspace();
    let output = gitmap(ws.path())
        .args(["rank", "--json", "--data-dir"])
        .arg(ws.path().join("data"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["repos"].as_object().map(|m| m.len()), Some(3));
    assert_eq!(doc["users"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_config_prints_defaults() {
    let ws = workspace();
    gitmap(ws.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[rank]"))
        .stdout(predicate::str::contains("iterations = 25"))
        .stdout(predicate::str::contains("root_name = \"github\""));
}

#[test]
fn test_bad_config_value_fails() {
    let ws = workspace();
    fs::write(ws.path().join("gitmap.toml"), "[rank]\ndamping = 3.0\n").unwrap();
    gitmap(ws.path())
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("rank.damping"));
}

#[test]
fn test_completions() {
    Command::cargo_bin("gitmap")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gitmap"));
}
