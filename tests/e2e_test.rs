/// End-to-end tests for the CLI
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const COLLECTOR_DIR: &str = "tests/fixtures/collector";

/// Runs the binary against a database inside `dir` with no follow-up delay
fn registry(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("component-registry");
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"))
        .arg("--database")
        .arg(dir.join("registry.db"))
        .args(["--collector-dir", COLLECTOR_DIR, "--rematerialize-delay", "0"]);
    cmd
}

fn populated_registry() -> TempDir {
    let dir = TempDir::new().unwrap();
    registry(dir.path())
        .args(["load-products", "tests/fixtures/products.yml"])
        .assert()
        .code(0);
    registry(dir.path())
        .args([
            "load-relations",
            "tests/fixtures/relations.json",
            "--tag-builds",
            "tests/fixtures/tag_builds.json",
        ])
        .assert()
        .code(0);
    registry(dir.path())
        .args(["ingest", "1", "2"])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("BREW:1"));
    dir
}

// Exit code tests for CLI
mod exit_code_tests {
    use super::*;

    /// Exit code 0: --help should return success
    #[test]
    fn test_exit_code_help() {
        cargo_bin_cmd!("component-registry").arg("--help").assert().code(0);
    }

    /// Exit code 0: --version should return success
    #[test]
    fn test_exit_code_version() {
        cargo_bin_cmd!("component-registry")
            .arg("--version")
            .assert()
            .code(0);
    }

    /// Exit code 2: Invalid arguments
    #[test]
    fn test_exit_code_invalid_argument() {
        cargo_bin_cmd!("component-registry")
            .arg("--invalid-option")
            .assert()
            .code(2);
    }

    /// Exit code 2: Invalid format value
    #[test]
    fn test_exit_code_invalid_format() {
        cargo_bin_cmd!("component-registry")
            .args(["latest", "rhel-8.6.0", "-f", "invalid_format"])
            .assert()
            .code(2);
    }

    /// Exit code 3: the named config file does not exist
    #[test]
    fn test_exit_code_missing_config() {
        let dir = TempDir::new().unwrap();
        registry(dir.path())
            .args(["--config", "/nonexistent/component-registry.config.yml"])
            .args(["latest", "rhel-8.6.0"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("An error occurred"));
    }

    /// Exit code 3: the config file fails validation
    #[test]
    fn test_exit_code_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("component-registry.config.yml");
        std::fs::write(&config, "workers: 0\n").unwrap();
        registry(dir.path())
            .arg("--config")
            .arg(&config)
            .args(["latest", "rhel-8.6.0"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("workers"));
    }

    /// Exit code 3: querying a stream that was never loaded
    #[test]
    fn test_exit_code_unknown_stream() {
        let dir = TempDir::new().unwrap();
        registry(dir.path())
            .args(["latest", "rhel-99"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("rhel-99"));
    }

    /// Exit code 1: a task failed after the run finished
    #[test]
    fn test_exit_code_task_failure() {
        let dir = TempDir::new().unwrap();
        registry(dir.path())
            .args(["ingest", "404"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("failed"));
    }
}

#[test]
fn test_e2e_latest_lists_ingested_roots() {
    let dir = populated_registry();
    registry(dir.path())
        .args(["latest", "rhel-8.6.0"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("foo"))
        .stdout(predicate::str::contains("bar"));
}

#[test]
fn test_e2e_latest_json_to_file() {
    let dir = populated_registry();
    let output = dir.path().join("latest.json");
    registry(dir.path())
        .args(["latest", "rhel-8.6.0", "--format", "json", "--all", "-o"])
        .arg(&output)
        .assert()
        .code(0);

    let content = std::fs::read_to_string(&output).unwrap();
    let view: serde_json::Value = serde_json::from_str(&content).unwrap();
    let components = view["components"].as_array().unwrap();
    assert!(components.len() >= 2);
    assert!(content.contains("foo-libs"));
}

#[test]
fn test_e2e_manifest_for_stream() {
    let dir = populated_registry();
    registry(dir.path())
        .args(["manifest", "--stream", "rhel-8.6.0"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("\"document_id\""))
        .stdout(predicate::str::contains("urn:uuid:"))
        .stdout(predicate::str::contains("foo"));
}

#[test]
fn test_e2e_taxonomy_of_stream() {
    let dir = populated_registry();
    registry(dir.path())
        .args(["taxonomy", "rhel-8.6.0"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("AppStream-8.6.0.Z.MAIN"));
}

#[test]
fn test_e2e_repair_on_populated_registry() {
    let dir = populated_registry();
    registry(dir.path())
        .args(["repair", "--batch-size", "1"])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("Repair finished"));
}

#[test]
fn test_e2e_delete_build_removes_it_from_latest() {
    let dir = populated_registry();
    registry(dir.path())
        .args(["delete-build", "2"])
        .assert()
        .code(0);
    registry(dir.path())
        .args(["latest", "rhel-8.6.0"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("foo"))
        .stdout(predicate::str::contains("bar").not());

    registry(dir.path())
        .args(["delete-build", "2"])
        .assert()
        .code(3);
}
