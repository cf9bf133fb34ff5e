#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `storefleet` isolated to `dir`: its own registry, config, and an empty
/// `PATH` so no real `kubectl`/`helm` is ever reached.
fn storefleet(dir: &TempDir) -> Command {
    let bin_dir = dir.path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();

    let mut cmd = Command::cargo_bin("storefleet").unwrap();
    cmd.current_dir(dir.path())
        .env("STOREFLEET_DB", dir.path().join("stores.db"))
        .env("STOREFLEET_CONFIG", dir.path().join("storefleet.yaml"))
        .env_remove("STOREFLEET_VALUES")
        .env("PATH", &bin_dir)
        .env_remove("RUST_LOG");
    cmd
}

fn use_kubectl_probe(dir: &TempDir) {
    std::fs::write(
        dir.path().join("storefleet.yaml"),
        "readiness:\n  strategy: kubectl\n",
    )
    .unwrap();
}

// ---------------------------------------------------------------------------
// storefleet store
// ---------------------------------------------------------------------------

#[test]
fn list_on_fresh_registry_is_empty() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["store", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stores."));
}

#[test]
fn list_json_on_fresh_registry_is_empty_array() {
    let dir = TempDir::new().unwrap();
    let out = storefleet(&dir)
        .args(["--json", "store", "list"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value, serde_json::json!([]));
}

#[test]
fn create_rejects_blank_name() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["store", "create", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid store name"));

    storefleet(&dir)
        .args(["store", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stores."));
}

#[test]
fn show_unknown_store_fails() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["store", "show", "nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("store not found: nonexistent"));
}

#[test]
fn refresh_unknown_store_fails() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["store", "refresh", "nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("store not found"));
}

#[test]
fn create_without_cluster_tools_records_failure() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["store", "create", "store-demo-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kubectl"));

    let out = storefleet(&dir)
        .args(["--json", "store", "show", "store-demo-2"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let rec: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rec["status"], "Failed");
    assert_eq!(rec["url"], "http://store-demo-2.localtest.me");
    assert!(rec["last_error"].as_str().unwrap().contains("kubectl"));
}

#[test]
fn refresh_probe_failure_is_only_a_warning() {
    let dir = TempDir::new().unwrap();
    use_kubectl_probe(&dir);
    storefleet(&dir)
        .args(["store", "create", "s1"])
        .assert()
        .failure();

    storefleet(&dir)
        .args(["store", "refresh", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Store s1: Failed"))
        .stdout(predicate::str::contains("warning:"));
}

#[test]
fn delete_succeeds_even_when_teardown_fails() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["store", "create", "store-demo-2"])
        .assert()
        .failure();

    let out = storefleet(&dir)
        .args(["--json", "store", "delete", "store-demo-2"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let body: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(body["status"], "deleted");
    assert_eq!(body["store_name"], "store-demo-2");
    assert_eq!(body["teardown_warnings"].as_array().unwrap().len(), 2);

    storefleet(&dir)
        .args(["store", "show", "store-demo-2"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// storefleet config
// ---------------------------------------------------------------------------

#[test]
fn config_show_reflects_overrides() {
    let dir = TempDir::new().unwrap();
    let out = storefleet(&dir)
        .args(["--json", "--values", "custom.yaml", "config", "show"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let cfg: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(cfg["engine"], "woocommerce");
    assert_eq!(cfg["values_file"], "custom.yaml");
    assert!(cfg["registry_path"].as_str().unwrap().ends_with("stores.db"));
}

#[test]
fn config_init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(dir.path().join("storefleet.yaml")).unwrap();
    assert!(written.contains("chart: bitnami/wordpress"));

    storefleet(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn config_validate_defaults_are_clean() {
    let dir = TempDir::new().unwrap();
    storefleet(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_rejects_bad_timeout() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("storefleet.yaml"), "install_timeout: soon\n").unwrap();
    storefleet(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("install_timeout"));
}
