use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `brix` running in an empty directory with no configuration from the
/// environment.
fn brix(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("brix").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("BRIX_CONFIG")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_validate_reports_every_template() {
    let dir = TempDir::new().unwrap();
    brix(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("balanced_region ok"))
        .stdout(predicate::str::contains("balanced_api ok"));
}

#[test]
fn test_quiet_validate_prints_nothing() {
    let dir = TempDir::new().unwrap();
    brix(&dir).args(["--quiet", "validate"]).assert().success().stdout(predicate::str::is_empty());
}

#[test]
fn test_show_accepts_short_name() {
    let dir = TempDir::new().unwrap();
    let output = brix(&dir).args(["show", "gateway"]).output().unwrap();
    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["Description"], "NAT gateway configuration.");
    assert!(document["Outputs"].get("Instance").is_some());
}

#[test]
fn test_unknown_template_exits_with_one_line_error() {
    let dir = TempDir::new().unwrap();
    brix(&dir)
        .args(["show", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("error: Unknown template 'nope'\n"));
}

#[test]
fn test_templates_lists_storage_keys() {
    let dir = TempDir::new().unwrap();
    brix(&dir)
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"balanced_az\ttemplates/balanced_az-[0-9a-f]{64}\.json").unwrap());
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("brix.toml"), "bucket = \"static\"\n").unwrap();
    brix(&dir)
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_unknown_region_is_rejected_before_any_call() {
    let dir = TempDir::new().unwrap();
    brix(&dir)
        .args(["--region", "eu-central-1", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown region 'eu-central-1'"));
}
