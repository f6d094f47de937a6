use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn diskfill() -> Command {
    Command::cargo_bin("diskfill").unwrap()
}

/// Helper: a config with a small pool so runs start quickly
fn small_pool_config(dir: &TempDir) -> String {
    let path = dir.path().join("fill.toml");
    fs::write(
        &path,
        "[pool]\ntable_size = 64\nbuffer_len = 512\n\n[fill]\nwindow_size = 4\n",
    )
    .unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_missing_args_exit_1() {
    diskfill().assert().code(1);
    diskfill().arg("1").assert().code(1);
}

#[test]
fn test_invalid_count_exit_1() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fill.dat");

    diskfill().arg("0").arg(&target).assert().code(1);
    diskfill().arg("many").arg(&target).assert().code(1);
    assert!(!target.exists());
}

#[test]
fn test_invalid_size_exit_1() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fill.dat");

    diskfill().arg("1").arg(&target).arg("0").assert().code(1);
    diskfill().arg("1").arg(&target).arg("lots").assert().code(1);
    assert!(!target.exists());
}

#[test]
fn test_existing_target_exit_1_without_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fill.dat");
    fs::write(&target, b"keep me").unwrap();

    diskfill()
        .arg("1")
        .arg(&target)
        .arg("1024")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read(&target).unwrap(), b"keep me");
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_parent_exit_1() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("nope").join("fill.dat");

    diskfill()
        .arg("1")
        .arg(&target)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid parent directory"));

    assert!(!temp_dir.path().join("nope").exists());
}

#[test]
fn test_bad_config_exit_1() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("fill.toml");
    fs::write(&config, "[pool]\nbuffer_len = 0\n").unwrap();
    let target = temp_dir.path().join("fill.dat");

    diskfill()
        .arg("--config")
        .arg(&config)
        .arg("1")
        .arg(&target)
        .arg("1024")
        .assert()
        .code(1);
    assert!(!target.exists());
}

#[test]
fn test_fill_keeps_only_final_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = small_pool_config(&temp_dir);
    let target = temp_dir.path().join("fill.dat");

    diskfill()
        .arg("--config")
        .arg(&config)
        .arg("2")
        .arg(&target)
        .arg("10000")
        .assert()
        .success()
        .stderr(predicate::str::contains("fill step 1 removes file"))
        .stderr(predicate::str::contains("fill step 2 (final) keeps file"));

    assert_eq!(fs::metadata(&target).unwrap().len(), 10000);
}

#[test]
fn test_fill_with_unit_suffix() {
    let temp_dir = TempDir::new().unwrap();
    let config = small_pool_config(&temp_dir);
    let target = temp_dir.path().join("fill.dat");

    diskfill()
        .arg("-c")
        .arg(&config)
        .arg("1")
        .arg(&target)
        .arg("3KiB")
        .assert()
        .success();

    assert_eq!(fs::metadata(&target).unwrap().len(), 3 * 1024);
}
