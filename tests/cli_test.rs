//! Integration tests for the vista command line.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("vista");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("interrogate"))
        .stdout(predicate::str::contains("upscale"))
        .stdout(predicate::str::contains("providers"));
}

#[test]
fn test_config_path_honours_flag() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vista.toml");

    let mut cmd = cargo_bin_cmd!("vista");
    cmd.arg("--config").arg(&path).args(["config", "path"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("vista.toml"));
}

#[test]
fn test_config_init_then_show() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vista.toml");

    let mut init = cargo_bin_cmd!("vista");
    init.arg("--config").arg(&path).args(["config", "init"]);
    init.assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.is_file());

    let mut show = cargo_bin_cmd!("vista");
    show.arg("--config").arg(&path).args(["config", "show"]);
    show.assert()
        .success()
        .stdout(predicate::str::contains("[interrogate]"))
        .stdout(predicate::str::contains("clip_dict_limit = 1500"))
        .stdout(predicate::str::contains("[ldsr]"));
}

#[test]
fn test_invalid_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.toml");
    std::fs::write(&path, "[runtime\ndevice = ").unwrap();

    let mut cmd = cargo_bin_cmd!("vista");
    cmd.arg("--config").arg(&path).args(["config", "show"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
}

#[test]
fn test_models_list_json_reports_missing_artifacts() {
    let tmp = TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("vista");
    cmd.arg("--config")
        .arg(tmp.path().join("none.toml"))
        .arg("--models-dir")
        .arg(tmp.path())
        .args(["models", "list", "--json"]);

    let output = cmd.assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let json: Value = serde_json::from_str(&stdout).unwrap();

    let artifacts = json.as_array().unwrap();
    assert_eq!(artifacts.len(), 9);
    assert!(artifacts.iter().all(|a| a["present"] == false));

    let config = artifacts
        .iter()
        .find(|a| a["name"] == "ldsr.config")
        .unwrap();
    assert_eq!(config["downloadable"], true);
}

#[test]
fn test_models_list_marks_present_files() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("blip")).unwrap();
    std::fs::write(tmp.path().join("blip/tokenizer.json"), "{}").unwrap();

    let mut cmd = cargo_bin_cmd!("vista");
    cmd.arg("--config")
        .arg(tmp.path().join("none.toml"))
        .arg("--models-dir")
        .arg(tmp.path())
        .args(["models", "list"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::is_match(r"blip\.tokenizer\s+present").unwrap())
        .stdout(predicate::str::is_match(r"ldsr\.config\s+missing \(downloadable\)").unwrap());
}

#[test]
fn test_interrogate_without_images_fails() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "not an image").unwrap();

    let mut cmd = cargo_bin_cmd!("vista");
    cmd.arg("--config")
        .arg(tmp.path().join("none.toml"))
        .arg("interrogate")
        .arg(tmp.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no valid image files"));
}

#[test]
fn test_upscale_rejects_zero_scale() {
    let mut cmd = cargo_bin_cmd!("vista");
    cmd.args(["upscale", "photo.png", "--scale", "0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("scale must be a positive number"));
}
