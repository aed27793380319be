//! CLI tests for the `metafw` `parse`/`check`/`query`/`explain` subcommands.

use std::fs;
use std::process::Command;

use assert_cmd::cargo;

fn metafw_cmd() -> Command {
    Command::new(cargo::cargo_bin!("metafw"))
}

fn write_temp(suffix: &str, content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(format!("test{suffix}"));
    fs::write(&path, content).expect("write temp file");
    (dir, path.to_string_lossy().to_string())
}

#[test]
fn parse_prints_records_as_json_for_a_valid_dsc() {
    let (_dir, path) = write_temp(".dsc", "[Defines]\nPLATFORM_NAME = Sample\n");
    let output = metafw_cmd()
        .args(["--output", "json", "parse", &path])
        .output()
        .expect("run parse command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["dialect"], "D");
    assert_eq!(json["resolved"], false);
    assert!(
        json["records"]
            .as_array()
            .is_some_and(|records| records.iter().any(|r| r["value1"] == "PLATFORM_NAME")),
        "unexpected records: {}",
        json["records"]
    );
}

#[test]
fn parse_of_module_dialect_is_already_resolved() {
    let (_dir, path) = write_temp(
        ".inf",
        "[Defines]\nINF_VERSION = 0x00010005\nBASE_NAME = Sample\n[Sources]\nDriver.c\n",
    );
    let output = metafw_cmd()
        .args(["--output", "json", "parse", &path])
        .output()
        .expect("run parse command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["dialect"], "I");
    assert_eq!(json["resolved"], true);
}

#[test]
fn check_reports_ok_for_a_well_formed_dsc() {
    let (_dir, path) = write_temp(".dsc", "[Defines]\nPLATFORM_NAME = Sample\n");
    let output = metafw_cmd()
        .args(["--output", "json", "check", &path])
        .output()
        .expect("run check command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["ok"], true);
    assert_eq!(json["dialect"], "D");
}

#[test]
fn check_exits_nonzero_on_unbalanced_directive() {
    let (_dir, path) = write_temp(".dsc", "[Defines]\n!endif\nPLATFORM_NAME = A\n");
    let output = metafw_cmd()
        .args(["--output", "json", "check", &path])
        .output()
        .expect("run check command");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["ok"], false);
    assert!(
        json["diagnostics"]
            .as_array()
            .is_some_and(|ds| ds.iter().any(|d| d["id"] == "MF0010")),
        "unexpected diagnostics: {}",
        json["diagnostics"]
    );
}

#[test]
fn syntax_check_alias_behaves_like_check() {
    let (_dir, path) = write_temp(".dsc", "[Defines]\nPLATFORM_NAME = Sample\n");
    let output = metafw_cmd()
        .args(["--output", "json", "syntax-check", &path])
        .output()
        .expect("run syntax-check command");

    assert!(output.status.success());
}

#[test]
fn query_filters_by_model() {
    let (_dir, path) = write_temp(
        ".dsc",
        "[Defines]\nPLATFORM_NAME = Sample\n[SkuIds]\n0|DEFAULT\n",
    );
    let output = metafw_cmd()
        .args(["--output", "json", "query", &path, "--model", "SKU_ID"])
        .output()
        .expect("run query command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["count"], 1);
}

#[test]
fn query_with_pcd_category_suffix_narrows_to_one_category() {
    let (_dir, path) = write_temp(
        ".dsc",
        "[PcdsFixedAtBuild]\ngTS.PcdFoo|1|UINT8\n[PcdsFeatureFlag]\ngTS.PcdBar|TRUE\n",
    );
    let output = metafw_cmd()
        .args([
            "--output",
            "json",
            "query",
            &path,
            "--model",
            "PCD:FixedAtBuild",
        ])
        .output()
        .expect("run query command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["count"], 1);
}

#[test]
fn query_bare_pcd_matches_every_category() {
    let (_dir, path) = write_temp(
        ".dsc",
        "[PcdsFixedAtBuild]\ngTS.PcdFoo|1|UINT8\n[PcdsFeatureFlag]\ngTS.PcdBar|TRUE\n",
    );
    let output = metafw_cmd()
        .args(["--output", "json", "query", &path, "--model", "PCD"])
        .output()
        .expect("run query command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["count"], 2);
}

#[test]
fn query_scope_filters_narrow_to_matching_records() {
    let (_dir, path) = write_temp(
        ".dsc",
        "[Defines.X64]\nPLATFORM_NAME = OnlyX64\n[Defines.IA32]\nPLATFORM_NAME = OnlyIa32\n",
    );
    let output = metafw_cmd()
        .args([
            "--output",
            "json",
            "query",
            &path,
            "--model",
            "HEADER",
            "--arch",
            "X64",
        ])
        .output()
        .expect("run query command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["value2"], "OnlyX64");
}

#[test]
fn explain_known_code_prints_description() {
    let output = metafw_cmd()
        .args(["explain", "MF0010"])
        .output()
        .expect("run explain command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("MF0010") && stdout.contains("unbalanced"),
        "unexpected output: {stdout}"
    );
}

#[test]
fn explain_unknown_code_json_returns_null_explanation() {
    let output = metafw_cmd()
        .args(["--output", "json", "explain", "MF9999"])
        .output()
        .expect("run explain command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(json["code"], "MF9999");
    assert!(json["explanation"].is_null());
}

#[test]
fn missing_file_emits_json_error_envelope() {
    let output = metafw_cmd()
        .args(["--output", "json", "parse", "nope-does-not-exist.dsc"])
        .output()
        .expect("run parse command");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid json envelope");
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "command_failed");
}

#[test]
fn unrecognized_extension_is_a_clean_error_not_a_panic() {
    let (_dir, path) = write_temp(".txt", "irrelevant");
    let output = metafw_cmd()
        .args(["parse", &path])
        .output()
        .expect("run parse command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized extension"), "unexpected stderr: {stderr}");
}
