//! Integration tests for the `allquants` binary.
//!
//! These run the built executable against temporary working directories and
//! check exit codes and the text a user would see. Nothing here touches the
//! network or needs llama.cpp.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn allquants(base_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_allquants"))
        .arg("--base-dir")
        .arg(base_dir)
        .args(args)
        .env_remove("HF_TOKEN")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run allquants")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_types_lists_catalog() {
    let temp = TempDir::new().unwrap();
    let output = allquants(temp.path(), &["types"]);

    assert!(output.status.success());
    let text = stdout(&output);
    for name in ["Q2_K", "Q4_K_M", "Q8_0", "Recommended For"] {
        assert!(text.contains(name), "missing {name} in:\n{text}");
    }
}

#[test]
fn test_show_types_skips_workflow() {
    let temp = TempDir::new().unwrap();
    let output = allquants(temp.path(), &["quantize", "org/small-model", "--show-types"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Q5_K_M"));
    assert!(!temp.path().join("models").exists());
}

#[test]
fn test_malformed_model_id_exits_with_failure() {
    let temp = TempDir::new().unwrap();
    let output = allquants(temp.path(), &["quantize", "no-namespace", "--non-interactive"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Model name must be in format 'organization/model-name'"));
    assert!(!temp.path().join("models").exists());
}

#[test]
fn test_unsafe_type_name_exits_before_download() {
    let temp = TempDir::new().unwrap();
    let output = allquants(
        temp.path(),
        &["quantize", "org/m", "--types", "Q8_0", "../../x", "--no-upload", "--non-interactive"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("'../../x' is not a valid quantization type name"));
    assert!(!temp.path().join("models").exists());
}

#[test]
fn test_convert_requires_existing_model_dir() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("models/org_m");
    let output = allquants(temp.path(), &["convert", missing.to_str().unwrap(), "org/m"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("File not found"));
}

#[test]
fn test_convert_without_script_is_a_precondition_failure() {
    let temp = TempDir::new().unwrap();
    let model_dir = temp.path().join("models/org_m");
    std::fs::create_dir_all(&model_dir).unwrap();

    let output = allquants(temp.path(), &["convert", model_dir.to_str().unwrap(), "org/m"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("convert.py"));
    assert!(stdout(&output).contains("allquants setup"));
}

#[test]
fn test_setup_reports_but_never_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("TEMPLATE.md"), "# {{base_model}}").unwrap();

    let output = allquants(temp.path(), &["setup"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("convert.py missing"));
    assert!(text.contains("TEMPLATE.md found"));
    assert!(text.contains("llama.cpp.bin directory not found"));
    assert!(text.contains("Setup check complete"));
}
