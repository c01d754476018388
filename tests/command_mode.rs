//! Integration tests for the sheetlink binary

use pretty_assertions::assert_eq;
use std::path::Path;
use std::process::Command;

fn run_in(config_home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_sheetlink"))
        // Tests must not depend on a user's ~/.config/sheetlink/config.toml.
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("SHEETLINK_LOG")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute sheetlink");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_basic_arithmetic() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_in(dir.path(), &["-c", "5 + 3"]);
    assert_eq!(stdout.trim(), "8");
    assert_eq!(code, 0);
}

#[test]
fn test_command_against_loaded_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let data = write(dir.path(), "data.csv", "1\n2\n3\n");
    let (stdout, _, code) = run_in(dir.path(), &[&data, "-c", "=SUM(A1:A3)*2"]);
    assert_eq!(stdout.trim(), "12");
    assert_eq!(code, 0);
}

#[test]
fn test_cross_sheet_cell() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.csv", "=rates!A1*10\n");
    let rates = write(dir.path(), "rates.csv", "0.5\n");
    let (stdout, _, code) = run_in(dir.path(), &[&main, &rates, "-e", "A1"]);
    assert_eq!(stdout.trim(), "5");
    assert_eq!(code, 0);

    let (stdout, _, code) = run_in(dir.path(), &[&main, &rates, "-s", "rates", "-e", "A1"]);
    assert_eq!(stdout.trim(), "0.5");
    assert_eq!(code, 0);
}

#[test]
fn test_error_value_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = write(dir.path(), "loop.csv", "=B1,=A1\n");
    let (stdout, _, code) = run_in(dir.path(), &[&sheet, "-e", "A1"]);
    assert_eq!(stdout.trim(), "#CIRCULAR!");
    assert_eq!(code, 1);

    let (stdout, _, code) = run_in(dir.path(), &["-c", "1/0"]);
    assert_eq!(stdout.trim(), "#DIV/0!");
    assert_eq!(code, 1);
}

#[test]
fn test_prints_resolved_sheet_as_csv() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = write(dir.path(), "sheet.csv", "item,qty\npens,=2*3\n");
    let (stdout, _, code) = run_in(dir.path(), &[&sheet]);
    assert_eq!(stdout, "item,qty\npens,6\n");
    assert_eq!(code, 0);
}

#[test]
fn test_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let sheet = write(dir.path(), "sheet.csv", "2,=A1^3\n");
    let out = dir.path().join("out.csv");
    let (_, _, code) = run_in(
        dir.path(),
        &[&sheet, "-o", out.to_str().unwrap()],
    );
    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "2,8\n");
}

#[test]
fn test_variables_from_config_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "config.toml", "[engine]\ntrigger = \"#\"\n");
    let (stdout, _, code) = run_in(
        dir.path(),
        &["--config", &config, "--var", "x=42", "-c", "#x+1"],
    );
    assert_eq!(stdout.trim(), "43");
    assert_eq!(code, 0);

    let (stdout, _, code) = run_in(dir.path(), &["--config", &config, "-c", "#missing+1"]);
    assert_eq!(stdout.trim(), "#VARIABLE!");
    assert_eq!(code, 1);
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let (_, stderr, code) = run_in(dir.path(), &["--config", missing.to_str().unwrap(), "-c", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Failed to load settings"));
}

#[test]
fn test_invalid_cell_reference() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_in(dir.path(), &["-e", "A0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Invalid cell reference: A0"));
}

#[test]
fn test_unknown_option() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_in(dir.path(), &["--bogus"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown option"));
}
