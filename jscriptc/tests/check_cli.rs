use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use jscriptlib::bytecode::FunctionTable;
use tempfile::TempDir;

const HELLO: &str = r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main", "body": [{"print": {"string": "hello"}}] }
  ]
}"#;

const UNDEFINED: &str = r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main",
      "body": [
        {"print": "missing"}
      ] }
  ]
}"#;

#[test]
fn check_valid_program_returns_zero() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "hello.json", HELLO);

    let output = jscriptc(&["check", path_str(&file)]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok:"), "stdout: {stdout}");
}

#[test]
fn check_reports_diagnostics_with_unit_and_line() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "bad.json", UNDEFINED);

    let output = jscriptc(&["check", path_str(&file)]);
    assert_eq!(output.status.code(), Some(11));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[E-COMPILE][compile]"), "stderr: {stderr}");
    assert!(
        stderr.contains("bad.json:6: Undefined variable 'missing'"),
        "stderr: {stderr}"
    );
}

#[test]
fn check_missing_path_is_an_io_failure() {
    let output = jscriptc(&["check", "does_not_exist.json"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Path not found"), "stderr: {stderr}");
}

#[test]
fn no_arguments_is_a_usage_error() {
    let output = jscriptc(&[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
}

#[test]
fn unknown_command_is_a_usage_error() {
    let output = jscriptc(&["wat"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn build_writes_artifact_next_to_source() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "hello.json", HELLO);

    let output = jscriptc(&["build", path_str(&file)]);
    assert_eq!(output.status.code(), Some(0));
    let artifact = tmp.path().join("hello.jsc");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Built:"), "stdout: {stdout}");
    assert!(stdout.contains("hello.jsc"), "stdout: {stdout}");

    let table = FunctionTable::load(&artifact).expect("load artifact");
    assert!(table.contains("Main.main"));
}

#[test]
fn build_directory_defaults_to_output_jsc_and_links_units() {
    let tmp = TempDir::new().expect("temp dir");
    write(
        tmp.path(),
        "main.json",
        r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main", "body": [
        {"call": {"namespace": "Util", "function": "greet"}}
    ] }
  ]
}"#,
    );
    fs::create_dir(tmp.path().join("lib")).expect("mkdir");
    write(
        &tmp.path().join("lib"),
        "util.json",
        r#"{
  "namespace": "Util",
  "functions": [
    { "name": "greet", "body": [{"print": {"string": "hi"}}] }
  ]
}"#,
    );

    let output = jscriptc(&["build", path_str(tmp.path())]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let table = FunctionTable::load(tmp.path().join("output.jsc")).expect("load");
    assert!(table.contains("Main.main"));
    assert!(table.contains("Util.greet"));
}

#[test]
fn build_honours_output_flag_and_rejects_missing_entry() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "hello.json", HELLO);
    let out = tmp.path().join("custom.jsc");

    let output = jscriptc(&["build", path_str(&file), "-o", path_str(&out)]);
    assert_eq!(output.status.code(), Some(0));
    assert!(out.exists());

    let output = jscriptc(&["build", path_str(&file), "--entry", "Main.start"]);
    assert_eq!(output.status.code(), Some(11));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Entry point 'Main.start' not found"),
        "stderr: {stderr}"
    );
}

#[test]
fn disasm_accepts_source_and_artifact() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "hello.json", HELLO);

    let from_source = jscriptc(&["disasm", path_str(&file)]);
    assert_eq!(from_source.status.code(), Some(0));
    let text = String::from_utf8_lossy(&from_source.stdout).to_string();
    assert!(text.contains("fn Main.main"), "disasm: {text}");
    assert!(text.contains("PRINT"), "disasm: {text}");
    assert!(text.contains("HALT"), "disasm: {text}");

    let build = jscriptc(&["build", path_str(&file)]);
    assert_eq!(build.status.code(), Some(0));
    let artifact = tmp.path().join("hello.jsc");
    let from_artifact = jscriptc(&["disasm", path_str(&artifact)]);
    assert_eq!(from_artifact.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&from_artifact.stdout), text);
}

#[test]
fn disasm_of_corrupt_artifact_is_a_decode_failure() {
    let tmp = TempDir::new().expect("temp dir");
    let artifact = tmp.path().join("bad.jsc");
    fs::write(&artifact, [1u8, 0, 0]).expect("write");

    let output = jscriptc(&["disasm", path_str(&artifact)]);
    assert_eq!(output.status.code(), Some(13));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to decode"), "stderr: {stderr}");
}

fn jscriptc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jscriptc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run jscriptc")
}

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write fixture");
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}
