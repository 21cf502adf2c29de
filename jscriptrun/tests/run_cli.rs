use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use jscriptlib::compiler::compile_source;
use tempfile::TempDir;

const COUNTDOWN: &str = r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main", "locals": [{"name": "i", "type": "int"}], "body": [
        {"let": {"name": "i", "value": 3}},
        {"while": {"condition": {"gt": ["i", 0]}, "body": [
            {"print": "i"},
            {"let": {"name": "i", "value": {"subtract": ["i", 1]}}}
        ]}}
    ] }
  ]
}"#;

const ECHO_ARGS: &str = r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main", "params": [{"name": "argv", "type": "string[]"}], "body": [
        {"print": {"length": "argv"}},
        {"print": "argv"}
    ] }
  ]
}"#;

const MEMORY: &str = r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main",
      "locals": [{"name": "p", "type": "*void"}, {"name": "v", "type": "int"}],
      "body": [
        {"alloc": {"size": 8, "into": "p"}},
        {"memwrite": {"ptr": "p", "value": 77, "type": "int32"}},
        {"memread": {"ptr": "p", "type": "int32", "into": "v"}},
        {"print": "v"},
        {"free": "p"}
      ] }
  ]
}"#;

#[test]
fn run_source_prints_to_stdout() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "countdown.json", COUNTDOWN);

    let output = jscriptrun(&["run", path_str(&file)]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "3\n2\n1\n");
}

#[test]
fn run_passes_trailing_arguments_to_main() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "echo.json", ECHO_ARGS);

    let output = jscriptrun(&["run", path_str(&file), "a", "--b"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n[a, --b]\n");
}

#[test]
fn run_with_custom_entry() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(
        tmp.path(),
        "tool.json",
        r#"{
  "namespace": "Tool",
  "functions": [
    { "name": "start", "body": [{"print": {"string": "started"}}] }
  ]
}"#,
    );

    let output = jscriptrun(&["run", path_str(&file), "--entry", "Tool.start"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "started\n");

    let output = jscriptrun(&["run", path_str(&file)]);
    assert_eq!(output.status.code(), Some(12));
    assert!(stderr(&output).contains("Runtime error: [E-VM-ENTRY] Entry point 'Main.main' not found"));
}

#[test]
fn runtime_fault_exits_with_runtime_code() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(
        tmp.path(),
        "oob.json",
        r#"{
  "namespace": "Main",
  "functions": [
    { "name": "main", "locals": [{"name": "xs", "type": "int[]"}], "body": [
        {"let": {"name": "xs", "value": [1, 2]}},
        {"print": {"get": {"array": "xs", "at": 5}}}
    ] }
  ]
}"#,
    );

    let output = jscriptrun(&["run", path_str(&file)]);
    assert_eq!(output.status.code(), Some(12));
    let err = stderr(&output);
    assert!(err.contains("[E-VM-INDEX-OOB]"), "stderr: {err}");
    assert!(err.contains("Array index 5 out of bounds (length 2)"), "stderr: {err}");
}

#[test]
fn compile_errors_exit_with_compile_code() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(
        tmp.path(),
        "bad.json",
        r#"{
  "namespace": "Main",
  "functions": [{ "name": "main", "body": [{"print": "nope"}] }]
}"#,
    );

    let output = jscriptrun(&["run", path_str(&file)]);
    assert_eq!(output.status.code(), Some(11));
    assert!(stderr(&output).contains("Undefined variable 'nope'"));
}

#[test]
fn memory_requires_opt_in() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "mem.json", MEMORY);

    let denied = jscriptrun(&["run", path_str(&file)]);
    assert_eq!(denied.status.code(), Some(12));
    assert!(stderr(&denied).contains("[E-VM-CAPABILITY]"));

    let allowed = jscriptrun(&["run", "--allow-memory", path_str(&file)]);
    assert_eq!(allowed.status.code(), Some(0), "{}", stderr(&allowed));
    assert_eq!(String::from_utf8_lossy(&allowed.stdout), "77\n");
}

#[test]
fn exec_runs_a_saved_artifact() {
    let tmp = TempDir::new().expect("temp dir");
    let artifact = tmp.path().join("countdown.jsc");
    compile_source(COUNTDOWN)
        .expect("compile")
        .save(&artifact)
        .expect("save");

    let output = jscriptrun(&["exec", path_str(&artifact)]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "3\n2\n1\n");
}

#[test]
fn exec_rejects_corrupt_and_missing_artifacts() {
    let tmp = TempDir::new().expect("temp dir");
    let artifact = tmp.path().join("bad.jsc");
    fs::write(&artifact, [0xFFu8, 0xFF, 0xFF, 0xFF]).expect("write");

    let corrupt = jscriptrun(&["exec", path_str(&artifact)]);
    assert_eq!(corrupt.status.code(), Some(13));
    assert!(stderr(&corrupt).contains("Failed to load"));

    let missing = jscriptrun(&["exec", "does_not_exist.jsc"]);
    assert_eq!(missing.status.code(), Some(3));
}

#[test]
fn debug_dumps_bytecode_to_stderr_only() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(tmp.path(), "countdown.json", COUNTDOWN);

    let output = jscriptrun(&["run", "--debug", path_str(&file)]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "3\n2\n1\n");
    let err = stderr(&output);
    assert!(err.contains("fn Main.main"), "stderr: {err}");
    assert!(err.contains("JMP_IF_FALSE"), "stderr: {err}");
}

#[test]
fn debug_traces_every_executed_opcode() {
    let tmp = TempDir::new().expect("temp dir");
    let file = write(
        tmp.path(),
        "one.json",
        r#"{
  "namespace": "Main",
  "functions": [{ "name": "main", "body": [{"print": 1}] }]
}"#,
    );

    let output = jscriptrun(&["run", "--debug", path_str(&file)]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1\n");
    let err = stderr(&output);
    let traced: Vec<&str> = err.lines().filter(|l| l.contains("TRACE")).collect();
    assert!(
        traced.iter().any(|l| l.contains("\"PUSH_CONST\"")),
        "stderr: {err}"
    );
    assert!(traced.iter().any(|l| l.contains("\"PRINT\"")), "stderr: {err}");
    assert!(traced.iter().any(|l| l.contains("\"HALT\"")), "stderr: {err}");
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let output = jscriptrun(&[]);
    assert_eq!(output.status.code(), Some(2));
}

fn jscriptrun(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jscriptrun"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run jscriptrun")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write fixture");
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}
