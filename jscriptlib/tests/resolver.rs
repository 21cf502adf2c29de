use std::fs;

use jscriptlib::compiler::compile_paths;
use jscriptlib::resolver::{ResolveErrorKind, SourceUnit, default_artifact_path, resolve_sources};

#[test]
fn file_resolves_to_itself() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("main.json");
    fs::write(&file, "{}").expect("write");
    assert_eq!(resolve_sources(&file).expect("resolve"), vec![file]);
}

#[test]
fn directory_resolves_json_files_recursively_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("lib");
    fs::create_dir_all(&nested).expect("mkdir");
    fs::write(dir.path().join("b.json"), "{}").expect("write");
    fs::write(dir.path().join("a.json"), "{}").expect("write");
    fs::write(dir.path().join("notes.txt"), "skip").expect("write");
    fs::write(nested.join("util.json"), "{}").expect("write");

    let found = resolve_sources(dir.path()).expect("resolve");
    assert_eq!(
        found,
        vec![
            dir.path().join("a.json"),
            dir.path().join("b.json"),
            nested.join("util.json"),
        ]
    );
}

#[test]
fn missing_path_and_empty_directory_are_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = resolve_sources(&dir.path().join("nope")).expect_err("missing");
    assert_eq!(err.kind, ResolveErrorKind::NotFound);
    assert!(err.to_string().starts_with("Path not found"));

    let err = resolve_sources(dir.path()).expect_err("empty");
    assert_eq!(err.kind, ResolveErrorKind::NoSources);
}

#[test]
fn default_artifact_path_depends_on_input_kind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("prog.json");
    fs::write(&file, "{}").expect("write");
    assert_eq!(default_artifact_path(&file), dir.path().join("prog.jsc"));
    assert_eq!(default_artifact_path(dir.path()), dir.path().join("output.jsc"));
}

#[test]
fn source_unit_id_is_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("u.json");
    fs::write(&file, "{\"functions\": []}").expect("write");
    let unit = SourceUnit::load(&file).expect("load");
    assert_eq!(unit.id, file.display().to_string());
    assert_eq!(unit.text, "{\"functions\": []}");
}

#[test]
fn compile_paths_links_functions_across_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("main.json"),
        r#"{"namespace": "Main", "functions": [
            {"name": "main", "body": [{"call": {"namespace": "Util", "function": "hello"}}]}
        ]}"#,
    )
    .expect("write");
    fs::write(
        dir.path().join("util.json"),
        r#"{"namespace": "Util", "functions": [
            {"name": "hello", "body": [{"print": {"string": "hello"}}]}
        ]}"#,
    )
    .expect("write");

    let paths = resolve_sources(dir.path()).expect("resolve");
    let compilation = compile_paths(&paths).expect("compile");
    assert_eq!(compilation.functions.len(), 2);
}

#[test]
fn unreadable_source_becomes_a_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("gone.json");
    let diags = compile_paths(&[missing.clone()]).expect_err("missing file");
    let diag = &diags.as_slice()[0];
    assert_eq!(diag.unit, missing.display().to_string());
    assert_eq!(diag.line, 0);
    assert!(diag.message.starts_with("Failed to read source"));
}
