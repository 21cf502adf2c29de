#![allow(dead_code)]

use jscriptlib::bytecode::{FunctionTable, Value};
use jscriptlib::compiler::compile_source;
use jscriptlib::diagnostic::DiagnosticBag;
use jscriptlib::vm::{DEFAULT_ENTRY, TestHost, Vm, VmError, VmErrorKind};

/// Wraps a body into a single `Main.main` program with the given locals.
pub fn main_program(locals: &str, body: &str) -> String {
    format!(
        r#"{{
  "namespace": "Main",
  "functions": [
    {{ "name": "main", "locals": {locals}, "body": {body} }}
  ]
}}"#
    )
}

pub fn compile_ok(src: &str) -> FunctionTable {
    match compile_source(src) {
        Ok(functions) => functions,
        Err(diags) => panic!("compile should succeed, got:\n{diags}"),
    }
}

pub fn compile_err(src: &str) -> DiagnosticBag {
    compile_source(src).expect_err("compile should fail")
}

pub fn assert_has_diag(diags: &DiagnosticBag, needle: &str) {
    assert!(
        diags.as_slice().iter().any(|d| d.message.contains(needle)),
        "expected diagnostic containing `{needle}`, got:\n{diags}"
    );
}

/// Runs `Main.main` and returns its value plus everything it printed.
pub fn run_ok(src: &str) -> (Value, TestHost) {
    let functions = compile_ok(src);
    let mut host = TestHost::default();
    let value = Vm::new(&functions, &mut host)
        .run(DEFAULT_ENTRY, Vec::new())
        .expect("vm run");
    (value, host)
}

pub fn run_output(src: &str) -> Vec<String> {
    let (_, host) = run_ok(src);
    host.lines().into_iter().map(str::to_string).collect()
}

pub fn run_err(src: &str) -> VmError {
    let functions = compile_ok(src);
    let mut host = TestHost::default();
    Vm::new(&functions, &mut host)
        .run(DEFAULT_ENTRY, Vec::new())
        .expect_err("vm run should fail")
}

pub fn assert_fault(err: &VmError, kind: VmErrorKind, needle: &str) {
    assert_eq!(err.kind, kind, "unexpected fault: {err}");
    assert!(
        err.message.contains(needle),
        "expected fault containing `{needle}`, got `{err}`"
    );
}
