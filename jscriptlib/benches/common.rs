use jscriptlib::bytecode::{FunctionTable, Value};
use jscriptlib::compiler::{compile_source, compile_units};
use jscriptlib::resolver::SourceUnit;
use jscriptlib::vm::{DEFAULT_ENTRY, Host, Vm, VmError};

/// Discards output so benches measure the interpreter, not stdout.
pub struct NullHost;

impl Host for NullHost {
    fn print(&mut self, _text: &str) -> Result<(), VmError> {
        Ok(())
    }
}

pub fn src_loop_accumulate(iters: usize) -> String {
    format!(
        r#"{{
  "namespace": "Main",
  "functions": [
    {{ "name": "main",
      "locals": [{{"name": "i", "type": "int"}}, {{"name": "acc", "type": "int"}}],
      "body": [
        {{"let": {{"name": "i", "value": 0}}}},
        {{"let": {{"name": "acc", "value": 0}}}},
        {{"while": {{"condition": {{"lt": ["i", {iters}]}}, "body": [
            {{"let": {{"name": "acc", "value": {{"add": ["acc", "i"]}}}}}},
            {{"let": {{"name": "i", "value": {{"add": ["i", 1]}}}}}}
        ]}}}},
        {{"print": "acc"}}
      ] }}
  ]
}}"#
    )
}

pub fn src_function_call_chain(iters: usize) -> String {
    format!(
        r#"{{
  "namespace": "Main",
  "functions": [
    {{ "name": "inc", "params": [{{"name": "x"}}], "type": "int",
      "body": [{{"return": {{"add": ["x", 1]}}}}] }},
    {{ "name": "twice", "params": [{{"name": "x"}}], "type": "int",
      "body": [{{"return": {{"call": {{"function": "inc",
                 "args": {{"x": {{"call": {{"function": "inc", "args": {{"x": "x"}}}}}}}}}}}}}}] }},
    {{ "name": "main",
      "locals": [{{"name": "i", "type": "int"}}, {{"name": "acc", "type": "int"}}],
      "body": [
        {{"let": {{"name": "i", "value": 0}}}},
        {{"let": {{"name": "acc", "value": 0}}}},
        {{"while": {{"condition": {{"lt": ["i", {iters}]}}, "body": [
            {{"let": {{"name": "acc", "value": {{"call": {{"function": "twice", "args": {{"x": "acc"}}}}}}}}}},
            {{"let": {{"name": "i", "value": {{"add": ["i", 1]}}}}}}
        ]}}}},
        {{"print": "acc"}}
      ] }}
  ]
}}"#
    )
}

pub fn src_array_workload(iters: usize) -> String {
    format!(
        r#"{{
  "namespace": "Main",
  "functions": [
    {{ "name": "main",
      "locals": [{{"name": "i", "type": "int"}}, {{"name": "acc", "type": "int"}},
                 {{"name": "xs", "type": "int[]"}}],
      "body": [
        {{"let": {{"name": "i", "value": 0}}}},
        {{"let": {{"name": "acc", "value": 0}}}},
        {{"let": {{"name": "xs", "value": [0]}}}},
        {{"while": {{"condition": {{"lt": ["i", {iters}]}}, "body": [
            {{"push": {{"array": "xs", "value": "i"}}}},
            {{"set": {{"array": "xs", "at": 0, "value": "i"}}}},
            {{"let": {{"name": "acc", "value": {{"add": ["acc", {{"get": {{"array": "xs", "at": 0}}}}]}}}}}},
            {{"let": {{"name": "i", "value": {{"add": ["i", 1]}}}}}}
        ]}}}},
        {{"print": {{"length": "xs"}}}}
      ] }}
  ]
}}"#
    )
}

pub fn src_string_workload(iters: usize) -> String {
    format!(
        r#"{{
  "namespace": "Main",
  "functions": [
    {{ "name": "main",
      "locals": [{{"name": "i", "type": "int"}}, {{"name": "s", "type": "string"}}],
      "body": [
        {{"let": {{"name": "i", "value": 0}}}},
        {{"let": {{"name": "s", "value": {{"string": ""}}}}}},
        {{"while": {{"condition": {{"lt": ["i", {iters}]}}, "body": [
            {{"let": {{"name": "s", "value": {{"add": ["s", "i"]}}}}}},
            {{"let": {{"name": "i", "value": {{"add": ["i", 1]}}}}}}
        ]}}}},
        {{"print": {{"length": "s"}}}}
      ] }}
  ]
}}"#
    )
}

/// The same program split across one unit per function namespace.
pub fn units_for(count: usize) -> Vec<SourceUnit> {
    let mut units: Vec<SourceUnit> = (0..count)
        .map(|n| {
            SourceUnit::new(
                format!("lib{n}.json"),
                format!(
                    r#"{{"namespace": "Lib{n}", "functions": [
                        {{"name": "value", "type": "int", "body": [{{"return": {{"multiply": [{n}, 2]}}}}]}}
                    ]}}"#
                ),
            )
        })
        .collect();
    units.push(SourceUnit::new(
        "main.json",
        src_loop_accumulate(10),
    ));
    units
}

pub fn compile_table(src: &str) -> FunctionTable {
    compile_source(src).expect("compile bench source")
}

pub fn compile_many(units: &[SourceUnit]) -> FunctionTable {
    compile_units(units).expect("compile bench units").functions
}

pub fn run_vm(functions: &FunctionTable) -> Value {
    let mut host = NullHost;
    Vm::new(functions, &mut host)
        .run(DEFAULT_ENTRY, Vec::new())
        .expect("run bench program")
}
