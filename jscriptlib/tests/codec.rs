mod common;

use common::{compile_ok, main_program};
use jscriptlib::bytecode::{CodecError, CompiledFunction, FunctionTable, Opcode, Value};
use jscriptlib::vm::{TestHost, Vm};

fn sample_program() -> String {
    r#"{
  "namespace": "Main",
  "functions": [
    { "name": "half", "params": [{"name": "n", "type": "float"}], "type": "float",
      "body": [{"return": {"divide": ["n", 2]}}] },
    { "name": "main", "locals": [{"name": "p", "type": "*void"}, {"name": "ok", "type": "bool"}],
      "body": [
        {"let": {"name": "p", "value": null}},
        {"let": {"name": "ok", "value": true}},
        {"print": {"add": [{"string": "half: "}, {"call": {"function": "half", "args": {"n": 5}}}]}},
        {"print": "ok"}
      ] }
  ]
}"#
    .to_string()
}

#[test]
fn artifact_round_trip_preserves_table_and_behavior() {
    let functions = compile_ok(&sample_program());
    let bytes = functions.to_bytes().expect("encode");
    let decoded = FunctionTable::from_bytes(&bytes).expect("decode");
    assert_eq!(decoded, functions);

    let main = decoded.get("Main.main").expect("main");
    assert!(main.constants.contains(&Value::pointer(0, "void")));

    let mut host = TestHost::default();
    Vm::new(&decoded, &mut host)
        .run("Main.main", Vec::new())
        .expect("run decoded");
    assert_eq!(host.lines(), vec!["half: 2.5", "true"]);
}

#[test]
fn encoding_is_deterministic_and_sorted_by_name() {
    let functions = compile_ok(&sample_program());
    let first = functions.to_bytes().expect("encode");
    let second = functions.clone().to_bytes().expect("encode again");
    assert_eq!(first, second);

    assert_eq!(&first[..4], &2i32.to_le_bytes());
    // First name is "Main.half": 9-byte LEB128 prefix then the UTF-8 bytes.
    assert_eq!(first[4], 9);
    assert_eq!(&first[5..14], b"Main.half");
}

#[test]
fn long_strings_use_multi_byte_length_prefix() {
    let text = "x".repeat(300);
    let mut functions = FunctionTable::new();
    functions.insert(CompiledFunction {
        name: "Main.main".into(),
        code: vec![Opcode::PushConst.byte(), 0, 0, Opcode::Print.byte(), Opcode::Halt.byte()],
        constants: vec![Value::Str(text.clone())],
        local_count: 0,
        param_count: 0,
    });
    let bytes = functions.to_bytes().expect("encode");
    let needle = [0xAC, 0x02];
    assert!(bytes.windows(2).any(|w| w == needle));
    let decoded = FunctionTable::from_bytes(&bytes).expect("decode");
    assert_eq!(
        decoded.get("Main.main").expect("main").constants,
        vec![Value::Str(text)]
    );
}

#[test]
fn truncated_artifact_reports_eof() {
    let bytes = compile_ok(&sample_program()).to_bytes().expect("encode");
    let err = FunctionTable::from_bytes(&bytes[..bytes.len() - 3]).expect_err("truncated");
    assert!(matches!(err, CodecError::UnexpectedEof(_)), "got {err}");
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = compile_ok(&main_program("[]", "[]")).to_bytes().expect("encode");
    bytes.extend_from_slice(&[1, 2]);
    let err = FunctionTable::from_bytes(&bytes).expect_err("trailing");
    assert!(matches!(err, CodecError::TrailingBytes(2)), "got {err}");
}

#[test]
fn repeated_function_names_are_rejected() {
    let single = compile_ok(&main_program("[]", "[]")).to_bytes().expect("encode");
    let mut bytes = 2i32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&single[4..]);
    bytes.extend_from_slice(&single[4..]);
    let err = FunctionTable::from_bytes(&bytes).expect_err("duplicate");
    assert!(
        matches!(&err, CodecError::DuplicateFunction(name) if name == "Main.main"),
        "got {err}"
    );
}

#[test]
fn negative_counts_and_unknown_tags_are_rejected() {
    let err = FunctionTable::from_bytes(&(-1i32).to_le_bytes()).expect_err("negative");
    assert!(
        matches!(err, CodecError::NegativeCount { what: "function count", value: -1, at: 0 }),
        "got {err}"
    );

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes.push(1);
    bytes.push(b'f');
    for n in [0i32, 0, 0, 1] {
        bytes.extend_from_slice(&n.to_le_bytes());
    }
    bytes.push(9);
    let err = FunctionTable::from_bytes(&bytes).expect_err("tag");
    assert!(matches!(err, CodecError::UnknownTag { tag: 9, .. }), "got {err}");
}

#[test]
fn invalid_utf8_names_are_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes.push(2);
    bytes.extend_from_slice(&[0xC3, 0x28]);
    let err = FunctionTable::from_bytes(&bytes).expect_err("utf8");
    assert!(matches!(err, CodecError::InvalidUtf8(_)), "got {err}");
}

#[test]
fn array_constants_cannot_be_serialized() {
    let mut functions = FunctionTable::new();
    functions.insert(CompiledFunction {
        name: "Main.main".into(),
        code: vec![Opcode::Halt.byte()],
        constants: vec![Value::array(vec![Value::Int(1)])],
        local_count: 0,
        param_count: 0,
    });
    let err = functions.to_bytes().expect_err("array constant");
    assert_eq!(
        err.to_string(),
        "Constant of kind 'array' in 'Main.main' cannot be serialized"
    );
}

#[test]
fn save_and_load_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.jsc");
    let functions = compile_ok(&sample_program());
    functions.save(&path).expect("save");
    let loaded = FunctionTable::load(&path).expect("load");
    assert_eq!(loaded, functions);

    let missing = FunctionTable::load(dir.path().join("missing.jsc")).expect_err("missing");
    assert!(matches!(missing, CodecError::Io(_)));
}

#[test]
fn disassembly_lists_offsets_and_constants() {
    let functions = compile_ok(&main_program("[]", r#"[{"print": {"string": "hi"}}]"#));
    let text = functions.disassemble();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "fn Main.main (params=0, locals=0, constants=1)");
    assert_eq!(lines[1], "  0000 PUSH_CONST 0 ; Str(\"hi\")");
    assert_eq!(lines[2], "  0003 PRINT");
    assert_eq!(lines[3], "  0004 HALT");
}
