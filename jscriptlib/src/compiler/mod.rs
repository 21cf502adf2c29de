//! JSON program to bytecode.
//!
//! Compilation runs in two passes over every source unit: pass 1 registers
//! all function signatures, pass 2 lowers each body against the completed
//! signature table. Diagnostics are flushed after each pass; a pass that
//! produced errors stops the compile.

mod context;
mod expr;
mod signature;
mod stmt;

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::bytecode::{FunctionTable, Opcode, Value, ValueKind};
use crate::diagnostic::DiagnosticBag;
use crate::lines::{LineIndex, child_index, child_key};
use crate::resolver::SourceUnit;
use crate::types::TypeInfo;

pub use context::{FunctionCompileContext, LocalInfo};
pub use signature::{
    FunctionParam, FunctionSignature, NATIVE_NAMESPACE, NATIVE_PREFIX, SignatureTable,
};

pub const DEFAULT_NAMESPACE: &str = "Global";
pub const ENTRY_FUNCTION: &str = "main";

pub const RESERVED_WORDS: &[&str] = &[
    "let", "return", "print", "if", "else", "then", "while", "call", "push", "set", "get", "and",
    "or", "eq", "gt", "lt", "add", "subtract", "multiply", "divide", "length", "string", "name",
    "true", "false", "null", "namespace", "function", "params", "locals", "body", "args", "at",
    "value", "type", "condition", "array",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Successful compile output; warnings never block execution.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub functions: FunctionTable,
    pub warnings: DiagnosticBag,
}

/// Compiles a single in-memory document.
pub fn compile_source(source: &str) -> Result<FunctionTable, DiagnosticBag> {
    compile_units(&[SourceUnit::new("<source>", source)]).map(|c| c.functions)
}

pub fn compile_units(units: &[SourceUnit]) -> Result<Compilation, DiagnosticBag> {
    let mut compiler = Compiler::new();
    for unit in units {
        compiler.register_unit(unit);
    }
    compiler.flush()?;
    compiler.compile_registered();
    compiler.finish()
}

/// Reads each path and compiles the lot; unreadable files become diagnostics.
pub fn compile_paths(paths: &[PathBuf]) -> Result<Compilation, DiagnosticBag> {
    let mut compiler = Compiler::new();
    for path in paths {
        match SourceUnit::load(path) {
            Ok(unit) => compiler.register_unit(&unit),
            Err(e) => compiler.diagnostics.error(
                &path.display().to_string(),
                0,
                format!("Failed to read source: {e}"),
            ),
        }
    }
    compiler.flush()?;
    compiler.compile_registered();
    compiler.finish()
}

struct ParsedUnit {
    id: String,
    namespace: String,
    doc: Json,
    lines: LineIndex,
}

pub struct Compiler {
    signatures: SignatureTable,
    functions: FunctionTable,
    diagnostics: DiagnosticBag,
    units: Vec<ParsedUnit>,
    /// Unit that first registered each function.
    origins: HashMap<String, String>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            signatures: SignatureTable::with_natives(),
            functions: FunctionTable::new(),
            diagnostics: DiagnosticBag::new(),
            units: Vec::new(),
            origins: HashMap::new(),
        }
    }

    pub fn signatures(&self) -> &SignatureTable {
        &self.signatures
    }

    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    /// Pass 1: parse the unit and register every function signature it declares.
    pub fn register_unit(&mut self, unit: &SourceUnit) {
        let doc: Json = match serde_json::from_str(&unit.text) {
            Ok(doc) => doc,
            Err(e) => {
                self.diagnostics
                    .error(&unit.id, e.line(), format!("Malformed JSON: {e}"));
                return;
            }
        };
        let lines = LineIndex::build(&unit.text);
        let Some(root) = doc.as_object() else {
            self.diagnostics
                .error(&unit.id, 1, "Source unit must be a JSON object");
            return;
        };
        let namespace = match root.get("namespace") {
            None => DEFAULT_NAMESPACE.to_string(),
            Some(Json::String(ns)) if !ns.is_empty() => ns.clone(),
            Some(_) => {
                self.diagnostics.error(
                    &unit.id,
                    lines.line_of("namespace"),
                    "'namespace' must be a non-empty string",
                );
                return;
            }
        };
        let Some(functions) = root.get("functions").and_then(Json::as_array) else {
            self.diagnostics.error(
                &unit.id,
                lines.line_of("functions"),
                "Source unit has no 'functions' array",
            );
            return;
        };

        let mut registered = 0;
        for (i, decl) in functions.iter().enumerate() {
            let path = child_index("functions", i);
            let mut reg = Registrar {
                unit: &unit.id,
                lines: &lines,
                diags: &mut self.diagnostics,
            };
            let Some(signature) = reg.signature(&namespace, decl, &path) else {
                continue;
            };
            let full_name = signature.name.clone();
            if self.signatures.register(signature) {
                self.origins.insert(full_name, unit.id.clone());
                registered += 1;
            } else {
                let message = match self.origins.get(&full_name) {
                    Some(first) => {
                        format!("Duplicate function '{full_name}'; first defined in {first}")
                    }
                    None => format!("Duplicate function '{full_name}'"),
                };
                self.diagnostics.error(
                    &unit.id,
                    lines.line_of(&child_key(&path, "name")),
                    message,
                );
            }
        }
        debug!(unit = %unit.id, namespace = %namespace, functions = registered, "registered signatures");

        self.units.push(ParsedUnit {
            id: unit.id.clone(),
            namespace,
            doc,
            lines,
        });
    }

    /// Pass 2: lower every function body of every registered unit.
    pub fn compile_registered(&mut self) {
        let units = std::mem::take(&mut self.units);
        for unit in &units {
            let decls = unit
                .doc
                .get("functions")
                .and_then(Json::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (i, decl) in decls.iter().enumerate() {
                self.compile_function(unit, decl, &child_index("functions", i));
            }
        }
        self.units = units;
    }

    /// Flush point: fails with every collected diagnostic if any is an error.
    pub fn flush(&self) -> Result<(), DiagnosticBag> {
        if self.diagnostics.has_errors() {
            return Err(self.diagnostics.clone());
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Compilation, DiagnosticBag> {
        self.flush()?;
        Ok(Compilation {
            functions: self.functions,
            warnings: self.diagnostics,
        })
    }

    fn compile_function(&mut self, unit: &ParsedUnit, decl: &Json, path: &str) {
        let Some(name) = decl.get("name").and_then(Json::as_str) else {
            return;
        };
        let full_name = format!("{}.{}", unit.namespace, name);
        if self.functions.contains(&full_name) {
            self.diagnostics.error(
                &unit.id,
                unit.lines.line_of(path),
                format!("Duplicate function '{full_name}'"),
            );
            return;
        }
        // Declarations that failed pass 1 have no signature.
        let Some(signature) = self.signatures.get(&full_name).cloned() else {
            return;
        };

        let mut ctx = FunctionCompileContext::new(
            full_name.clone(),
            unit.namespace.clone(),
            signature.return_type.clone(),
        );
        for param in &signature.params {
            ctx.declare_param(&param.name, param.ty.clone());
        }

        let mut body = BodyCompiler {
            signatures: &self.signatures,
            diags: &mut self.diagnostics,
            unit: &unit.id,
            lines: &unit.lines,
            ctx,
        };
        if let Some(locals) = decl.get("locals") {
            body.declare_locals(locals, &child_key(path, "locals"));
        }
        let body_path = child_key(path, "body");
        match decl.get("body").and_then(Json::as_array) {
            Some(stmts) => body.compile_block(stmts, &body_path),
            None => body.error(
                path,
                format!("Function '{full_name}' must have a 'body' array"),
            ),
        }
        body.ctx.emit(Opcode::Halt);

        let mut ctx = body.ctx;
        if let Some(message) = ctx.take_overflow() {
            self.diagnostics
                .error(&unit.id, unit.lines.line_of(path), message);
        }
        let function = ctx.finish();
        debug!(
            function = %function.name,
            bytes = function.code.len(),
            constants = function.constants.len(),
            "compiled function"
        );
        self.functions.insert(function);
    }
}

/// Pass-1 helper that turns one declaration into a signature.
struct Registrar<'a> {
    unit: &'a str,
    lines: &'a LineIndex,
    diags: &'a mut DiagnosticBag,
}

impl Registrar<'_> {
    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.diags
            .error(self.unit, self.lines.line_of(path), message);
    }

    fn signature(&mut self, namespace: &str, decl: &Json, path: &str) -> Option<FunctionSignature> {
        let Some(decl) = decl.as_object() else {
            self.error(path, "Function declaration must be an object");
            return None;
        };
        let Some(name) = decl.get("name").and_then(Json::as_str) else {
            self.error(path, "Function declaration is missing a 'name'");
            return None;
        };
        let full_name = format!("{namespace}.{name}");
        if namespace == NATIVE_NAMESPACE {
            self.error(
                path,
                format!("Namespace '{NATIVE_NAMESPACE}' is reserved for native functions"),
            );
            return None;
        }

        let return_type = match decl.get("type") {
            None | Some(Json::Null) => None,
            Some(Json::String(t)) => match TypeInfo::parse(t) {
                Some(ty) => Some(ty),
                None => {
                    self.error(&child_key(path, "type"), format!("Unknown type '{t}'"));
                    return None;
                }
            },
            Some(_) => {
                self.error(&child_key(path, "type"), "'type' must be a string");
                return None;
            }
        };

        let params = self.params(decl, &full_name, path)?;

        if name == ENTRY_FUNCTION {
            if return_type.is_some() {
                self.error(
                    &child_key(path, "type"),
                    format!("'{full_name}' must not declare a return type"),
                );
            }
            let ok = params.is_empty()
                || (params.len() == 1 && params[0].ty == TypeInfo::Array(Some(ValueKind::Str)));
            if !ok {
                self.error(
                    &child_key(path, "params"),
                    format!("'{full_name}' may only take a single 'string[]' parameter"),
                );
            }
        }

        Some(FunctionSignature {
            name: full_name,
            params,
            return_type,
        })
    }

    fn params(
        &mut self,
        decl: &Map<String, Json>,
        full_name: &str,
        path: &str,
    ) -> Option<Vec<FunctionParam>> {
        let params_path = child_key(path, "params");
        let items = match decl.get("params") {
            None => return Some(Vec::new()),
            Some(Json::Array(items)) => items,
            Some(_) => {
                self.error(&params_path, "'params' must be an array");
                return None;
            }
        };

        let mut out: Vec<FunctionParam> = Vec::with_capacity(items.len());
        let mut ok = true;
        for (j, item) in items.iter().enumerate() {
            let p_path = child_index(&params_path, j);
            let Some(name) = item.get("name").and_then(Json::as_str) else {
                self.error(&p_path, "Parameter is missing a 'name'");
                ok = false;
                continue;
            };
            if is_reserved(name) {
                self.error(
                    &child_key(&p_path, "name"),
                    format!("'{name}' is a reserved word and cannot be used as a parameter name"),
                );
                ok = false;
                continue;
            }
            if out.iter().any(|p| p.name == name) {
                self.error(
                    &child_key(&p_path, "name"),
                    format!("Parameter '{name}' is declared twice in '{full_name}'"),
                );
                ok = false;
                continue;
            }
            let ty = match item.get("type").and_then(Json::as_str) {
                None => TypeInfo::Int,
                Some(t) => match TypeInfo::parse(t) {
                    Some(ty) => ty,
                    None => {
                        self.error(&child_key(&p_path, "type"), format!("Unknown type '{t}'"));
                        ok = false;
                        continue;
                    }
                },
            };
            let default = match item.get("default") {
                None => None,
                Some(v) => match literal_value(v) {
                    Some(v) => Some(v),
                    None => {
                        self.error(
                            &child_key(&p_path, "default"),
                            format!("Default value for parameter '{name}' must be a literal"),
                        );
                        ok = false;
                        continue;
                    }
                },
            };
            if default.is_none() && out.iter().any(FunctionParam::has_default) {
                self.diags.warning(
                    self.unit,
                    self.lines.line_of(&p_path),
                    format!(
                        "Parameter '{name}' of '{full_name}' has no default but follows a defaulted parameter"
                    ),
                );
            }
            out.push(FunctionParam {
                name: name.to_string(),
                ty,
                default,
            });
        }
        ok.then_some(out)
    }
}

/// Literal JSON scalar coerced to a constant.
fn literal_value(v: &Json) -> Option<Value> {
    match v {
        Json::Number(n) => Some(number_value(n)),
        Json::String(s) => Some(Value::Str(s.clone())),
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Null => Some(Value::Null),
        Json::Array(_) | Json::Object(_) => None,
    }
}

/// Int when the number fits an `i64`, Float otherwise.
fn number_value(n: &serde_json::Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Pass-2 lowering state for one function body.
pub(crate) struct BodyCompiler<'a> {
    signatures: &'a SignatureTable,
    diags: &'a mut DiagnosticBag,
    unit: &'a str,
    lines: &'a LineIndex,
    ctx: FunctionCompileContext,
}

impl BodyCompiler<'_> {
    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.diags
            .error(self.unit, self.lines.line_of(path), message);
    }

    fn declare_locals(&mut self, locals: &Json, path: &str) {
        let Some(items) = locals.as_array() else {
            self.error(path, "'locals' must be an array");
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let l_path = child_index(path, i);
            let Some(name) = item.get("name").and_then(Json::as_str) else {
                self.error(&l_path, "Local is missing a 'name'");
                continue;
            };
            let name_path = child_key(&l_path, "name");
            if is_reserved(name) {
                self.error(
                    &name_path,
                    format!("'{name}' is a reserved word and cannot be used as a local name"),
                );
                continue;
            }
            if self.ctx.is_param(name) {
                self.error(
                    &name_path,
                    format!("Local '{name}' conflicts with a parameter of the same name"),
                );
                continue;
            }
            if self.ctx.is_declared(name) {
                self.error(&name_path, format!("Local '{name}' is declared twice"));
                continue;
            }
            let Some(t) = item.get("type").and_then(Json::as_str) else {
                self.error(&l_path, format!("Local '{name}' is missing a 'type'"));
                continue;
            };
            let Some(ty) = TypeInfo::parse(t) else {
                self.error(&child_key(&l_path, "type"), format!("Unknown type '{t}'"));
                continue;
            };
            self.ctx.declare_local(name, ty);
        }
    }

    /// Reports every key of `obj` outside `allowed`.
    fn check_fields(&mut self, obj: &Map<String, Json>, allowed: &[&str], what: &str, path: &str) {
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.error(
                    &child_key(path, key),
                    format!("Unknown field '{key}' in {what}"),
                );
            }
        }
    }

    /// Counts travel in one byte.
    fn check_count(&mut self, count: usize, what: &str, path: &str) -> bool {
        if count > u8::MAX as usize {
            self.error(path, format!("Too many {what} ({count}); the limit is 255"));
            return false;
        }
        true
    }
}
