use serde_json::{Map, Value as Json};

use super::{BodyCompiler, LocalInfo, number_value};
use crate::bytecode::{Opcode, Value};
use crate::lines::{child_index, child_key};
use crate::types::TypeInfo;

const EXPRESSION_KINDS: &[&str] = &[
    "string", "call", "get", "not", "negate", "length", "name", "and", "or", "add", "subtract",
    "multiply", "divide", "modulo", "eq", "gt", "lt",
];

fn operator_opcode(kind: &str) -> Option<Opcode> {
    Some(match kind {
        "add" => Opcode::Add,
        "subtract" => Opcode::Sub,
        "multiply" => Opcode::Mul,
        "divide" => Opcode::Div,
        "modulo" => Opcode::Mod,
        "eq" => Opcode::Eq,
        "gt" => Opcode::Gt,
        "lt" => Opcode::Lt,
        "and" => Opcode::And,
        "or" => Opcode::Or,
        _ => return None,
    })
}

fn is_arithmetic(kind: &str) -> bool {
    matches!(kind, "add" | "subtract" | "multiply" | "divide" | "modulo")
}

fn expression_kind(obj: &Map<String, Json>) -> Option<&'static str> {
    EXPRESSION_KINDS.iter().copied().find(|k| obj.contains_key(*k))
}

impl BodyCompiler<'_> {
    pub(super) fn compile_expr(&mut self, expr: &Json, path: &str) {
        match expr {
            Json::Number(n) => self.ctx.emit_const(number_value(n)),
            Json::String(name) => self.load_local(name, path),
            Json::Bool(b) => self.ctx.emit_const(Value::Bool(*b)),
            Json::Null => self.ctx.emit_const(Value::Null),
            Json::Array(items) => self.compile_array_literal(items, path),
            Json::Object(obj) => self.compile_object_expr(obj, path),
        }
    }

    fn compile_array_literal(&mut self, items: &[Json], path: &str) {
        if !self.check_count(items.len(), "array elements", path) {
            return;
        }
        let mut first: Option<TypeInfo> = None;
        for (i, item) in items.iter().enumerate() {
            let Some(found) = self.infer_type(item) else {
                continue;
            };
            match &first {
                None => first = Some(found),
                Some(expected) => {
                    if !expected.accepts(&found) {
                        self.error(
                            &child_index(path, i),
                            format!("Array literal mixes '{expected}' and '{found}' elements"),
                        );
                    }
                }
            }
        }
        for (i, item) in items.iter().enumerate() {
            self.compile_expr(item, &child_index(path, i));
        }
        self.ctx.emit_count(Opcode::MakeArray, items.len());
    }

    fn compile_object_expr(&mut self, obj: &Map<String, Json>, path: &str) {
        let Some(kind) = expression_kind(obj) else {
            let found = obj.keys().next().map(String::as_str).unwrap_or("<empty>");
            self.error(path, format!("Unknown expression kind '{found}'"));
            return;
        };
        let allowed: &[&str] = if kind == "call" { &["call", "args"] } else { &[kind] };
        self.check_fields(obj, allowed, &format!("'{kind}' expression"), path);

        let operand = &obj[kind];
        let at = child_key(path, kind);
        match kind {
            "string" => match operand {
                Json::String(s) => self.ctx.emit_const(Value::Str(s.clone())),
                _ => self.error(&at, "'string' expects a string literal"),
            },
            "call" => self.compile_call(operand, obj.get("args"), &at, true),
            "get" => self.compile_get(operand, &at),
            "not" => {
                self.compile_expr(operand, &at);
                self.ctx.emit(Opcode::Not);
            }
            "negate" => {
                if self.infer_type(operand) == Some(TypeInfo::Bool) {
                    self.error(&at, "Cannot use bool in 'negate' expression");
                }
                self.compile_expr(operand, &at);
                self.ctx.emit(Opcode::Neg);
            }
            "length" => self.compile_length(operand, &at),
            "name" => match operand {
                Json::String(name) => self.load_local(name, &at),
                _ => self.error(&at, "'name' expects a variable name"),
            },
            _ => self.compile_operator(kind, operand, &at),
        }
    }

    fn compile_operator(&mut self, kind: &str, operand: &Json, path: &str) {
        let Some(op) = operator_opcode(kind) else {
            return;
        };
        let operands: &[Json] = match operand {
            Json::Array(items) => items,
            _ if matches!(kind, "and" | "or") => {
                self.error(path, format!("'{kind}' expects an array of operands"));
                return;
            }
            scalar => std::slice::from_ref(scalar),
        };
        if operands.is_empty() {
            self.error(path, format!("'{kind}' requires at least one operand"));
            return;
        }
        if !self.check_count(operands.len(), "operands", path) {
            return;
        }
        for (i, item) in operands.iter().enumerate() {
            let item_path = child_index(path, i);
            if is_arithmetic(kind) && self.infer_type(item) == Some(TypeInfo::Bool) {
                self.error(&item_path, format!("Cannot use bool in '{kind}' expression"));
            }
            self.compile_expr(item, &item_path);
        }
        self.ctx.emit_count(op, operands.len());
    }

    fn compile_get(&mut self, operand: &Json, path: &str) {
        let Some(obj) = operand.as_object() else {
            self.error(path, "'get' expects an object with 'array' and 'at'");
            return;
        };
        self.check_fields(obj, &["array", "at"], "'get'", path);
        let Some(array) = obj.get("array").and_then(Json::as_str) else {
            self.error(path, "'get' requires an 'array' name");
            return;
        };
        let Some(at) = obj.get("at") else {
            self.error(path, "'get' requires an 'at' index");
            return;
        };
        let Some(local) = self.array_local(array, &child_key(path, "array")) else {
            return;
        };
        self.ctx.emit_u16(Opcode::LoadLocal, local.slot);
        self.compile_expr(at, &child_key(path, "at"));
        self.ctx.emit(Opcode::ArrayGet);
    }

    fn compile_length(&mut self, operand: &Json, path: &str) {
        if let Json::String(name) = operand {
            if let Some(local) = self.ctx.local(name) {
                if !matches!(local.ty, TypeInfo::Array(_) | TypeInfo::Str) {
                    let message = format!("Variable '{name}' does not have a length");
                    self.error(path, message);
                    return;
                }
            }
        }
        self.compile_expr(operand, path);
        self.ctx.emit(Opcode::ArrayLen);
    }

    pub(super) fn load_local(&mut self, name: &str, path: &str) {
        let Some(local) = self.ctx.local(name) else {
            self.error(path, format!("Undefined variable '{name}'"));
            return;
        };
        let slot = local.slot;
        if !self.ctx.is_assigned(name) {
            self.error(path, format!("Variable '{name}' is used before being assigned"));
            return;
        }
        self.ctx.emit_u16(Opcode::LoadLocal, slot);
    }

    /// Resolves an array-typed, assigned local for `get`/`set`/`push`.
    pub(super) fn array_local(&mut self, name: &str, path: &str) -> Option<LocalInfo> {
        let Some(local) = self.ctx.local(name).cloned() else {
            self.error(path, format!("Undefined variable '{name}'"));
            return None;
        };
        if !matches!(local.ty, TypeInfo::Array(_)) {
            self.error(path, format!("Variable '{name}' is not an array"));
            return None;
        }
        if !self.ctx.is_assigned(name) {
            self.error(path, format!("Variable '{name}' is used before being assigned"));
            return None;
        }
        Some(local)
    }

    pub(super) fn compile_call(&mut self, call: &Json, sibling_args: Option<&Json>, path: &str, as_expression: bool) {
        let Some(obj) = call.as_object() else {
            self.error(path, "'call' expects an object with 'namespace' and 'function'");
            return;
        };
        self.check_fields(obj, &["namespace", "function", "args"], "'call'", path);
        let Some(function) = obj.get("function").and_then(Json::as_str) else {
            self.error(path, "'call' requires a 'function' name");
            return;
        };
        let namespace = obj
            .get("namespace")
            .and_then(Json::as_str)
            .unwrap_or(&self.ctx.namespace)
            .to_string();
        let full_name = format!("{namespace}.{function}");
        let signatures = self.signatures;
        let Some(signature) = signatures.get(&full_name) else {
            self.error(path, format!("Unknown function '{full_name}'"));
            return;
        };
        if as_expression && signature.is_void() {
            self.error(
                path,
                format!("'{full_name}' is void and cannot be used as an expression"),
            );
            return;
        }

        let (args, args_path) = match (obj.get("args"), sibling_args) {
            (Some(_), Some(_)) => {
                self.error(path, format!("Arguments for '{full_name}' are given twice"));
                return;
            }
            (Some(inner), None) => (Some(inner), child_key(path, "args")),
            (None, Some(outer)) => (Some(outer), sibling_args_path(path)),
            (None, None) => (None, path.to_string()),
        };
        let empty = Map::new();
        let args = match args {
            None | Some(Json::Null) => &empty,
            Some(Json::Object(named)) => named,
            Some(_) => {
                self.error(&args_path, format!("'args' for '{full_name}' must be an object"));
                return;
            }
        };

        let params = signature.params.clone();
        for name in args.keys() {
            if !params.iter().any(|p| &p.name == name) {
                self.error(
                    &child_key(&args_path, name),
                    format!("'{full_name}' has no parameter named '{name}'"),
                );
            }
        }
        if !self.check_count(params.len(), "arguments", path) {
            return;
        }

        for param in &params {
            match args.get(&param.name) {
                Some(arg) => {
                    let arg_path = child_key(&args_path, &param.name);
                    if let Some(found) = self.infer_type(arg) {
                        if !param.ty.accepts(&found) {
                            self.error(
                                &arg_path,
                                format!(
                                    "Argument '{}' of '{full_name}' expects '{}' but got '{found}'",
                                    param.name, param.ty
                                ),
                            );
                        }
                    }
                    self.compile_expr(arg, &arg_path);
                }
                None => match &param.default {
                    Some(default) => self.ctx.emit_const(default.clone()),
                    None => self.error(
                        path,
                        format!("'{full_name}' is missing required argument '{}'", param.name),
                    ),
                },
            }
        }
        self.ctx.emit_const(Value::Str(full_name));
        self.ctx.emit_count(Opcode::Call, params.len());
    }

    /// Static type of an expression, or `None` when it cannot be known.
    pub(super) fn infer_type(&self, expr: &Json) -> Option<TypeInfo> {
        match expr {
            Json::Number(n) => Some(if n.as_i64().is_some() {
                TypeInfo::Int
            } else {
                TypeInfo::Float
            }),
            Json::Bool(_) => Some(TypeInfo::Bool),
            Json::Array(items) => {
                let elem = items
                    .first()
                    .and_then(|first| self.infer_type(first))
                    .map(|t| t.kind());
                Some(TypeInfo::Array(elem))
            }
            Json::String(name) => self.ctx.local(name).map(|l| l.ty.clone()),
            Json::Null => None,
            Json::Object(obj) => self.infer_object(obj),
        }
    }

    fn infer_object(&self, obj: &Map<String, Json>) -> Option<TypeInfo> {
        let kind = expression_kind(obj)?;
        let operand = &obj[kind];
        match kind {
            "string" => Some(TypeInfo::Str),
            "call" => {
                let call = operand.as_object()?;
                let function = call.get("function")?.as_str()?;
                let namespace = call
                    .get("namespace")
                    .and_then(Json::as_str)
                    .unwrap_or(&self.ctx.namespace);
                self.signatures
                    .get(&format!("{namespace}.{function}"))?
                    .return_type
                    .clone()
            }
            "get" => {
                let array = operand.get("array")?.as_str()?;
                let elem = self.ctx.local(array)?.ty.element()?;
                TypeInfo::from_kind(elem)
            }
            "not" | "and" | "or" | "eq" | "gt" | "lt" => Some(TypeInfo::Bool),
            "length" => Some(TypeInfo::Int),
            "name" => self.ctx.local(operand.as_str()?).map(|l| l.ty.clone()),
            "negate" => self.infer_type(operand).filter(TypeInfo::is_numeric),
            _ => Some(self.infer_arithmetic(kind, operand)),
        }
    }

    /// `add` with a string operand concatenates; two ints stay int except
    /// under `divide`; everything else widens to float.
    fn infer_arithmetic(&self, kind: &str, operand: &Json) -> TypeInfo {
        let operands = match operand {
            Json::Array(items) => items.as_slice(),
            scalar => std::slice::from_ref(scalar),
        };
        let types: Vec<Option<TypeInfo>> = operands.iter().map(|o| self.infer_type(o)).collect();
        if kind == "add" && types.iter().any(|t| *t == Some(TypeInfo::Str)) {
            return TypeInfo::Str;
        }
        if kind != "divide" && !types.is_empty() && types.iter().all(|t| *t == Some(TypeInfo::Int)) {
            return TypeInfo::Int;
        }
        TypeInfo::Float
    }
}

/// Sibling `args` sits next to `call` in the enclosing object.
fn sibling_args_path(call_path: &str) -> String {
    match call_path.strip_suffix(".call") {
        Some(parent) => child_key(parent, "args"),
        None => "args".to_string(),
    }
}

