use serde_json::{Map, Value as Json};

use super::BodyCompiler;
use crate::bytecode::{Opcode, Value};
use crate::lines::{child_index, child_key};
use crate::types::{MemoryWidth, TypeInfo};

const STATEMENT_KINDS: &[&str] = &[
    "let", "print", "call", "if", "while", "set", "push", "return", "on", "ffi", "alloc",
    "memwrite", "memread", "free",
];

impl BodyCompiler<'_> {
    pub(super) fn compile_block(&mut self, stmts: &[Json], path: &str) {
        for (i, stmt) in stmts.iter().enumerate() {
            self.compile_stmt(stmt, &child_index(path, i));
        }
    }

    fn compile_stmt(&mut self, stmt: &Json, path: &str) {
        let Some(obj) = stmt.as_object() else {
            self.error(path, "Statement must be a JSON object");
            return;
        };
        let Some(kind) = STATEMENT_KINDS.iter().copied().find(|k| obj.contains_key(*k)) else {
            let found = obj.keys().next().map(String::as_str).unwrap_or("<empty>");
            self.error(path, format!("Unsupported statement kind '{found}'"));
            return;
        };
        let extra: &[&str] = if kind == "call" { &["call", "args"] } else { &[kind] };
        self.check_fields(obj, extra, &format!("'{kind}' statement"), path);

        let body = &obj[kind];
        let at = child_key(path, kind);
        match kind {
            "let" => self.compile_let(body, &at),
            "print" => {
                self.compile_expr(body, &at);
                self.ctx.emit(Opcode::Print);
            }
            "call" => self.compile_call(body, obj.get("args"), &at, false),
            "if" => self.compile_if(body, &at),
            "while" => self.compile_while(body, &at),
            "set" => self.compile_array_write(body, &at, true),
            "push" => self.compile_array_write(body, &at, false),
            "return" => self.compile_return(body, &at),
            "on" => self.compile_on(body, &at),
            "ffi" => self.compile_ffi(body, &at),
            "alloc" => self.compile_alloc(body, &at),
            "memwrite" => self.compile_memwrite(body, &at),
            "memread" => self.compile_memread(body, &at),
            "free" => {
                self.compile_expr(body, &at);
                self.ctx.emit(Opcode::MemFree);
            }
            _ => self.error(path, format!("Unsupported statement kind '{kind}'")),
        }
    }

    fn expect_object<'j>(&mut self, body: &'j Json, kind: &str, path: &str) -> Option<&'j Map<String, Json>> {
        let obj = body.as_object();
        if obj.is_none() {
            self.error(path, format!("'{kind}' expects an object"));
        }
        obj
    }

    fn required<'j>(&mut self, obj: &'j Map<String, Json>, field: &str, kind: &str, path: &str) -> Option<&'j Json> {
        let v = obj.get(field);
        if v.is_none() {
            self.error(path, format!("'{kind}' requires a '{field}' field"));
        }
        v
    }

    fn required_str<'j>(&mut self, obj: &'j Map<String, Json>, field: &str, kind: &str, path: &str) -> Option<&'j str> {
        match obj.get(field) {
            Some(Json::String(s)) => Some(s),
            Some(_) => {
                self.error(&child_key(path, field), format!("'{field}' of '{kind}' must be a string"));
                None
            }
            None => {
                self.error(path, format!("'{kind}' requires a '{field}' field"));
                None
            }
        }
    }

    fn compile_let(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "let", path) else {
            return;
        };
        self.check_fields(obj, &["name", "type", "value"], "'let'", path);
        let Some(name) = self.required_str(obj, "name", "let", path) else {
            return;
        };
        let name_path = child_key(path, "name");
        if self.ctx.is_param(name) {
            self.error(&name_path, format!("Parameter '{name}' cannot be reassigned"));
            return;
        }
        let Some(local) = self.ctx.local(name).cloned() else {
            self.error(&name_path, format!("Undefined variable '{name}'"));
            return;
        };
        if let Some(t) = obj.get("type").and_then(Json::as_str) {
            if TypeInfo::parse(t).as_ref() != Some(&local.ty) {
                self.error(
                    &child_key(path, "type"),
                    format!("'let' type '{t}' does not match '{name}' declared as '{}'", local.ty),
                );
            }
        }
        let Some(value) = obj.get("value") else {
            self.error(path, format!("'let' for '{name}' is missing a 'value'"));
            return;
        };
        let value_path = child_key(path, "value");

        if value.is_null() {
            if let TypeInfo::Pointer(pointee) = &local.ty {
                self.ctx.emit_const(Value::pointer(0, pointee.clone()));
                self.ctx.emit_store(&local);
                self.ctx.mark_assigned(name);
                return;
            }
        }

        match (&local.ty, value) {
            (TypeInfo::Array(Some(elem)), Json::Array(items)) => {
                let declared = TypeInfo::from_kind(*elem);
                for (i, item) in items.iter().enumerate() {
                    let Some(found) = self.infer_type(item) else {
                        continue;
                    };
                    if declared.as_ref().is_some_and(|d| !d.accepts(&found)) {
                        self.error(
                            &child_index(&value_path, i),
                            format!(
                                "Type mismatch: '{name}' holds '{elem}' but element {i} is '{found}'"
                            ),
                        );
                    }
                }
            }
            _ => {
                if let Some(found) = self.infer_type(value) {
                    if !local.ty.accepts(&found) {
                        self.error(
                            &value_path,
                            format!(
                                "Type mismatch: '{name}' is declared as '{}' but assigned '{found}'",
                                local.ty
                            ),
                        );
                    }
                }
            }
        }

        self.compile_expr(value, &value_path);
        self.ctx.emit_store(&local);
        self.ctx.mark_assigned(name);
    }

    fn compile_if(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "if", path) else {
            return;
        };
        self.check_fields(obj, &["condition", "then", "else"], "'if'", path);
        let Some(condition) = self.required(obj, "condition", "if", path) else {
            return;
        };
        self.compile_expr(condition, &child_key(path, "condition"));
        let false_jump = self.ctx.emit_jump(Opcode::JmpIfFalse);

        let then_path = child_key(path, "then");
        match obj.get("then") {
            Some(Json::Array(stmts)) => self.compile_block(stmts, &then_path),
            Some(_) => self.error(&then_path, "'then' must be an array of statements"),
            None => self.error(path, "'if' requires a 'then' field"),
        }

        match obj.get("else") {
            None => {
                let end = self.ctx.offset();
                self.ctx.patch_jump(false_jump, end);
            }
            Some(else_body) => {
                let end_jump = self.ctx.emit_jump(Opcode::Jmp);
                let else_start = self.ctx.offset();
                self.ctx.patch_jump(false_jump, else_start);
                let else_path = child_key(path, "else");
                match else_body {
                    Json::Array(stmts) => self.compile_block(stmts, &else_path),
                    _ => self.error(&else_path, "'else' must be an array of statements"),
                }
                let end = self.ctx.offset();
                self.ctx.patch_jump(end_jump, end);
            }
        }
    }

    fn compile_while(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "while", path) else {
            return;
        };
        self.check_fields(obj, &["condition", "body"], "'while'", path);
        let Some(condition) = self.required(obj, "condition", "while", path) else {
            return;
        };
        let loop_start = self.ctx.offset();
        self.compile_expr(condition, &child_key(path, "condition"));
        let exit_jump = self.ctx.emit_jump(Opcode::JmpIfFalse);

        let body_path = child_key(path, "body");
        match obj.get("body") {
            Some(Json::Array(stmts)) => self.compile_block(stmts, &body_path),
            Some(_) => self.error(&body_path, "'body' must be an array of statements"),
            None => self.error(path, "'while' requires a 'body' field"),
        }

        let back = self.ctx.emit_jump(Opcode::Jmp);
        self.ctx.patch_jump(back, loop_start);
        let end = self.ctx.offset();
        self.ctx.patch_jump(exit_jump, end);
    }

    /// `set {array, at, value}` when `indexed`, otherwise `push {array, value}`.
    fn compile_array_write(&mut self, body: &Json, path: &str, indexed: bool) {
        let kind = if indexed { "set" } else { "push" };
        let Some(obj) = self.expect_object(body, kind, path) else {
            return;
        };
        let allowed: &[&str] = if indexed {
            &["array", "at", "value"]
        } else {
            &["array", "value"]
        };
        self.check_fields(obj, allowed, &format!("'{kind}'"), path);
        let Some(array) = self.required_str(obj, "array", kind, path) else {
            return;
        };
        let Some(local) = self.array_local(array, &child_key(path, "array")) else {
            return;
        };
        let Some(value) = self.required(obj, "value", kind, path) else {
            return;
        };
        let value_path = child_key(path, "value");

        if let (Some(elem), Some(found)) = (local.ty.element(), self.infer_type(value)) {
            let accepts = TypeInfo::from_kind(elem).is_none_or(|e| e.accepts(&found));
            if !accepts {
                let verb = if indexed { "setting" } else { "pushing" };
                self.error(
                    &value_path,
                    format!("Type mismatch: array '{array}' holds '{elem}' but {verb} '{found}'"),
                );
            }
        }

        self.ctx.emit_u16(Opcode::LoadLocal, local.slot);
        if indexed {
            let Some(at) = self.required(obj, "at", kind, path) else {
                return;
            };
            self.compile_expr(at, &child_key(path, "at"));
        }
        self.compile_expr(value, &value_path);
        self.ctx.emit(if indexed {
            Opcode::ArraySet
        } else {
            Opcode::ArrayPush
        });
    }

    fn compile_return(&mut self, body: &Json, path: &str) {
        match self.ctx.return_type.clone() {
            None => {
                if body.is_null() {
                    self.ctx.emit(Opcode::Halt);
                } else {
                    self.error(path, "Function is void but contains a return value");
                }
            }
            Some(expected) => {
                if body.is_null() {
                    self.error(
                        path,
                        format!("Function '{}' must return a '{expected}' value", self.ctx.name),
                    );
                    return;
                }
                if let Some(found) = self.infer_type(body) {
                    if !expected.accepts(&found) {
                        self.error(
                            path,
                            format!("Expected type '{expected}' but got '{found}' in return"),
                        );
                    }
                }
                self.compile_expr(body, path);
                self.ctx.emit(Opcode::Ret);
            }
        }
    }

    fn compile_on(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "on", path) else {
            return;
        };
        self.check_fields(obj, &["event", "call"], "'on'", path);
        let Some(event) = self.required_str(obj, "event", "on", path) else {
            return;
        };
        let call_path = child_key(path, "call");
        let Some(call) = obj.get("call").and_then(Json::as_object) else {
            self.error(path, "'on' requires a 'call' object naming the handler");
            return;
        };
        self.check_fields(call, &["namespace", "function"], "'on' handler", &call_path);
        let Some(function) = self.required_str(call, "function", "on", &call_path) else {
            return;
        };
        let namespace = call
            .get("namespace")
            .and_then(Json::as_str)
            .unwrap_or(&self.ctx.namespace)
            .to_string();
        let full_name = format!("{namespace}.{function}");
        if !self.signatures.contains(&full_name) || namespace == super::NATIVE_NAMESPACE {
            self.error(&call_path, format!("Unknown function '{full_name}'"));
            return;
        }
        self.ctx.emit_const(Value::Str(event.to_string()));
        self.ctx.emit_const(Value::Str(full_name));
        self.ctx.emit(Opcode::OnEvent);
    }

    fn compile_ffi(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "ffi", path) else {
            return;
        };
        self.check_fields(obj, &["lib", "symbol", "args", "returns", "into"], "'ffi'", path);
        let Some(lib) = self.required_str(obj, "lib", "ffi", path) else {
            return;
        };
        let Some(symbol) = self.required_str(obj, "symbol", "ffi", path) else {
            return;
        };
        let returns = match obj.get("returns") {
            None => "void",
            Some(Json::String(r)) => r.as_str(),
            Some(_) => {
                self.error(&child_key(path, "returns"), "'returns' of 'ffi' must be a string");
                return;
            }
        };

        let args_path = child_key(path, "args");
        let args: &[Json] = match obj.get("args") {
            None => &[],
            Some(Json::Array(items)) => items,
            Some(_) => {
                self.error(&args_path, "'args' of 'ffi' must be an array");
                return;
            }
        };
        if !self.check_count(args.len(), "ffi arguments", &args_path) {
            return;
        }
        for (i, arg) in args.iter().enumerate() {
            let arg_path = child_index(&args_path, i);
            let Some(arg) = self.expect_object(arg, "ffi argument", &arg_path) else {
                continue;
            };
            self.check_fields(arg, &["value", "type"], "'ffi' argument", &arg_path);
            let Some(ty) = self.required_str(arg, "type", "ffi argument", &arg_path) else {
                continue;
            };
            let Some(value) = self.required(arg, "value", "ffi argument", &arg_path) else {
                continue;
            };
            self.ctx.emit_const(Value::Str(ty.to_string()));
            self.compile_expr(value, &child_key(&arg_path, "value"));
        }

        self.ctx.emit_const(Value::Str(returns.to_string()));
        self.ctx.emit_const(Value::Str(lib.to_string()));
        self.ctx.emit_const(Value::Str(symbol.to_string()));
        self.ctx.emit_count(Opcode::FfiCall, args.len());

        if let Some(into) = obj.get("into") {
            let into_path = child_key(path, "into");
            if returns == "void" {
                self.error(&into_path, "'ffi' returning void cannot store a result");
                return;
            }
            self.store_into(into, &into_path);
        }
    }

    fn compile_alloc(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "alloc", path) else {
            return;
        };
        self.check_fields(obj, &["size", "into"], "'alloc'", path);
        let Some(size) = self.required(obj, "size", "alloc", path) else {
            return;
        };
        let Some(into) = self.required(obj, "into", "alloc", path) else {
            return;
        };
        let into_path = child_key(path, "into");
        if let Some(name) = into.as_str() {
            if let Some(local) = self.ctx.local(name) {
                if !matches!(local.ty, TypeInfo::Pointer(_)) {
                    self.error(&into_path, format!("'{name}' must be a pointer to hold an allocation"));
                    return;
                }
            }
        }
        self.compile_expr(size, &child_key(path, "size"));
        self.ctx.emit(Opcode::MemAlloc);
        self.store_into(into, &into_path);
    }

    fn compile_memwrite(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "memwrite", path) else {
            return;
        };
        self.check_fields(obj, &["ptr", "offset", "value", "type"], "'memwrite'", path);
        let Some(width) = self.memory_width(obj, path, "memwrite") else {
            return;
        };
        let Some(ptr) = self.required(obj, "ptr", "memwrite", path) else {
            return;
        };
        let Some(value) = self.required(obj, "value", "memwrite", path) else {
            return;
        };
        self.compile_expr(ptr, &child_key(path, "ptr"));
        self.compile_offset(obj, path);
        self.compile_expr(value, &child_key(path, "value"));
        self.ctx.emit_const(Value::Str(width.name().to_string()));
        self.ctx.emit(Opcode::MemWrite);
    }

    fn compile_memread(&mut self, body: &Json, path: &str) {
        let Some(obj) = self.expect_object(body, "memread", path) else {
            return;
        };
        self.check_fields(obj, &["ptr", "offset", "type", "into"], "'memread'", path);
        let Some(width) = self.memory_width(obj, path, "memread") else {
            return;
        };
        let Some(ptr) = self.required(obj, "ptr", "memread", path) else {
            return;
        };
        let Some(into) = self.required(obj, "into", "memread", path) else {
            return;
        };
        self.compile_expr(ptr, &child_key(path, "ptr"));
        self.compile_offset(obj, path);
        self.ctx.emit_const(Value::Str(width.name().to_string()));
        self.ctx.emit(Opcode::MemRead);
        self.store_into(into, &child_key(path, "into"));
    }

    fn memory_width(&mut self, obj: &Map<String, Json>, path: &str, kind: &str) -> Option<MemoryWidth> {
        let ty = self.required_str(obj, "type", kind, path)?;
        let width = MemoryWidth::parse(ty);
        if width.is_none() {
            self.error(
                &child_key(path, "type"),
                format!("Unknown memory type '{ty}'; expected int8, int16, int32, int64, float32, float64 or ptr"),
            );
        }
        width
    }

    /// Missing offsets default to zero.
    fn compile_offset(&mut self, obj: &Map<String, Json>, path: &str) {
        match obj.get("offset") {
            Some(offset) => self.compile_expr(offset, &child_key(path, "offset")),
            None => self.ctx.emit_const(Value::Int(0)),
        }
    }

    /// Stores the value on top of the stack into the local named by `into`.
    fn store_into(&mut self, into: &Json, path: &str) {
        let Some(name) = into.as_str() else {
            self.error(path, "'into' must name a local");
            return;
        };
        if self.ctx.is_param(name) {
            self.error(path, format!("Parameter '{name}' cannot be reassigned"));
            return;
        }
        let Some(local) = self.ctx.local(name).cloned() else {
            self.error(path, format!("Undefined variable '{name}'"));
            return;
        };
        self.ctx.emit_store(&local);
        self.ctx.mark_assigned(name);
    }
}
