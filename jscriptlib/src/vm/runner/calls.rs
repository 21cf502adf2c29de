use tracing::debug;

use crate::bytecode::{CompiledFunction, Value};
use crate::compiler::NATIVE_PREFIX;
use crate::vm::{FfiArg, Vm, VmError, VmErrorKind};

use super::state::CallFrame;

impl<'a> Vm<'a> {
    pub(in crate::vm) fn push_frame(
        &mut self,
        function: &'a CompiledFunction,
        args: Vec<Value>,
    ) -> Result<(), VmError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(VmError::new(
                VmErrorKind::StackOverflow,
                format!(
                    "Call stack limit exceeded ({}) calling '{}'",
                    self.config.max_call_depth, function.name
                ),
            ));
        }
        if args.len() != function.param_count {
            return Err(VmError::new(
                VmErrorKind::ArityMismatch,
                format!(
                    "Function '{}' arity mismatch: expected {}, got {}",
                    function.name,
                    function.param_count,
                    args.len()
                ),
            ));
        }
        self.frames.push(CallFrame::new(function, args));
        Ok(())
    }

    /// `CALL argc`: callee name on top, arguments beneath in order.
    pub(super) fn call(&mut self, argc: usize, function_name: &str, ip: usize) -> Result<(), VmError> {
        let callee = match self.stack.pop() {
            Some(Value::Str(name)) => name,
            Some(other) => {
                return Err(super::err_at(
                    VmErrorKind::TypeMismatch,
                    format!("CALL expects a function name, got '{}'", other.kind()),
                    function_name,
                    ip,
                ));
            }
            None => {
                return Err(super::err_at(
                    VmErrorKind::StackUnderflow,
                    "CALL expects a function name",
                    function_name,
                    ip,
                ));
            }
        };
        if self.stack.len() < argc {
            return Err(super::err_at(
                VmErrorKind::StackUnderflow,
                format!("CALL '{callee}' expects {argc} arguments"),
                function_name,
                ip,
            ));
        }
        let args = self.stack.split_off(self.stack.len() - argc);

        if let Some(native) = callee.strip_prefix(NATIVE_PREFIX) {
            return self.call_native(native, args, function_name, ip);
        }
        let functions = self.functions;
        let Some(target) = functions.get(&callee) else {
            return Err(super::err_at(
                VmErrorKind::UnknownFunction,
                format!("Unknown function '{callee}'"),
                function_name,
                ip,
            ));
        };
        self.push_frame(target, args)
            .map_err(|e| super::err_at(e.kind, e.message, function_name, ip))
    }

    pub(super) fn ret(&mut self, function_name: &str, ip: usize) -> Result<(), VmError> {
        // An empty stack returns null rather than faulting.
        let value = self.stack.pop().unwrap_or(Value::Null);
        if self.frames.pop().is_none() {
            return Err(super::err_at(
                VmErrorKind::StackUnderflow,
                "RET without an active frame",
                function_name,
                ip,
            ));
        }
        if self.frames.len() > self.base {
            self.stack.push(value);
        } else {
            self.last_return = value;
        }
        Ok(())
    }

    pub(super) fn halt(&mut self) {
        self.frames.pop();
    }

    /// `ON_EVENT`: handler name on top, event name beneath.
    pub(super) fn on_event(&mut self, function_name: &str, ip: usize) -> Result<(), VmError> {
        let handler = self.pop_string("ON_EVENT", function_name, ip)?;
        let event = self.pop_string("ON_EVENT", function_name, ip)?;
        if !self.functions.contains(&handler) {
            return Err(super::err_at(
                VmErrorKind::UnknownFunction,
                format!("Unknown handler '{handler}' for event '{event}'"),
                function_name,
                ip,
            ));
        }
        debug!(event = %event, handler = %handler, "event handler registered");
        self.handlers.entry(event).or_default().push(handler);
        Ok(())
    }

    /// `FFI_CALL argc`: symbol, library and return type on top, then `argc`
    /// (type, value) pairs in argument order.
    pub(super) fn ffi_call(&mut self, argc: usize, function_name: &str, ip: usize) -> Result<(), VmError> {
        let symbol = self.pop_string("FFI_CALL", function_name, ip)?;
        let library = self.pop_string("FFI_CALL", function_name, ip)?;
        let return_type = self.pop_string("FFI_CALL", function_name, ip)?;
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            let Some(value) = self.stack.pop() else {
                return Err(super::err_at(
                    VmErrorKind::StackUnderflow,
                    format!("FFI_CALL '{symbol}' expects {argc} arguments"),
                    function_name,
                    ip,
                ));
            };
            let type_tag = self.pop_string("FFI_CALL", function_name, ip)?;
            args.push(FfiArg { type_tag, value });
        }
        args.reverse();

        let Some(ffi) = self.ffi.as_deref_mut() else {
            return Err(super::err_at(
                VmErrorKind::CapabilityMissing,
                format!("FFI call to '{library}!{symbol}' but no FFI capability is installed"),
                function_name,
                ip,
            ));
        };
        debug!(library = %library, symbol = %symbol, argc, "ffi call");
        let result = ffi
            .invoke(&library, &symbol, &args, &return_type)
            .map_err(|e| super::err_at(e.kind, e.message, function_name, ip))?;
        if return_type != "void" {
            self.stack.push(result);
        }
        Ok(())
    }

    pub(super) fn pop_string(&mut self, op: &str, function_name: &str, ip: usize) -> Result<String, VmError> {
        match self.stack.pop() {
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("{op} expects a string operand, got '{}'", other.kind()),
                function_name,
                ip,
            )),
            None => Err(super::err_at(
                VmErrorKind::StackUnderflow,
                format!("Stack underflow on {op}"),
                function_name,
                ip,
            )),
        }
    }
}
