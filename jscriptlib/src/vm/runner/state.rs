use crate::bytecode::{CompiledFunction, Value};
use crate::vm::{Vm, VmError, VmErrorKind};

pub(in crate::vm) struct CallFrame<'a> {
    pub function: &'a CompiledFunction,
    pub ip: usize,
    pub locals: Vec<Value>,
}

impl<'a> CallFrame<'a> {
    pub(super) fn new(function: &'a CompiledFunction, args: Vec<Value>) -> Self {
        let mut locals = args;
        if locals.len() < function.local_count {
            locals.resize(function.local_count, Value::Null);
        }
        Self {
            function,
            ip: 0,
            locals,
        }
    }
}

impl Vm<'_> {
    pub(super) fn load_local(
        &mut self,
        slot: usize,
        function_name: &str,
        ip: usize,
    ) -> Result<(), VmError> {
        let value = self
            .frames
            .last()
            .and_then(|frame| frame.locals.get(slot))
            .cloned();
        let Some(value) = value else {
            return Err(super::err_at(
                VmErrorKind::InvalidLocal,
                format!("Invalid local slot {slot}"),
                function_name,
                ip,
            ));
        };
        self.stack.push(value);
        Ok(())
    }

    /// `STORE_LOCAL` / `STORE_LOCAL_INT`; the latter truncates floats and
    /// rejects anything non-numeric.
    pub(super) fn store_local(
        &mut self,
        slot: usize,
        as_int: bool,
        function_name: &str,
        ip: usize,
    ) -> Result<(), VmError> {
        let Some(value) = self.stack.pop() else {
            return Err(super::err_at(
                VmErrorKind::StackUnderflow,
                "Stack underflow on STORE_LOCAL",
                function_name,
                ip,
            ));
        };
        let value = if as_int {
            match value {
                Value::Int(_) => value,
                Value::Float(v) => Value::Int(v as i64),
                other => {
                    return Err(super::err_at(
                        VmErrorKind::TypeMismatch,
                        format!("Cannot store '{}' into an int local", other.kind()),
                        function_name,
                        ip,
                    ));
                }
            }
        } else {
            value
        };
        let Some(target) = self
            .frames
            .last_mut()
            .and_then(|frame| frame.locals.get_mut(slot))
        else {
            return Err(super::err_at(
                VmErrorKind::InvalidLocal,
                format!("Invalid local slot {slot}"),
                function_name,
                ip,
            ));
        };
        *target = value;
        Ok(())
    }
}
