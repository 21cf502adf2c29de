use std::collections::{HashMap, HashSet};

use crate::bytecode::{CompiledFunction, Opcode, Value};
use crate::types::TypeInfo;

const MAX_U16: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalInfo {
    pub slot: usize,
    pub ty: TypeInfo,
}

/// Scratch state for lowering one function; built fresh per function and
/// consumed by [`FunctionCompileContext::finish`].
///
/// The assigned set is a flat, textual-order approximation: a name counts
/// as assigned once any earlier statement stored to it, whichever branch or
/// loop body that statement sits in.
#[derive(Debug)]
pub struct FunctionCompileContext {
    pub name: String,
    pub namespace: String,
    pub return_type: Option<TypeInfo>,
    locals: HashMap<String, LocalInfo>,
    params: HashSet<String>,
    assigned: HashSet<String>,
    param_count: usize,
    next_slot: usize,
    code: Vec<u8>,
    constants: Vec<Value>,
    overflow: Option<String>,
}

impl FunctionCompileContext {
    pub fn new(name: String, namespace: String, return_type: Option<TypeInfo>) -> Self {
        Self {
            name,
            namespace,
            return_type,
            locals: HashMap::new(),
            params: HashSet::new(),
            assigned: HashSet::new(),
            param_count: 0,
            next_slot: 0,
            code: Vec::new(),
            constants: Vec::new(),
            overflow: None,
        }
    }

    /// Parameters take the leading slots and start out assigned.
    pub fn declare_param(&mut self, name: &str, ty: TypeInfo) {
        self.alloc_slot(name, ty);
        self.params.insert(name.to_string());
        self.assigned.insert(name.to_string());
        self.param_count += 1;
    }

    pub fn declare_local(&mut self, name: &str, ty: TypeInfo) {
        self.alloc_slot(name, ty);
    }

    fn alloc_slot(&mut self, name: &str, ty: TypeInfo) {
        let slot = self.next_slot;
        self.next_slot += 1;
        if slot > MAX_U16 {
            self.overflow_with(format!("Function '{}' declares more than 65536 locals", self.name));
        }
        self.locals.insert(name.to_string(), LocalInfo { slot, ty });
    }

    pub fn local(&self, name: &str) -> Option<&LocalInfo> {
        self.locals.get(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.contains(name)
    }

    pub fn is_assigned(&self, name: &str) -> bool {
        self.assigned.contains(name)
    }

    pub fn mark_assigned(&mut self, name: &str) {
        self.assigned.insert(name.to_string());
    }

    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, op: Opcode) {
        self.code.push(op.byte());
    }

    pub fn emit_u16(&mut self, op: Opcode, operand: usize) {
        self.emit(op);
        self.push_u16(operand);
    }

    /// Callers check `count` against the one-byte limit before emitting.
    pub fn emit_count(&mut self, op: Opcode, count: usize) {
        self.emit(op);
        self.code.push(count.min(u8::MAX as usize) as u8);
    }

    pub fn emit_const(&mut self, value: Value) {
        let index = self.add_constant(value);
        self.emit_u16(Opcode::PushConst, index);
    }

    pub fn emit_store(&mut self, local: &LocalInfo) {
        let op = if local.ty == TypeInfo::Int {
            Opcode::StoreLocalInt
        } else {
            Opcode::StoreLocal
        };
        self.emit_u16(op, local.slot);
    }

    /// Emits `op` with a placeholder target and returns the placeholder offset.
    pub fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit(op);
        let at = self.offset();
        self.push_u16(0);
        at
    }

    pub fn patch_jump(&mut self, at: usize, target: usize) {
        if target > MAX_U16 {
            self.overflow_with(format!(
                "Function '{}' is too large: jump target {target} exceeds 16 bits",
                self.name
            ));
            return;
        }
        let [lo, hi] = (target as u16).to_le_bytes();
        self.code[at] = lo;
        self.code[at + 1] = hi;
    }

    pub fn add_constant(&mut self, value: Value) -> usize {
        if let Some(index) = self
            .constants
            .iter()
            .position(|c| same_constant(c, &value))
        {
            return index;
        }
        self.constants.push(value);
        let index = self.constants.len() - 1;
        if index > MAX_U16 {
            self.overflow_with(format!(
                "Function '{}' has more than 65536 constants",
                self.name
            ));
        }
        index
    }

    fn push_u16(&mut self, operand: usize) {
        let [lo, hi] = (operand.min(MAX_U16) as u16).to_le_bytes();
        self.code.push(lo);
        self.code.push(hi);
    }

    fn overflow_with(&mut self, message: String) {
        if self.overflow.is_none() {
            self.overflow = Some(message);
        }
    }

    /// Size-limit violation hit while emitting, if any.
    pub fn take_overflow(&mut self) -> Option<String> {
        self.overflow.take()
    }

    pub fn finish(self) -> CompiledFunction {
        CompiledFunction {
            name: self.name,
            code: self.code,
            constants: self.constants,
            local_count: self.next_slot,
            param_count: self.param_count,
        }
    }
}

/// Pool identity. Floats compare by bit pattern so `-0.0` keeps its own slot.
fn same_constant(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        _ => a.kind() == b.kind() && a == b,
    }
}
