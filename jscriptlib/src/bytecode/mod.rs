use std::collections::HashMap;

mod codec;
mod disasm;
mod opcode;
mod value;

pub use codec::CodecError;
pub(crate) use opcode::read_u16;
pub use opcode::{Opcode, OperandKind};
pub use value::{ArrayData, ArrayRef, Value, ValueKind};

/// One lowered function: bytecode bytes plus the constant pool they index.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub name: String,
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    pub local_count: usize,
    pub param_count: usize,
}

/// Fully-qualified name to compiled function; read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionTable {
    functions: HashMap<String, CompiledFunction>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, function: CompiledFunction) -> Option<CompiledFunction> {
        self.functions.insert(function.name.clone(), function)
    }

    pub fn get(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Functions ordered by name, for stable artifacts and listings.
    pub fn sorted(&self) -> Vec<&CompiledFunction> {
        let mut funcs: Vec<_> = self.functions.values().collect();
        funcs.sort_by(|a, b| a.name.cmp(&b.name));
        funcs
    }
}
