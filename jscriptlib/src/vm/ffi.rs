use crate::bytecode::Value;

use super::VmError;

/// One marshalled argument: the declared type tag and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct FfiArg {
    pub type_tag: String,
    pub value: Value,
}

/// Foreign call boundary. ABI classification and symbol loading live in the
/// implementation; the VM only hands over typed arguments.
pub trait FfiInvoker {
    fn invoke(
        &mut self,
        library: &str,
        symbol: &str,
        args: &[FfiArg],
        return_type: &str,
    ) -> Result<Value, VmError>;
}
