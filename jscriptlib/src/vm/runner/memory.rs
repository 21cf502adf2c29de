use crate::bytecode::Value;
use crate::types::{MemoryWidth, VOID_POINTEE};
use crate::vm::{MemoryCapability, Vm, VmError, VmErrorKind};

impl Vm<'_> {
    fn memory(
        &mut self,
        op: &str,
        function_name: &str,
        ip: usize,
    ) -> Result<&mut dyn MemoryCapability, VmError> {
        match self.memory.as_deref_mut() {
            Some(memory) => Ok(memory),
            None => Err(super::err_at(
                VmErrorKind::CapabilityMissing,
                format!("{op} requires the memory capability"),
                function_name,
                ip,
            )),
        }
    }

    pub(super) fn mem_alloc(&mut self, function_name: &str, ip: usize) -> Result<(), VmError> {
        let size = self.pop_usize("MEM_ALLOC", "size", function_name, ip)?;
        let addr = self
            .memory("MEM_ALLOC", function_name, ip)?
            .alloc(size)
            .map_err(|e| super::err_at(e.kind, e.message, function_name, ip))?;
        self.stack.push(Value::pointer(addr, VOID_POINTEE));
        Ok(())
    }

    /// Stack: pointer, offset, width name.
    pub(super) fn mem_read(&mut self, function_name: &str, ip: usize) -> Result<(), VmError> {
        let width = self.pop_width("MEM_READ", function_name, ip)?;
        let offset = self.pop_usize("MEM_READ", "offset", function_name, ip)?;
        let addr = self.pop_address("MEM_READ", function_name, ip)?;
        let value = self
            .memory("MEM_READ", function_name, ip)?
            .read(addr, offset, width)
            .map_err(|e| super::err_at(e.kind, e.message, function_name, ip))?;
        self.stack.push(value);
        Ok(())
    }

    /// Stack: pointer, offset, value, width name.
    pub(super) fn mem_write(&mut self, function_name: &str, ip: usize) -> Result<(), VmError> {
        let width = self.pop_width("MEM_WRITE", function_name, ip)?;
        let Some(value) = self.stack.pop() else {
            return Err(super::err_at(
                VmErrorKind::StackUnderflow,
                "MEM_WRITE expects a value",
                function_name,
                ip,
            ));
        };
        let offset = self.pop_usize("MEM_WRITE", "offset", function_name, ip)?;
        let addr = self.pop_address("MEM_WRITE", function_name, ip)?;
        self.memory("MEM_WRITE", function_name, ip)?
            .write(addr, offset, width, &value)
            .map_err(|e| super::err_at(e.kind, e.message, function_name, ip))
    }

    pub(super) fn mem_free(&mut self, function_name: &str, ip: usize) -> Result<(), VmError> {
        let addr = self.pop_address("MEM_FREE", function_name, ip)?;
        self.memory("MEM_FREE", function_name, ip)?
            .free(addr)
            .map_err(|e| super::err_at(e.kind, e.message, function_name, ip))
    }

    fn pop_width(&mut self, op: &str, function_name: &str, ip: usize) -> Result<MemoryWidth, VmError> {
        let name = self.pop_string(op, function_name, ip)?;
        MemoryWidth::parse(&name).ok_or_else(|| {
            super::err_at(
                VmErrorKind::TypeMismatch,
                format!("{op}: unknown memory type '{name}'"),
                function_name,
                ip,
            )
        })
    }

    fn pop_usize(
        &mut self,
        op: &str,
        what: &str,
        function_name: &str,
        ip: usize,
    ) -> Result<usize, VmError> {
        let value = self.stack.pop();
        match value.as_ref().and_then(Value::as_i64) {
            Some(n) => usize::try_from(n).map_err(|_| {
                super::err_at(
                    VmErrorKind::MemoryFault,
                    format!("{op}: negative {what} {n}"),
                    function_name,
                    ip,
                )
            }),
            None if value.is_none() => Err(super::err_at(
                VmErrorKind::StackUnderflow,
                format!("{op} expects a {what}"),
                function_name,
                ip,
            )),
            None => Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("{op} {what} must be numeric"),
                function_name,
                ip,
            )),
        }
    }

    fn pop_address(&mut self, op: &str, function_name: &str, ip: usize) -> Result<u64, VmError> {
        match self.stack.pop() {
            Some(Value::Pointer { addr, .. }) => Ok(addr),
            Some(Value::Null) => Ok(0),
            Some(other) => Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("{op} expects a pointer, got '{}'", other.kind()),
                function_name,
                ip,
            )),
            None => Err(super::err_at(
                VmErrorKind::StackUnderflow,
                format!("{op} expects a pointer"),
                function_name,
                ip,
            )),
        }
    }
}
