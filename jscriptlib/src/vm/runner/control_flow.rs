use crate::bytecode::Value;
use crate::vm::{VmError, VmErrorKind};

/// A target equal to the code length is the implicit epilogue.
pub(super) fn jump(
    target: usize,
    code_len: usize,
    function_name: &str,
    ip: usize,
) -> Result<usize, VmError> {
    if target > code_len {
        return Err(super::err_at(
            VmErrorKind::MalformedBytecode,
            format!("Jump target {target} is outside the function ({code_len} bytes)"),
            function_name,
            ip,
        ));
    }
    Ok(target)
}

pub(super) fn jump_if_false(
    stack: &mut Vec<Value>,
    target: usize,
    code_len: usize,
    function_name: &str,
    ip: usize,
) -> Result<Option<usize>, VmError> {
    let Some(cond) = stack.pop() else {
        return Err(super::err_at(
            VmErrorKind::StackUnderflow,
            "JMP_IF_FALSE expects a condition",
            function_name,
            ip,
        ));
    };
    if cond.is_truthy() {
        return Ok(None);
    }
    jump(target, code_len, function_name, ip).map(Some)
}
