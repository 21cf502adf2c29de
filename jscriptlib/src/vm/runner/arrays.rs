use crate::bytecode::{ArrayRef, Value, ValueKind};
use crate::vm::{VmError, VmErrorKind};

pub(super) fn make(
    stack: &mut Vec<Value>,
    count: usize,
    function_name: &str,
    ip: usize,
) -> Result<(), VmError> {
    if stack.len() < count {
        return Err(super::err_at(
            VmErrorKind::StackUnderflow,
            format!("MAKE_ARRAY expects {count} elements"),
            function_name,
            ip,
        ));
    }
    let items = stack.split_off(stack.len() - count);
    if let Some(first) = items.first().map(Value::kind) {
        if let Some(bad) = items.iter().find(|v| !v.kind().compatible_with(first)) {
            return Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("Array literal mixes '{first}' and '{}'", bad.kind()),
                function_name,
                ip,
            ));
        }
    }
    stack.push(Value::array(items));
    Ok(())
}

pub(super) fn get(stack: &mut Vec<Value>, function_name: &str, ip: usize) -> Result<(), VmError> {
    let index = pop_index(stack, "ARRAY_GET", function_name, ip)?;
    let array = pop_array(stack, "ARRAY_GET", function_name, ip)?;
    let data = array.borrow();
    let Some(item) = slot(&data.items, index) else {
        return Err(out_of_bounds(index, data.items.len(), function_name, ip));
    };
    let item = item.clone();
    drop(data);
    stack.push(item);
    Ok(())
}

pub(super) fn set(stack: &mut Vec<Value>, function_name: &str, ip: usize) -> Result<(), VmError> {
    let Some(value) = stack.pop() else {
        return Err(underflow("ARRAY_SET", function_name, ip));
    };
    let index = pop_index(stack, "ARRAY_SET", function_name, ip)?;
    let array = pop_array(stack, "ARRAY_SET", function_name, ip)?;
    let mut data = array.borrow_mut();
    if let Some(element) = data.element {
        if !value.kind().compatible_with(element) {
            return Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("Cannot set '{}' into '{element}[]' array", value.kind()),
                function_name,
                ip,
            ));
        }
    }
    let len = data.items.len();
    let Some(target) = usize::try_from(index).ok().and_then(|i| data.items.get_mut(i)) else {
        return Err(out_of_bounds(index, len, function_name, ip));
    };
    *target = value;
    Ok(())
}

pub(super) fn push(stack: &mut Vec<Value>, function_name: &str, ip: usize) -> Result<(), VmError> {
    let Some(value) = stack.pop() else {
        return Err(underflow("ARRAY_PUSH", function_name, ip));
    };
    let array = pop_array(stack, "ARRAY_PUSH", function_name, ip)?;
    let mut data = array.borrow_mut();
    match data.element {
        Some(element) if !value.kind().compatible_with(element) => {
            return Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("Cannot push '{}' into '{element}[]' array", value.kind()),
                function_name,
                ip,
            ));
        }
        Some(_) => {}
        None => data.element = Some(value.kind()),
    }
    data.items.push(value);
    Ok(())
}

/// Length of an array, or the character count of a string.
pub(super) fn len(stack: &mut Vec<Value>, function_name: &str, ip: usize) -> Result<(), VmError> {
    let Some(v) = stack.pop() else {
        return Err(underflow("ARRAY_LEN", function_name, ip));
    };
    let n = match &v {
        Value::Array(array) => array.borrow().items.len(),
        Value::Str(s) => s.chars().count(),
        other => {
            return Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("ARRAY_LEN expects array or string, got '{}'", other.kind()),
                function_name,
                ip,
            ));
        }
    };
    stack.push(Value::Int(n as i64));
    Ok(())
}

fn slot(items: &[Value], index: i64) -> Option<&Value> {
    usize::try_from(index).ok().and_then(|i| items.get(i))
}

fn pop_index(
    stack: &mut Vec<Value>,
    op: &str,
    function_name: &str,
    ip: usize,
) -> Result<i64, VmError> {
    match stack.pop() {
        Some(Value::Int(i)) => Ok(i),
        Some(other) => Err(super::err_at(
            VmErrorKind::TypeMismatch,
            format!("{op} index must be int, got '{}'", other.kind()),
            function_name,
            ip,
        )),
        None => Err(underflow(op, function_name, ip)),
    }
}

fn pop_array(
    stack: &mut Vec<Value>,
    op: &str,
    function_name: &str,
    ip: usize,
) -> Result<ArrayRef, VmError> {
    match stack.pop() {
        Some(Value::Array(array)) => Ok(array),
        Some(other) => Err(super::err_at(
            VmErrorKind::TypeMismatch,
            format!("{op} expects {}, got '{}'", ValueKind::Array, other.kind()),
            function_name,
            ip,
        )),
        None => Err(underflow(op, function_name, ip)),
    }
}

fn underflow(op: &str, function_name: &str, ip: usize) -> VmError {
    super::err_at(
        VmErrorKind::StackUnderflow,
        format!("Stack underflow on {op}"),
        function_name,
        ip,
    )
}

fn out_of_bounds(index: i64, len: usize, function_name: &str, ip: usize) -> VmError {
    super::err_at(
        VmErrorKind::IndexOutOfBounds,
        format!("Array index {index} out of bounds (length {len})"),
        function_name,
        ip,
    )
}
