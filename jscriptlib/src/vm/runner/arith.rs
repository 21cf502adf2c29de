use crate::bytecode::{Opcode, Value};
use crate::vm::{VmError, VmErrorKind};

/// Pops `count` operands and applies an n-ary opcode: arithmetic folds left
/// to right, comparisons chain over adjacent pairs.
pub(super) fn fold(
    stack: &mut Vec<Value>,
    op: Opcode,
    count: usize,
    function_name: &str,
    ip: usize,
) -> Result<(), VmError> {
    if count == 0 {
        return Err(super::err_at(
            VmErrorKind::MalformedBytecode,
            format!("{} requires at least one operand", op.mnemonic()),
            function_name,
            ip,
        ));
    }
    if stack.len() < count {
        return Err(super::err_at(
            VmErrorKind::StackUnderflow,
            format!("{} expects {count} operands", op.mnemonic()),
            function_name,
            ip,
        ));
    }
    let operands = stack.split_off(stack.len() - count);
    let result = match op {
        Opcode::Eq => Value::Bool(operands.windows(2).all(|w| w[0].loose_eq(&w[1]))),
        Opcode::Gt | Opcode::Lt => {
            let mut numbers = Vec::with_capacity(count);
            for v in &operands {
                let Some(n) = v.as_f64() else {
                    return Err(super::err_at(
                        VmErrorKind::TypeMismatch,
                        format!("{} expects numeric operands, got '{}'", op.mnemonic(), v.kind()),
                        function_name,
                        ip,
                    ));
                };
                numbers.push(n);
            }
            let holds = if op == Opcode::Gt {
                numbers.windows(2).all(|w| w[0] > w[1])
            } else {
                numbers.windows(2).all(|w| w[0] < w[1])
            };
            Value::Bool(holds)
        }
        Opcode::And | Opcode::Or => {
            let mut acc = op == Opcode::And;
            for v in &operands {
                let Value::Bool(b) = v else {
                    return Err(super::err_at(
                        VmErrorKind::TypeMismatch,
                        format!("{} expects bool operands, got '{}'", op.mnemonic(), v.kind()),
                        function_name,
                        ip,
                    ));
                };
                acc = if op == Opcode::And { acc && *b } else { acc || *b };
            }
            Value::Bool(acc)
        }
        _ => {
            let mut iter = operands.into_iter();
            let mut acc = iter.next().unwrap_or(Value::Null);
            for rhs in iter {
                acc = binary(op, acc, rhs).map_err(|(kind, msg)| {
                    super::err_at(kind, msg, function_name, ip)
                })?;
            }
            acc
        }
    };
    stack.push(result);
    Ok(())
}

fn binary(op: Opcode, lhs: Value, rhs: Value) -> Result<Value, (VmErrorKind, String)> {
    if op == Opcode::Add && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_))) {
        return Ok(Value::Str(format!("{lhs}{rhs}")));
    }
    if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
        let (a, b) = (*a, *b);
        return match op {
            Opcode::Add => Ok(Value::Int(a.wrapping_add(b))),
            Opcode::Sub => Ok(Value::Int(a.wrapping_sub(b))),
            Opcode::Mul => Ok(Value::Int(a.wrapping_mul(b))),
            Opcode::Div => Ok(Value::Float(a as f64 / b as f64)),
            Opcode::Mod if b == 0 => Err((
                VmErrorKind::DivisionByZero,
                "Modulo by zero".to_string(),
            )),
            Opcode::Mod => Ok(Value::Int(a.wrapping_rem(b))),
            _ => Err((
                VmErrorKind::MalformedBytecode,
                format!("{} is not an arithmetic opcode", op.mnemonic()),
            )),
        };
    }
    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err((
            VmErrorKind::TypeMismatch,
            format!(
                "{} cannot combine '{}' and '{}'",
                op.mnemonic(),
                lhs.kind(),
                rhs.kind()
            ),
        ));
    };
    let v = match op {
        Opcode::Add => a + b,
        Opcode::Sub => a - b,
        Opcode::Mul => a * b,
        Opcode::Div => a / b,
        Opcode::Mod => a % b,
        _ => {
            return Err((
                VmErrorKind::MalformedBytecode,
                format!("{} is not an arithmetic opcode", op.mnemonic()),
            ));
        }
    };
    Ok(Value::Float(v))
}

pub(super) fn neg(stack: &mut Vec<Value>, function_name: &str, ip: usize) -> Result<(), VmError> {
    let Some(v) = stack.pop() else {
        return Err(super::err_at(
            VmErrorKind::StackUnderflow,
            "NEG expects value",
            function_name,
            ip,
        ));
    };
    match v {
        Value::Int(v) => stack.push(Value::Int(v.wrapping_neg())),
        Value::Float(v) => stack.push(Value::Float(-v)),
        other => {
            return Err(super::err_at(
                VmErrorKind::TypeMismatch,
                format!("NEG expects int or float, got '{}'", other.kind()),
                function_name,
                ip,
            ));
        }
    }
    Ok(())
}

pub(super) fn not(stack: &mut Vec<Value>, function_name: &str, ip: usize) -> Result<(), VmError> {
    let Some(v) = stack.pop() else {
        return Err(super::err_at(
            VmErrorKind::StackUnderflow,
            "NOT expects value",
            function_name,
            ip,
        ));
    };
    let Value::Bool(b) = v else {
        return Err(super::err_at(
            VmErrorKind::TypeMismatch,
            format!("NOT expects bool, got '{}'", v.kind()),
            function_name,
            ip,
        ));
    };
    stack.push(Value::Bool(!b));
    Ok(())
}
