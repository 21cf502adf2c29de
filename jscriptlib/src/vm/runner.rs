//! Fetch-decode-execute loop and instruction dispatch.

mod arith;
mod arrays;
mod calls;
mod control_flow;
mod memory;
mod natives;
mod state;

use tracing::trace;

use crate::bytecode::{CompiledFunction, Opcode, OperandKind, read_u16};

use super::{Vm, VmError, VmErrorKind};

pub(super) use state::CallFrame;

impl<'a> Vm<'a> {
    /// Executes until the call stack shrinks back to `base` frames.
    pub(super) fn run_frames(&mut self, base: usize) -> Result<(), VmError> {
        let outer = std::mem::replace(&mut self.base, base);
        let result = self.drain(base);
        self.base = outer;
        if result.is_err() {
            self.frames.truncate(base);
        }
        result
    }

    fn drain(&mut self, base: usize) -> Result<(), VmError> {
        while self.frames.len() > base {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), VmError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        let function: &'a CompiledFunction = frame.function;
        let ip = frame.ip;
        let name = function.name.as_str();
        let code = function.code.as_slice();

        let Some(&byte) = code.get(ip) else {
            // Running off the end behaves like HALT.
            self.frames.pop();
            return Ok(());
        };
        let Some(op) = Opcode::from_byte(byte) else {
            return Err(err_at(
                VmErrorKind::UnknownOpcode,
                format!("Unknown opcode 0x{byte:02X}"),
                name,
                ip,
            ));
        };
        let operand = match op.operand() {
            OperandKind::None => Some(0),
            OperandKind::U16 => read_u16(code, ip + 1),
            OperandKind::Count => code.get(ip + 1).map(|n| *n as usize),
        };
        let Some(operand) = operand else {
            return Err(err_at(
                VmErrorKind::MalformedBytecode,
                format!("Truncated operand for {}", op.mnemonic()),
                name,
                ip,
            ));
        };
        frame.ip = ip + op.width();

        if self.config.trace {
            trace!(function = name, ip, op = op.mnemonic(), operand, stack = self.stack.len());
        }

        match op {
            Opcode::Nop => {}
            Opcode::PushConst => {
                let Some(value) = function.constants.get(operand) else {
                    return Err(err_at(
                        VmErrorKind::MalformedBytecode,
                        format!("Invalid constant index {operand}"),
                        name,
                        ip,
                    ));
                };
                self.stack.push(value.clone());
            }
            Opcode::LoadLocal => self.load_local(operand, name, ip)?,
            Opcode::StoreLocal => self.store_local(operand, false, name, ip)?,
            Opcode::StoreLocalInt => self.store_local(operand, true, name, ip)?,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Eq
            | Opcode::Gt
            | Opcode::Lt
            | Opcode::And
            | Opcode::Or => arith::fold(&mut self.stack, op, operand, name, ip)?,
            Opcode::Neg => arith::neg(&mut self.stack, name, ip)?,
            Opcode::Not => arith::not(&mut self.stack, name, ip)?,
            Opcode::Jmp => self.jump(control_flow::jump(operand, code.len(), name, ip)?),
            Opcode::JmpIfFalse => {
                if let Some(target) =
                    control_flow::jump_if_false(&mut self.stack, operand, code.len(), name, ip)?
                {
                    self.jump(target);
                }
            }
            Opcode::Call => self.call(operand, name, ip)?,
            Opcode::Ret => self.ret(name, ip)?,
            Opcode::Halt => self.halt(),
            Opcode::Print => {
                let Some(value) = self.stack.pop() else {
                    return Err(err_at(
                        VmErrorKind::StackUnderflow,
                        "PRINT expects a value",
                        name,
                        ip,
                    ));
                };
                self.host.print(&value.to_string())?;
            }
            Opcode::MakeArray => arrays::make(&mut self.stack, operand, name, ip)?,
            Opcode::ArrayGet => arrays::get(&mut self.stack, name, ip)?,
            Opcode::ArraySet => arrays::set(&mut self.stack, name, ip)?,
            Opcode::ArrayPush => arrays::push(&mut self.stack, name, ip)?,
            Opcode::ArrayLen => arrays::len(&mut self.stack, name, ip)?,
            Opcode::OnEvent => self.on_event(name, ip)?,
            Opcode::FfiCall => self.ffi_call(operand, name, ip)?,
            Opcode::MemAlloc => self.mem_alloc(name, ip)?,
            Opcode::MemRead => self.mem_read(name, ip)?,
            Opcode::MemWrite => self.mem_write(name, ip)?,
            Opcode::MemFree => self.mem_free(name, ip)?,
        }
        Ok(())
    }

    fn jump(&mut self, target: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = target;
        }
    }
}

pub(super) fn err_at(
    kind: VmErrorKind,
    message: impl Into<String>,
    function: &str,
    ip: usize,
) -> VmError {
    let msg = message.into();
    VmError::new(kind, format!("{function}@{ip}: {msg}"))
}
