use super::{CompiledFunction, FunctionTable, Opcode, OperandKind, Value, read_u16};

impl FunctionTable {
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for f in self.sorted() {
            out.push_str(&f.disassemble());
        }
        out
    }
}

impl CompiledFunction {
    pub fn disassemble(&self) -> String {
        let mut out = format!(
            "fn {} (params={}, locals={}, constants={})\n",
            self.name,
            self.param_count,
            self.local_count,
            self.constants.len()
        );
        let mut ip = 0;
        while ip < self.code.len() {
            let byte = self.code[ip];
            let Some(op) = Opcode::from_byte(byte) else {
                out.push_str(&format!("  {ip:04} .byte 0x{byte:02X}\n"));
                ip += 1;
                continue;
            };
            out.push_str(&format!("  {ip:04} {}\n", self.fmt_instr(op, ip)));
            ip += op.width();
        }
        out
    }

    fn fmt_instr(&self, op: Opcode, ip: usize) -> String {
        let name = op.mnemonic();
        match op.operand() {
            OperandKind::None => name.to_string(),
            OperandKind::Count => match self.code.get(ip + 1) {
                Some(n) => format!("{name} {n}"),
                None => format!("{name} <truncated>"),
            },
            OperandKind::U16 => {
                let Some(v) = read_u16(&self.code, ip + 1) else {
                    return format!("{name} <truncated>");
                };
                if op == Opcode::PushConst {
                    match self.constants.get(v) {
                        Some(c) => format!("{name} {v} ; {}", fmt_value(c)),
                        None => format!("{name} {v} ; <missing>"),
                    }
                } else {
                    format!("{name} {v}")
                }
            }
        }
    }
}

fn fmt_value(v: &Value) -> String {
    match v {
        Value::Int(i) => format!("Int({i})"),
        Value::Float(n) => format!("Float({n})"),
        Value::Bool(b) => format!("Bool({b})"),
        Value::Str(s) => format!("Str({s:?})"),
        Value::Array(items) => format!("Array(len={})", items.borrow().items.len()),
        Value::Pointer { addr, pointee } => format!("Pointer(0x{addr:x}, *{pointee})"),
        Value::Null => "Null".to_string(),
    }
}
