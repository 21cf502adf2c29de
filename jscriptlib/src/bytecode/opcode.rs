/// What follows an opcode byte in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    /// Two bytes, low byte first: constant index, local slot or jump target.
    U16,
    /// One byte: operand or argument count.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    PushConst = 0x01,
    LoadLocal = 0x02,
    StoreLocal = 0x03,
    Add = 0x04,
    Sub = 0x05,
    Mul = 0x06,
    Div = 0x07,
    Mod = 0x08,
    Neg = 0x09,
    Eq = 0x0A,
    Gt = 0x0B,
    Lt = 0x0C,
    Jmp = 0x0D,
    JmpIfFalse = 0x0E,
    Call = 0x0F,
    Ret = 0x10,
    Print = 0x11,
    And = 0x12,
    Or = 0x13,
    StoreLocalInt = 0x14,
    MakeArray = 0x15,
    ArrayGet = 0x16,
    ArraySet = 0x17,
    ArrayPush = 0x18,
    ArrayLen = 0x19,
    Not = 0x1A,
    OnEvent = 0x1B,
    FfiCall = 0x1C,
    MemAlloc = 0x1D,
    MemRead = 0x1E,
    MemWrite = 0x1F,
    MemFree = 0x20,
    Halt = 0xFF,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        Some(match byte {
            0x00 => Nop,
            0x01 => PushConst,
            0x02 => LoadLocal,
            0x03 => StoreLocal,
            0x04 => Add,
            0x05 => Sub,
            0x06 => Mul,
            0x07 => Div,
            0x08 => Mod,
            0x09 => Neg,
            0x0A => Eq,
            0x0B => Gt,
            0x0C => Lt,
            0x0D => Jmp,
            0x0E => JmpIfFalse,
            0x0F => Call,
            0x10 => Ret,
            0x11 => Print,
            0x12 => And,
            0x13 => Or,
            0x14 => StoreLocalInt,
            0x15 => MakeArray,
            0x16 => ArrayGet,
            0x17 => ArraySet,
            0x18 => ArrayPush,
            0x19 => ArrayLen,
            0x1A => Not,
            0x1B => OnEvent,
            0x1C => FfiCall,
            0x1D => MemAlloc,
            0x1E => MemRead,
            0x1F => MemWrite,
            0x20 => MemFree,
            0xFF => Halt,
            _ => return None,
        })
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn operand(self) -> OperandKind {
        use Opcode::*;
        match self {
            PushConst | LoadLocal | StoreLocal | StoreLocalInt | Jmp | JmpIfFalse => {
                OperandKind::U16
            }
            Add | Sub | Mul | Div | Mod | Eq | Gt | Lt | And | Or | Call | MakeArray
            | FfiCall => OperandKind::Count,
            _ => OperandKind::None,
        }
    }

    /// Total encoded size including the opcode byte.
    pub fn width(self) -> usize {
        match self.operand() {
            OperandKind::None => 1,
            OperandKind::Count => 2,
            OperandKind::U16 => 3,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "NOP",
            PushConst => "PUSH_CONST",
            LoadLocal => "LOAD_LOCAL",
            StoreLocal => "STORE_LOCAL",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            Eq => "EQ",
            Gt => "GT",
            Lt => "LT",
            Jmp => "JMP",
            JmpIfFalse => "JMP_IF_FALSE",
            Call => "CALL",
            Ret => "RET",
            Print => "PRINT",
            And => "AND",
            Or => "OR",
            StoreLocalInt => "STORE_LOCAL_INT",
            MakeArray => "MAKE_ARRAY",
            ArrayGet => "ARRAY_GET",
            ArraySet => "ARRAY_SET",
            ArrayPush => "ARRAY_PUSH",
            ArrayLen => "ARRAY_LEN",
            Not => "NOT",
            OnEvent => "ON_EVENT",
            FfiCall => "FFI_CALL",
            MemAlloc => "MEM_ALLOC",
            MemRead => "MEM_READ",
            MemWrite => "MEM_WRITE",
            MemFree => "MEM_FREE",
            Halt => "HALT",
        }
    }
}

/// Reads a little-endian 16-bit operand starting at `at`.
pub(crate) fn read_u16(code: &[u8], at: usize) -> Option<usize> {
    let lo = *code.get(at)?;
    let hi = *code.get(at + 1)?;
    Some(u16::from_le_bytes([lo, hi]) as usize)
}
