use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmErrorKind {
    EntryNotFound,
    UnknownFunction,
    UnknownOpcode,
    MalformedBytecode,
    ArityMismatch,
    StackUnderflow,
    StackOverflow,
    TypeMismatch,
    InvalidLocal,
    DivisionByZero,
    IndexOutOfBounds,
    CapabilityMissing,
    MemoryFault,
    HostError,
}

impl VmErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            VmErrorKind::EntryNotFound => "E-VM-ENTRY",
            VmErrorKind::UnknownFunction => "E-VM-UNKNOWN-FUNCTION",
            VmErrorKind::UnknownOpcode => "E-VM-UNKNOWN-OPCODE",
            VmErrorKind::MalformedBytecode => "E-VM-MALFORMED",
            VmErrorKind::ArityMismatch => "E-VM-ARITY",
            VmErrorKind::StackUnderflow => "E-VM-STACK-UNDERFLOW",
            VmErrorKind::StackOverflow => "E-VM-STACK-OVERFLOW",
            VmErrorKind::TypeMismatch => "E-VM-TYPE",
            VmErrorKind::InvalidLocal => "E-VM-INVALID-LOCAL",
            VmErrorKind::DivisionByZero => "E-VM-DIV-ZERO",
            VmErrorKind::IndexOutOfBounds => "E-VM-INDEX-OOB",
            VmErrorKind::CapabilityMissing => "E-VM-CAPABILITY",
            VmErrorKind::MemoryFault => "E-VM-MEMORY",
            VmErrorKind::HostError => "E-VM-HOST",
        }
    }
}

/// Fatal runtime fault. The VM never resumes after returning one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct VmError {
    pub kind: VmErrorKind,
    pub message: String,
}

impl VmError {
    pub fn new(kind: VmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
