use core::fmt;

use crate::bytecode::ValueKind;

/// Pointee name that matches any other pointer type.
pub const VOID_POINTEE: &str = "void";

/// A declared or inferred source-level type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Int,
    Float,
    Str,
    Bool,
    /// Element kind is `None` for literals whose first element is untyped.
    Array(Option<ValueKind>),
    Pointer(String),
}

impl TypeInfo {
    /// Parses a type annotation such as `int`, `string[]` or `*Point`.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(pointee) = text.strip_prefix('*') {
            let pointee = pointee.trim();
            if pointee.is_empty() {
                return None;
            }
            return Some(TypeInfo::Pointer(pointee.to_string()));
        }
        if let Some(elem) = text.strip_suffix("[]") {
            let elem = match elem {
                "int" => ValueKind::Int,
                "float" => ValueKind::Float,
                "string" => ValueKind::Str,
                "bool" => ValueKind::Bool,
                _ => return None,
            };
            return Some(TypeInfo::Array(Some(elem)));
        }
        match text {
            "int" => Some(TypeInfo::Int),
            "float" => Some(TypeInfo::Float),
            "string" => Some(TypeInfo::Str),
            "bool" => Some(TypeInfo::Bool),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            TypeInfo::Int => ValueKind::Int,
            TypeInfo::Float => ValueKind::Float,
            TypeInfo::Str => ValueKind::Str,
            TypeInfo::Bool => ValueKind::Bool,
            TypeInfo::Array(_) => ValueKind::Array,
            TypeInfo::Pointer(_) => ValueKind::Pointer,
        }
    }

    pub fn from_kind(kind: ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Int => Some(TypeInfo::Int),
            ValueKind::Float => Some(TypeInfo::Float),
            ValueKind::Str => Some(TypeInfo::Str),
            ValueKind::Bool => Some(TypeInfo::Bool),
            ValueKind::Array => Some(TypeInfo::Array(None)),
            ValueKind::Pointer => Some(TypeInfo::Pointer(VOID_POINTEE.to_string())),
            ValueKind::Null => None,
        }
    }

    pub fn element(&self) -> Option<ValueKind> {
        match self {
            TypeInfo::Array(elem) => *elem,
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeInfo::Int | TypeInfo::Float)
    }

    /// Whether a value of type `other` may be stored where `self` is declared.
    pub fn accepts(&self, other: &TypeInfo) -> bool {
        match (self, other) {
            (TypeInfo::Pointer(a), TypeInfo::Pointer(b)) => {
                a == b || a == VOID_POINTEE || b == VOID_POINTEE
            }
            (TypeInfo::Array(Some(a)), TypeInfo::Array(Some(b))) => a.compatible_with(*b),
            (TypeInfo::Array(_), TypeInfo::Array(_)) => true,
            _ => self.kind().compatible_with(other.kind()),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInfo::Array(Some(elem)) => write!(f, "{elem}[]"),
            TypeInfo::Array(None) => f.write_str("array"),
            TypeInfo::Pointer(pointee) => write!(f, "*{pointee}"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Typed access width used by the raw memory opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryWidth {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Ptr,
}

impl MemoryWidth {
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "int8" => MemoryWidth::Int8,
            "int16" => MemoryWidth::Int16,
            "int32" => MemoryWidth::Int32,
            "int64" | "int" => MemoryWidth::Int64,
            "float32" => MemoryWidth::Float32,
            "float64" | "float" => MemoryWidth::Float64,
            "ptr" => MemoryWidth::Ptr,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            MemoryWidth::Int8 => 1,
            MemoryWidth::Int16 => 2,
            MemoryWidth::Int32 | MemoryWidth::Float32 => 4,
            MemoryWidth::Int64 | MemoryWidth::Float64 | MemoryWidth::Ptr => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MemoryWidth::Int8 => "int8",
            MemoryWidth::Int16 => "int16",
            MemoryWidth::Int32 => "int32",
            MemoryWidth::Int64 => "int64",
            MemoryWidth::Float32 => "float32",
            MemoryWidth::Float64 => "float64",
            MemoryWidth::Ptr => "ptr",
        }
    }
}
