use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Str,
    Bool,
    Array,
    Pointer,
    Null,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Bool => "bool",
            ValueKind::Array => "array",
            ValueKind::Pointer => "pointer",
            ValueKind::Null => "null",
        }
    }

    /// Identical kinds match, and Int/Float are interchangeable.
    pub fn compatible_with(self, other: ValueKind) -> bool {
        self == other
            || matches!(
                (self, other),
                (ValueKind::Int, ValueKind::Float) | (ValueKind::Float, ValueKind::Int)
            )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    pub items: Vec<Value>,
    /// `None` until the array holds its first element.
    pub element: Option<ValueKind>,
}

/// Arrays are shared handles: every alias observes `set`/`push`.
pub type ArrayRef = Rc<RefCell<ArrayData>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Array(ArrayRef),
    Pointer { addr: u64, pointee: String },
    Null,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Bool(_) => ValueKind::Bool,
            Value::Array(_) => ValueKind::Array,
            Value::Pointer { .. } => ValueKind::Pointer,
            Value::Null => ValueKind::Null,
        }
    }

    /// Builds an array whose element kind comes from its first item.
    pub fn array(items: Vec<Value>) -> Self {
        let element = items.first().map(Value::kind);
        Value::Array(Rc::new(RefCell::new(ArrayData { items, element })))
    }

    pub fn pointer(addr: u64, pointee: impl Into<String>) -> Self {
        Value::Pointer {
            addr,
            pointee: pointee.into(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view; floats truncate toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// `false`, zero, `null` and the null pointer are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Pointer { addr, .. } => *addr != 0,
            Value::Null => false,
            Value::Str(_) | Value::Array(_) => true,
        }
    }

    /// Equality used by `EQ`: numeric across Int/Float, structural elsewhere.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.items.len() == b.items.len()
                    && a.items.iter().zip(&b.items).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Pointer { addr: a, .. }, Value::Pointer { addr: b, .. }) => a == b,
            (Value::Pointer { addr, .. }, Value::Null) | (Value::Null, Value::Pointer { addr, .. }) => {
                *addr == 0
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Pointer { addr, .. } => write!(f, "0x{addr:x}"),
            Value::Null => f.write_str("null"),
        }
    }
}
