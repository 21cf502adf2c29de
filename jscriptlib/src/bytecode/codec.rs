//! Flat binary artifact for a [`FunctionTable`].
//!
//! Layout (little-endian): `function_count:i32`, then per function the name,
//! `local_count:i32`, `param_count:i32`, `bytecode_len:i32` plus the raw bytes,
//! `constant_count:i32` and the tagged constants. Strings carry a 7-bit
//! (LEB128) length prefix followed by UTF-8 bytes.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::{CompiledFunction, FunctionTable, Value, ValueKind};

const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_STRING: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_NULL: u8 = 4;
const TAG_POINTER: u8 = 5;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected EOF while decoding artifact at byte {0}")]
    UnexpectedEof(usize),
    #[error("Invalid UTF-8 string at byte {0}")]
    InvalidUtf8(usize),
    #[error("Malformed string length prefix at byte {0}")]
    InvalidLength(usize),
    #[error("Negative {what} ({value}) at byte {at}")]
    NegativeCount {
        what: &'static str,
        value: i32,
        at: usize,
    },
    #[error("Unknown constant tag {tag} at byte {at}")]
    UnknownTag { tag: u8, at: usize },
    #[error("Constant of kind '{kind}' in '{function}' cannot be serialized")]
    Unserializable { function: String, kind: ValueKind },
    #[error("{what} {value} does not fit the artifact format")]
    TooLarge { what: &'static str, value: usize },
    #[error("{0} trailing bytes after the last function")]
    TrailingBytes(usize),
    #[error("Function '{0}' appears more than once in the artifact")]
    DuplicateFunction(String),
}

impl FunctionTable {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        write_len(&mut out, "function count", self.len())?;
        for f in self.sorted() {
            write_str(&mut out, &f.name);
            write_len(&mut out, "local count", f.local_count)?;
            write_len(&mut out, "param count", f.param_count)?;
            write_len(&mut out, "bytecode length", f.code.len())?;
            out.extend_from_slice(&f.code);
            write_len(&mut out, "constant count", f.constants.len())?;
            for constant in &f.constants {
                encode_constant(&mut out, &f.name, constant)?;
            }
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut rd = Reader { bytes, idx: 0 };
        let count = rd.read_count("function count")?;
        let mut table = FunctionTable::new();
        for _ in 0..count {
            let name = rd.read_str()?;
            if table.contains(&name) {
                return Err(CodecError::DuplicateFunction(name));
            }
            let local_count = rd.read_count("local count")?;
            let param_count = rd.read_count("param count")?;
            let code_len = rd.read_count("bytecode length")?;
            let code = rd.read_exact(code_len)?.to_vec();
            let constant_count = rd.read_count("constant count")?;
            let mut constants = Vec::with_capacity(constant_count.min(bytes.len()));
            for _ in 0..constant_count {
                constants.push(decode_constant(&mut rd)?);
            }
            table.insert(CompiledFunction {
                name,
                code,
                constants,
                local_count,
                param_count,
            });
        }
        let rest = bytes.len() - rd.idx;
        if rest != 0 {
            return Err(CodecError::TrailingBytes(rest));
        }
        Ok(table)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CodecError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}
fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn write_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn write_bool(out: &mut Vec<u8>, v: bool) {
    write_u8(out, if v { 1 } else { 0 });
}
fn write_len(out: &mut Vec<u8>, what: &'static str, n: usize) -> Result<(), CodecError> {
    let v = i32::try_from(n).map_err(|_| CodecError::TooLarge { what, value: n })?;
    write_i32(out, v);
    Ok(())
}
fn write_str(out: &mut Vec<u8>, s: &str) {
    let mut n = s.len() as u64;
    loop {
        let mut b = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            b |= 0x80;
        }
        out.push(b);
        if n == 0 {
            break;
        }
    }
    out.extend_from_slice(s.as_bytes());
}

fn encode_constant(out: &mut Vec<u8>, function: &str, v: &Value) -> Result<(), CodecError> {
    match v {
        Value::Int(i) => {
            write_u8(out, TAG_INT);
            write_i64(out, *i);
        }
        Value::Float(n) => {
            write_u8(out, TAG_FLOAT);
            write_f64(out, *n);
        }
        Value::Str(s) => {
            write_u8(out, TAG_STRING);
            write_str(out, s);
        }
        Value::Bool(b) => {
            write_u8(out, TAG_BOOL);
            write_bool(out, *b);
        }
        Value::Null => write_u8(out, TAG_NULL),
        Value::Pointer { addr, pointee } => {
            write_u8(out, TAG_POINTER);
            write_u64(out, *addr);
            write_str(out, pointee);
        }
        Value::Array(_) => {
            return Err(CodecError::Unserializable {
                function: function.to_string(),
                kind: ValueKind::Array,
            });
        }
    }
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    idx: usize,
}

impl<'a> Reader<'a> {
    fn read_exact(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .idx
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::UnexpectedEof(self.idx))?;
        let s = &self.bytes[self.idx..end];
        self.idx = end;
        Ok(s)
    }
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_exact(N)?);
        Ok(buf)
    }
    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_exact(1)?[0])
    }
    fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }
    fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }
    fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }
    fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }
    fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }
    fn read_count(&mut self, what: &'static str) -> Result<usize, CodecError> {
        let at = self.idx;
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| CodecError::NegativeCount { what, value, at })
    }
    /// Length prefix is at most five 7-bit groups (a 32-bit length).
    fn read_str_len(&mut self) -> Result<usize, CodecError> {
        let at = self.idx;
        let mut value: u32 = 0;
        for i in 0..5 {
            let b = self.read_u8()?;
            let payload = u32::from(b & 0x7f);
            if i == 4 && payload > 0x0f {
                return Err(CodecError::InvalidLength(at));
            }
            value |= payload << (7 * i);
            if b & 0x80 == 0 {
                return Ok(value as usize);
            }
        }
        Err(CodecError::InvalidLength(at))
    }
    fn read_str(&mut self) -> Result<String, CodecError> {
        let n = self.read_str_len()?;
        let at = self.idx;
        let b = self.read_exact(n)?;
        String::from_utf8(b.to_vec()).map_err(|_| CodecError::InvalidUtf8(at))
    }
}

fn decode_constant(rd: &mut Reader<'_>) -> Result<Value, CodecError> {
    let at = rd.idx;
    match rd.read_u8()? {
        TAG_INT => Ok(Value::Int(rd.read_i64()?)),
        TAG_FLOAT => Ok(Value::Float(rd.read_f64()?)),
        TAG_STRING => Ok(Value::Str(rd.read_str()?)),
        TAG_BOOL => Ok(Value::Bool(rd.read_bool()?)),
        TAG_NULL => Ok(Value::Null),
        TAG_POINTER => {
            let addr = rd.read_u64()?;
            let pointee = rd.read_str()?;
            Ok(Value::Pointer { addr, pointee })
        }
        tag => Err(CodecError::UnknownTag { tag, at }),
    }
}
