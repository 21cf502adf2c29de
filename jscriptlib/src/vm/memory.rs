//! Raw memory capability behind `MEM_ALLOC`/`MEM_READ`/`MEM_WRITE`/`MEM_FREE`.
//!
//! The VM only forwards addresses and typed widths; bounds and lifetime
//! policy belong to the implementation. A VM without one installed faults on
//! every memory opcode.

use crate::bytecode::Value;
use crate::types::{MemoryWidth, VOID_POINTEE};

use super::{VmError, VmErrorKind};

pub trait MemoryCapability {
    /// Returns the address of a fresh zeroed block of `size` bytes.
    fn alloc(&mut self, size: usize) -> Result<u64, VmError>;
    fn read(&mut self, address: u64, offset: usize, width: MemoryWidth) -> Result<Value, VmError>;
    fn write(
        &mut self,
        address: u64,
        offset: usize,
        width: MemoryWidth,
        value: &Value,
    ) -> Result<(), VmError>;
    fn free(&mut self, address: u64) -> Result<(), VmError>;
}

pub const DEFAULT_ARENA_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Debug)]
struct Block {
    generation: u32,
    bytes: Option<Vec<u8>>,
}

/// Safe backing for the memory opcodes.
///
/// An address packs `generation << 32 | (slot + 1)`; zero stays the null
/// pointer. Freeing a block bumps its generation, so stale addresses fault
/// instead of aliasing a later allocation.
#[derive(Debug)]
pub struct ArenaMemory {
    blocks: Vec<Block>,
    free_slots: Vec<usize>,
    live_bytes: usize,
    limit: usize,
}

impl Default for ArenaMemory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_ARENA_LIMIT)
    }
}

impl ArenaMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            blocks: Vec::new(),
            free_slots: Vec::new(),
            live_bytes: 0,
            limit,
        }
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.bytes.is_some()).count()
    }

    fn address(slot: usize, generation: u32) -> u64 {
        (u64::from(generation) << 32) | (slot as u64 + 1)
    }

    fn locate(&self, address: u64) -> Result<usize, VmError> {
        if address == 0 {
            return Err(fault("Null pointer dereference"));
        }
        let slot = (address & 0xFFFF_FFFF) as usize;
        let generation = (address >> 32) as u32;
        let Some(index) = slot.checked_sub(1) else {
            return Err(fault(format!("Invalid pointer 0x{address:x}")));
        };
        match self.blocks.get(index) {
            Some(block) if block.generation == generation && block.bytes.is_some() => Ok(index),
            Some(_) => Err(fault(format!("Dangling pointer 0x{address:x}"))),
            None => Err(fault(format!("Invalid pointer 0x{address:x}"))),
        }
    }

    fn span(&mut self, address: u64, offset: usize, width: MemoryWidth) -> Result<&mut [u8], VmError> {
        let index = self.locate(address)?;
        let bytes = self.blocks[index].bytes.as_mut().ok_or_else(|| fault("Dangling pointer"))?;
        let len = bytes.len();
        let end = offset
            .checked_add(width.size())
            .filter(|end| *end <= len)
            .ok_or_else(|| {
                fault(format!(
                    "{} access at offset {offset} overruns a {len}-byte block",
                    width.name()
                ))
            })?;
        Ok(&mut bytes[offset..end])
    }
}

fn fault(message: impl Into<String>) -> VmError {
    VmError::new(VmErrorKind::MemoryFault, message)
}

impl MemoryCapability for ArenaMemory {
    fn alloc(&mut self, size: usize) -> Result<u64, VmError> {
        if self.live_bytes.saturating_add(size) > self.limit {
            return Err(fault(format!(
                "Allocation of {size} bytes exceeds the arena limit of {} bytes",
                self.limit
            )));
        }
        self.live_bytes += size;
        let bytes = Some(vec![0u8; size]);
        if let Some(slot) = self.free_slots.pop() {
            let block = &mut self.blocks[slot];
            block.bytes = bytes;
            return Ok(Self::address(slot, block.generation));
        }
        if self.blocks.len() >= u32::MAX as usize {
            return Err(fault("Arena slot space exhausted"));
        }
        self.blocks.push(Block {
            generation: 0,
            bytes,
        });
        Ok(Self::address(self.blocks.len() - 1, 0))
    }

    fn read(&mut self, address: u64, offset: usize, width: MemoryWidth) -> Result<Value, VmError> {
        let span = self.span(address, offset, width)?;
        let mut buf = [0u8; 8];
        buf[..span.len()].copy_from_slice(span);
        Ok(match width {
            MemoryWidth::Int8 => Value::Int(i64::from(buf[0] as i8)),
            MemoryWidth::Int16 => Value::Int(i64::from(i16::from_le_bytes([buf[0], buf[1]]))),
            MemoryWidth::Int32 => Value::Int(i64::from(i32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            MemoryWidth::Int64 => Value::Int(i64::from_le_bytes(buf)),
            MemoryWidth::Float32 => Value::Float(f64::from(f32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            MemoryWidth::Float64 => Value::Float(f64::from_le_bytes(buf)),
            MemoryWidth::Ptr => Value::pointer(u64::from_le_bytes(buf), VOID_POINTEE),
        })
    }

    fn write(
        &mut self,
        address: u64,
        offset: usize,
        width: MemoryWidth,
        value: &Value,
    ) -> Result<(), VmError> {
        let encoded: Vec<u8> = match width {
            MemoryWidth::Ptr => match value {
                Value::Pointer { addr, .. } => addr.to_le_bytes().to_vec(),
                Value::Null => 0u64.to_le_bytes().to_vec(),
                other => return Err(type_error(width, other)),
            },
            MemoryWidth::Float32 | MemoryWidth::Float64 => {
                let v = value.as_f64().ok_or_else(|| type_error(width, value))?;
                if width == MemoryWidth::Float32 {
                    (v as f32).to_le_bytes().to_vec()
                } else {
                    v.to_le_bytes().to_vec()
                }
            }
            _ => {
                let v = value.as_i64().ok_or_else(|| type_error(width, value))?;
                v.to_le_bytes()[..width.size()].to_vec()
            }
        };
        let span = self.span(address, offset, width)?;
        span.copy_from_slice(&encoded);
        Ok(())
    }

    fn free(&mut self, address: u64) -> Result<(), VmError> {
        let index = self.locate(address)?;
        let block = &mut self.blocks[index];
        if let Some(bytes) = block.bytes.take() {
            self.live_bytes -= bytes.len();
        }
        block.generation = block.generation.wrapping_add(1);
        self.free_slots.push(index);
        Ok(())
    }
}

fn type_error(width: MemoryWidth, value: &Value) -> VmError {
    VmError::new(
        VmErrorKind::TypeMismatch,
        format!("Cannot write '{}' as {}", value.kind(), width.name()),
    )
}
