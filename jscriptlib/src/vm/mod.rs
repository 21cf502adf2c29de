//! Bytecode VM entrypoint and public VM surface.
//!
//! Internals are split into:
//! - `error`: VM runtime error types
//! - `config`: runtime execution configuration
//! - `host_trait` + `host`: output boundary for `PRINT`
//! - `ffi`, `graphics`, `memory`: opt-in capabilities for native calls
//! - `runner`: fetch-decode-execute loop and instruction handlers

mod config;
mod error;
mod ffi;
mod graphics;
mod host;
mod host_trait;
mod memory;
mod runner;

use std::collections::HashMap;

use tracing::debug;

use crate::bytecode::{FunctionTable, Value};

pub use config::{DEFAULT_MAX_CALL_DEPTH, VmConfig};
pub use error::{VmError, VmErrorKind};
pub use ffi::{FfiArg, FfiInvoker};
pub use graphics::{DrawRect, EventSink, GraphicsBackend, HeadlessGraphics};
pub use host::{StdIoHost, TestHost};
pub use host_trait::Host;
pub use memory::{ArenaMemory, DEFAULT_ARENA_LIMIT, MemoryCapability};

use runner::CallFrame;

pub const DEFAULT_ENTRY: &str = "Main.main";

/// Graphics capability state. While the backend runs its loop it is lent out,
/// and draws issued by event handlers queue up until the dispatch returns.
enum GraphicsSlot<'a> {
    Absent,
    Ready(&'a mut dyn GraphicsBackend),
    Looping {
        layer: u64,
        device: u64,
        pending: Vec<DrawRect>,
    },
}

/// One execution of a function table: a call stack of frames sharing a
/// single operand stack.
pub struct Vm<'a> {
    functions: &'a FunctionTable,
    config: VmConfig,
    host: &'a mut dyn Host,
    ffi: Option<&'a mut dyn FfiInvoker>,
    memory: Option<&'a mut dyn MemoryCapability>,
    graphics: GraphicsSlot<'a>,
    stack: Vec<Value>,
    frames: Vec<CallFrame<'a>>,
    handlers: HashMap<String, Vec<String>>,
    /// Frames at or below this depth belong to an outer run.
    base: usize,
    last_return: Value,
}

impl<'a> Vm<'a> {
    pub fn new(functions: &'a FunctionTable, host: &'a mut dyn Host) -> Self {
        Self {
            functions,
            config: VmConfig::default(),
            host,
            ffi: None,
            memory: None,
            graphics: GraphicsSlot::Absent,
            stack: Vec::with_capacity(64),
            frames: Vec::new(),
            handlers: HashMap::new(),
            base: 0,
            last_return: Value::Null,
        }
    }

    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ffi(mut self, ffi: &'a mut dyn FfiInvoker) -> Self {
        self.ffi = Some(ffi);
        self
    }

    pub fn with_graphics(mut self, graphics: &'a mut dyn GraphicsBackend) -> Self {
        self.graphics = GraphicsSlot::Ready(graphics);
        self
    }

    pub fn with_memory(mut self, memory: &'a mut dyn MemoryCapability) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Runs `entry` until its frame drains and returns its `RET` value, or
    /// `Null` when it halts without one.
    pub fn run(&mut self, entry: &str, args: Vec<Value>) -> Result<Value, VmError> {
        let functions = self.functions;
        let Some(function) = functions.get(entry) else {
            return Err(VmError::new(
                VmErrorKind::EntryNotFound,
                format!("Entry point '{entry}' not found"),
            ));
        };
        debug!(entry, functions = functions.len(), "vm run started");
        self.last_return = Value::Null;
        let base = self.frames.len();
        self.push_frame(function, args)?;
        self.run_frames(base)?;
        debug!(entry, stack = self.stack.len(), "vm run finished");
        Ok(std::mem::replace(&mut self.last_return, Value::Null))
    }

    /// Runs every handler registered for `event` to completion, in
    /// registration order. Events without handlers are ignored.
    pub fn fire_event(&mut self, event: &str, args: Vec<Value>) -> Result<(), VmError> {
        let Some(handlers) = self.handlers.get(event).cloned() else {
            return Ok(());
        };
        debug!(event, handlers = handlers.len(), "dispatching event");
        let functions = self.functions;
        // Handler return values are discarded; `last_return` belongs to the outer run.
        let outer_return = std::mem::replace(&mut self.last_return, Value::Null);
        let result = self.dispatch_handlers(functions, event, handlers, args);
        self.last_return = outer_return;
        result
    }

    fn dispatch_handlers(
        &mut self,
        functions: &'a FunctionTable,
        event: &str,
        handlers: Vec<String>,
        args: Vec<Value>,
    ) -> Result<(), VmError> {
        for handler in handlers {
            let Some(function) = functions.get(&handler) else {
                return Err(VmError::new(
                    VmErrorKind::UnknownFunction,
                    format!("Unknown handler '{handler}' for event '{event}'"),
                ));
            };
            let mut call_args = args.clone();
            call_args.resize(function.param_count, Value::Null);
            let height = self.stack.len();
            let base = self.frames.len();
            self.push_frame(function, call_args)?;
            let result = self.run_frames(base);
            self.stack.truncate(height);
            result?;
        }
        Ok(())
    }

    pub fn handlers(&self, event: &str) -> &[String] {
        self.handlers.get(event).map(Vec::as_slice).unwrap_or_default()
    }

    /// Operand stack height; values left by statement-form calls stay here.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    fn take_pending_draws(&mut self) -> Vec<DrawRect> {
        match &mut self.graphics {
            GraphicsSlot::Looping { pending, .. } => std::mem::take(pending),
            _ => Vec::new(),
        }
    }
}

impl EventSink for Vm<'_> {
    fn dispatch(&mut self, event: &str, args: Vec<Value>) -> Result<Vec<DrawRect>, VmError> {
        self.fire_event(event, args)?;
        Ok(self.take_pending_draws())
    }
}

/// Runs `entry` against stdout.
pub fn run_entry(functions: &FunctionTable, entry: &str) -> Result<Value, VmError> {
    let mut host = StdIoHost;
    Vm::new(functions, &mut host).run(entry, Vec::new())
}

pub fn run_entry_with_host(
    functions: &FunctionTable,
    entry: &str,
    host: &mut dyn Host,
) -> Result<Value, VmError> {
    Vm::new(functions, host).run(entry, Vec::new())
}
