//! Graphics capability and the event sink the VM exposes to it.

use std::collections::VecDeque;

use crate::bytecode::Value;

use super::VmError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Receives input events from a running backend loop.
///
/// `dispatch` runs every handler registered for `event` to completion before
/// returning, and hands back the rectangles those handlers drew.
pub trait EventSink {
    fn dispatch(&mut self, event: &str, args: Vec<Value>) -> Result<Vec<DrawRect>, VmError>;
}

pub trait GraphicsBackend {
    fn init(&mut self, width: i64, height: i64, title: &str) -> Result<(), VmError>;
    fn draw_rect(&mut self, rect: DrawRect) -> Result<(), VmError>;
    /// Blocks until the window closes, feeding input through `events`.
    fn run_loop(&mut self, events: &mut dyn EventSink) -> Result<(), VmError>;
    fn layer_ptr(&self) -> u64;
    fn device_ptr(&self) -> u64;
}

/// Window-less backend: records draws and replays a scripted event queue.
#[derive(Debug, Default)]
pub struct HeadlessGraphics {
    pub window: Option<(i64, i64, String)>,
    pub draws: Vec<DrawRect>,
    pub script: VecDeque<(String, Vec<Value>)>,
    pub frames: usize,
}

impl HeadlessGraphics {
    pub const LAYER: u64 = 0x1000;
    pub const DEVICE: u64 = 0x2000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = (String, Vec<Value>)>) -> Self {
        Self {
            script: events.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl GraphicsBackend for HeadlessGraphics {
    fn init(&mut self, width: i64, height: i64, title: &str) -> Result<(), VmError> {
        self.window = Some((width, height, title.to_string()));
        Ok(())
    }

    fn draw_rect(&mut self, rect: DrawRect) -> Result<(), VmError> {
        self.draws.push(rect);
        Ok(())
    }

    fn run_loop(&mut self, events: &mut dyn EventSink) -> Result<(), VmError> {
        while let Some((event, args)) = self.script.pop_front() {
            let drawn = events.dispatch(&event, args)?;
            self.draws.extend(drawn);
            self.frames += 1;
        }
        Ok(())
    }

    fn layer_ptr(&self) -> u64 {
        Self::LAYER
    }

    fn device_ptr(&self) -> u64 {
        Self::DEVICE
    }
}
