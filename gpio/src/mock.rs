//! In-memory implementations of the GPIO traits.
//!
//! Useful for exercising drivers and application logic without hardware.

use crate::shift_register::ShiftRegisterChain;
use crate::{GpioError, GpioInput, GpioOutput, GpioResult};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// An output that remembers every value written to it.
#[derive(Debug, Default)]
pub struct MockOutput {
    history: RefCell<Vec<bool>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values written so far, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }

    /// The last written value, if any.
    pub fn level(&self) -> Option<bool> {
        self.history.borrow().last().copied()
    }

    pub fn clear(&self) {
        self.history.borrow_mut().clear();
    }
}

impl GpioOutput for MockOutput {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.history.borrow_mut().push(value);
        Ok(())
    }
}

/// An input that replays a scripted sequence of levels.
///
/// Once the script runs out, `idle` is returned forever.
#[derive(Debug)]
pub struct MockInput {
    script: RefCell<VecDeque<bool>>,
    idle: bool,
    reads: Cell<usize>,
    fail: Cell<bool>,
}

impl MockInput {
    pub fn new(idle: bool) -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            idle,
            reads: Cell::new(0),
            fail: Cell::new(false),
        }
    }

    /// Appends levels to be returned by subsequent reads.
    pub fn push(&self, levels: impl IntoIterator<Item = bool>) {
        self.script.borrow_mut().extend(levels);
    }

    /// Number of reads performed so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Makes every following read fail with an IO error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl GpioInput for MockInput {
    fn read(&self) -> GpioResult<bool> {
        if self.fail.get() {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
        }
        self.reads.set(self.reads.get() + 1);
        Ok(self.script.borrow_mut().pop_front().unwrap_or(self.idle))
    }
}

/// A shift register chain that keeps every frame it was asked to latch.
#[derive(Debug, Default)]
pub struct RecordingChain {
    frames: RefCell<Vec<Vec<u8>>>,
    fail: Cell<bool>,
}

impl RecordingChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.borrow().clone()
    }

    /// The most recently latched frame.
    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.frames.borrow().last().cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Makes every following latch fail without recording the frame.
    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl ShiftRegisterChain for RecordingChain {
    fn latch(&self, image: &[u8]) -> GpioResult<()> {
        if self.fail.get() {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
        }
        self.frames.borrow_mut().push(image.to_vec());
        Ok(())
    }
}
