mod gpio;

use std::fmt::Debug;
use crate::GpioResult;
pub use gpio::*;

/// A chain of daisy-chained 8-bit serial-in/parallel-out shift registers.
///
/// Byte `i` of the image drives register `i` counted from the controller,
/// bit `b` of it drives output `Q_b`.
pub trait ShiftRegisterChain: Debug {
    /// Shifts the whole image out and latches it onto the outputs at once.
    fn latch(&self, image: &[u8]) -> GpioResult<()>;
}
