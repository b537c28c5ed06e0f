mod ttp229;

use std::fmt::Debug;
use crate::GpioResult;
pub use ttp229::*;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Reads the keys that are currently pressed, in ascending order.
    fn read(&self) -> GpioResult<Vec<Self::Key>>;
}
