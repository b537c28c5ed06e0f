//! The LED image kept in memory and pushed to the shift register chain on demand.

use log::{debug, warn};
use presence_gpio::GpioResult;
use presence_gpio::shift_register::ShiftRegisterChain;
use crate::layout::LedRef;

/// Owns the bit image of all LED outputs.
///
/// Nothing changes on the hardware until [LedBank::flush] is called.
#[derive(Debug)]
pub struct LedBank<'a> {
    image: Vec<u8>,
    chain: &'a dyn ShiftRegisterChain,
}

impl<'a> LedBank<'a> {
    pub fn new(chain: &'a dyn ShiftRegisterChain, registers: usize) -> Self {
        LedBank {
            image: vec![0; registers],
            chain,
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Whether `pin` is set in the image, regardless of what was flushed.
    pub fn is_high(&self, pin: usize) -> bool {
        self.image
            .get(pin / 8)
            .is_some_and(|&byte| byte >> (pin % 8) & 1 == 1)
    }

    fn write_bit(&mut self, pin: usize, high: bool) {
        let Some(byte) = self.image.get_mut(pin / 8) else {
            warn!("LED pin {} is not on the chain, ignoring.", pin);
            return;
        };
        if high {
            *byte |= 1 << (pin % 8);
        } else {
            *byte &= !(1 << (pin % 8));
        }
    }

    pub fn set_low(&mut self, pin: usize) {
        self.write_bit(pin, false);
    }

    pub fn set_high(&mut self, pin: usize) {
        self.write_bit(pin, true);
    }

    /// Turns the LED off. A dual LED goes dark, which is neither of its colors.
    pub fn disable(&mut self, led: LedRef) {
        match led {
            LedRef::Single(pin) => self.set_low(pin),
            LedRef::Dual(on, off) => {
                self.set_low(on);
                self.set_low(off);
            }
        }
    }

    /// Turns the LED on; a dual LED shows its positive color.
    pub fn enable(&mut self, led: LedRef) {
        self.switch(led, true);
    }

    /// Shows `state` on the LED. For a dual LED `false` is the negative color, not dark.
    pub fn switch(&mut self, led: LedRef, state: bool) {
        match led {
            LedRef::Single(pin) if state => self.set_high(pin),
            LedRef::Single(pin) => self.set_low(pin),
            LedRef::Dual(on, off) if state => {
                self.set_high(on);
                self.set_low(off);
            }
            LedRef::Dual(on, off) => {
                self.set_low(on);
                self.set_high(off);
            }
        }
    }

    /// What the image currently shows on the LED: `None` when dark.
    pub fn shown(&self, led: LedRef) -> Option<bool> {
        match led {
            LedRef::Single(pin) => self.is_high(pin).then_some(true),
            LedRef::Dual(on, off) => match (self.is_high(on), self.is_high(off)) {
                (true, false) => Some(true),
                (false, true) => Some(false),
                _ => None,
            },
        }
    }

    /// Flips `state` and shows it on the LED.
    pub fn toggle(&mut self, led: LedRef, state: &mut bool) {
        *state = !*state;
        self.switch(led, *state);
    }

    /// Pushes the image to the registers.
    pub fn flush(&self) -> GpioResult<()> {
        debug!("Flushing LEDs: {:02x?}", self.image);
        self.chain.latch(&self.image)
    }
}
