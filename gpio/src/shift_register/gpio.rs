use crate::shift_register::ShiftRegisterChain;
use crate::{GpioOutput, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;

/// A chain of 74HC595 registers bit-banged over three GPIO outputs.
///
/// The data line is sampled on the rising edge of the clock (SHCP), the
/// storage register is updated on the rising edge of the latch (STCP).
pub struct Gpio595Chain<'a> {
    data: &'a dyn GpioOutput,
    clock: &'a dyn GpioOutput,
    latch: &'a dyn GpioOutput,
    pulse: Duration,
}

impl Debug for Gpio595Chain<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gpio595Chain({:?}, {:?}, {:?})", self.data, self.clock, self.latch)
    }
}

impl<'a> Gpio595Chain<'a> {
    pub fn new(
        data: &'a dyn GpioOutput,
        clock: &'a dyn GpioOutput,
        latch: &'a dyn GpioOutput,
    ) -> Self {
        Gpio595Chain {
            data,
            clock,
            latch,
            pulse: Duration::from_micros(1),
        }
    }

    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }

    fn pulse(&self, pin: &dyn GpioOutput) -> GpioResult<()> {
        pin.write(true)?;
        sleep(self.pulse);
        pin.write(false)?;
        sleep(self.pulse);
        Ok(())
    }

    fn shift_byte(&self, byte: u8) -> GpioResult<()> {
        // Q7 first, so that Q0 ends up holding bit 0.
        for bit in (0..8).rev() {
            self.data.write(byte >> bit & 1 == 1)?;
            self.pulse(self.clock)?;
        }
        Ok(())
    }
}

impl ShiftRegisterChain for Gpio595Chain<'_> {
    fn latch(&self, image: &[u8]) -> GpioResult<()> {
        trace!("Latching image: {:02x?}", image);

        self.latch.write(false)?;
        // The first byte shifted ends up in the register furthest from the controller.
        for &byte in image.iter().rev() {
            self.shift_byte(byte)?;
        }
        self.latch.write(true)?;
        sleep(self.pulse);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOutput;

    #[test]
    fn shifts_last_register_first_msb_first() {
        let data = MockOutput::new();
        let clock = MockOutput::new();
        let latch = MockOutput::new();
        let chain = Gpio595Chain::new(&data, &clock, &latch).with_pulse(Duration::ZERO);

        chain.latch(&[0b0000_0001, 0b1000_0000]).unwrap();

        let mut expected = vec![true];
        expected.extend([false; 7]);
        expected.extend([false; 7]);
        expected.push(true);
        assert_eq!(data.history(), expected);
    }

    #[test]
    fn pulses_clock_once_per_bit_and_latch_once() {
        let data = MockOutput::new();
        let clock = MockOutput::new();
        let latch = MockOutput::new();
        let chain = Gpio595Chain::new(&data, &clock, &latch).with_pulse(Duration::ZERO);

        chain.latch(&[0xff, 0x00, 0xa5]).unwrap();

        let rising = clock.history().iter().filter(|&&v| v).count();
        assert_eq!(rising, 24);
        assert_eq!(latch.history(), vec![false, true]);
    }
}
