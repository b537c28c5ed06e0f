use crate::keypad::Keypad;
use crate::{GpioInput, GpioOutput, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;

/// How the keypad's `read` interprets the scanned lines.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ScanMode {
    /// Only the lowest touched key is reported.
    #[default]
    Single,
    /// Every touched key is reported.
    Multi,
}

/// Driver for the TTP229-BSF capacitive touch controller in its 2-wire serial mode.
///
/// The controller shifts out one bit per key on SDO, clocked by SCL; a touched key reads low.
/// There's no acknowledgement, so a missing controller simply reads as no keys touched
/// (as long as SDO is pulled up).
pub struct Ttp229Keypad<'a> {
    clock: &'a dyn GpioOutput,
    data: &'a dyn GpioInput,
    inputs: usize,
    mode: ScanMode,
    pub settle: Duration,
}

impl Debug for Ttp229Keypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ttp229Keypad({:?}, {:?}, {} inputs)", self.clock, self.data, self.inputs)
    }
}

impl<'a> Ttp229Keypad<'a> {
    /// Creates a new keypad on the given SCL output and SDO input, with `inputs` keys (8 or 16).
    pub fn new(clock: &'a dyn GpioOutput, data: &'a dyn GpioInput, inputs: usize) -> Self {
        Ttp229Keypad {
            clock,
            data,
            inputs,
            mode: ScanMode::default(),
            settle: Duration::from_millis(1),
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Clocks out one full frame and returns the raw SDO levels, one per key.
    ///
    /// `false` means the key is touched.
    pub fn read_raw(&self) -> GpioResult<Vec<bool>> {
        let mut levels = Vec::with_capacity(self.inputs);

        self.clock.write(true)?;
        sleep(self.settle);
        for _ in 0..self.inputs {
            self.clock.write(false)?;
            sleep(self.settle);
            levels.push(self.data.read()?);
            self.clock.write(true)?;
            sleep(self.settle);
        }
        sleep(self.settle);

        trace!("TTP229 frame: {:?}", levels);
        Ok(levels)
    }

    /// Returns the indices of all touched keys, ascending.
    pub fn read_multi(&self) -> GpioResult<Vec<usize>> {
        let levels = self.read_raw()?;
        Ok(levels
            .iter()
            .enumerate()
            .filter(|&(_, &level)| !level)
            .map(|(i, _)| i)
            .collect())
    }

    /// Returns the lowest touched key, if any.
    pub fn read_single(&self) -> GpioResult<Option<usize>> {
        let levels = self.read_raw()?;
        Ok(levels.iter().position(|&level| !level))
    }
}

impl Keypad for Ttp229Keypad<'_> {
    type Key = usize;

    fn read(&self) -> GpioResult<Vec<Self::Key>> {
        match self.mode {
            ScanMode::Single => Ok(self.read_single()?.into_iter().collect()),
            ScanMode::Multi => self.read_multi(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioError;
    use crate::mock::{MockInput, MockOutput};

    fn keypad<'a>(clock: &'a MockOutput, data: &'a MockInput, mode: ScanMode) -> Ttp229Keypad<'a> {
        Ttp229Keypad::new(clock, data, 4)
            .with_mode(mode)
            .with_settle(Duration::ZERO)
    }

    #[test]
    fn multi_mode_reports_every_low_line() {
        let clock = MockOutput::new();
        let data = MockInput::new(true);
        data.push([true, false, true, false]);

        let keys = keypad(&clock, &data, ScanMode::Multi).read().unwrap();

        assert_eq!(keys, vec![1, 3]);
    }

    #[test]
    fn single_mode_prefers_lowest_index() {
        let clock = MockOutput::new();
        let data = MockInput::new(true);
        data.push([true, false, true, false]);

        let keys = keypad(&clock, &data, ScanMode::Single).read().unwrap();

        assert_eq!(keys, vec![1]);
    }

    #[test]
    fn clocks_one_low_high_pair_per_input() {
        let clock = MockOutput::new();
        let data = MockInput::new(true);

        let raw = keypad(&clock, &data, ScanMode::Multi).read_raw().unwrap();

        assert_eq!(raw, vec![true; 4]);
        assert_eq!(data.reads(), 4);
        assert_eq!(
            clock.history(),
            vec![true, false, true, false, true, false, true, false, true]
        );
    }

    #[test]
    fn floating_line_reads_as_idle() {
        let clock = MockOutput::new();
        let data = MockInput::new(true);

        let pad = keypad(&clock, &data, ScanMode::Single);

        assert_eq!(pad.read_single().unwrap(), None);
        assert!(pad.read().unwrap().is_empty());
    }

    #[test]
    fn defaults_to_single_mode() {
        let clock = MockOutput::new();
        let data = MockInput::new(true);

        let pad = Ttp229Keypad::new(&clock, &data, 16);

        assert_eq!(pad.inputs(), 16);
        assert_eq!(pad.mode(), ScanMode::Single);
        assert_eq!(pad.with_mode(ScanMode::Multi).mode(), ScanMode::Multi);
    }

    #[test]
    fn read_failure_aborts_the_frame() {
        let clock = MockOutput::new();
        let data = MockInput::new(true);
        let pad = keypad(&clock, &data, ScanMode::Multi);

        data.set_failing(true);
        assert!(matches!(pad.read(), Err(GpioError::Io(_))));
        // Stopped right after pulling SCL low for the first key.
        assert_eq!(clock.level(), Some(false));
        assert_eq!(data.reads(), 0);

        clock.clear();
        data.set_failing(false);
        assert!(pad.read().unwrap().is_empty());
        assert_eq!(clock.level(), Some(true));
        assert_eq!(clock.history().len(), 9);
    }
}
