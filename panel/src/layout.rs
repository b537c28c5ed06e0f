//! Static wiring of the panel: which touch pad means what, and which register outputs drive
//! which LED.

use serde::{Deserialize, Serialize};
use crate::config::ConfigError;

/// Index of a touch pad on the keypad, as reported by the scanner.
pub type KeyIndex = usize;

/// The group a key belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyCategory {
    Leaving,
    Time,
    Guests,
    Locations,
    Submit,
    Clear,
}

/// Assignment of key indices to categories.
///
/// The lists are ordered; a key's position in its list is what gets submitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct KeyLayout {
    pub leaving: KeyIndex,
    pub time: Vec<KeyIndex>,
    pub guests: Vec<KeyIndex>,
    pub locations: Vec<KeyIndex>,
    pub submit: KeyIndex,
    pub clear: KeyIndex,
}

impl Default for KeyLayout {
    fn default() -> Self {
        KeyLayout {
            leaving: 0,
            time: vec![1, 2, 3],
            guests: vec![4, 5, 6, 7],
            locations: vec![8, 9, 10, 11, 12, 13],
            submit: 14,
            clear: 15,
        }
    }
}

impl KeyLayout {
    pub fn category(&self, key: KeyIndex) -> Option<KeyCategory> {
        if key == self.leaving {
            Some(KeyCategory::Leaving)
        } else if self.time.contains(&key) {
            Some(KeyCategory::Time)
        } else if self.guests.contains(&key) {
            Some(KeyCategory::Guests)
        } else if self.locations.contains(&key) {
            Some(KeyCategory::Locations)
        } else if key == self.submit {
            Some(KeyCategory::Submit)
        } else if key == self.clear {
            Some(KeyCategory::Clear)
        } else {
            None
        }
    }

    fn keys(&self) -> impl Iterator<Item = KeyIndex> + '_ {
        [self.leaving, self.submit, self.clear]
            .into_iter()
            .chain(self.time.iter().copied())
            .chain(self.guests.iter().copied())
            .chain(self.locations.iter().copied())
    }

    /// Checks that every key fits the keypad and belongs to exactly one category.
    pub fn validate(&self, inputs: usize) -> Result<(), ConfigError> {
        let mut seen = vec![false; inputs];
        for key in self.keys() {
            let slot = seen
                .get_mut(key)
                .ok_or_else(|| ConfigError::Invalid(format!("key {key} is beyond the {inputs} keypad inputs")))?;
            if *slot {
                return Err(ConfigError::Invalid(format!("key {key} is assigned more than once")));
            }
            *slot = true;
        }
        Ok(())
    }
}

/// Reference to an LED on the shift register chain.
///
/// A dual LED is a two-lead bi-color package: `on` high and `off` low shows the positive
/// color, the reverse shows the negative one, both low leaves it dark.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(untagged)]
pub enum LedRef {
    Single(usize),
    Dual(usize, usize),
}

impl LedRef {
    fn pins(&self) -> Vec<usize> {
        match *self {
            LedRef::Single(pin) => vec![pin],
            LedRef::Dual(on, off) => vec![on, off],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LedLayout {
    /// Number of chained 8-bit registers.
    pub registers: usize,

    pub network: LedRef,
    pub status: LedRef,
    pub guests: LedRef,
    pub locations: LedRef,
    pub submittable: LedRef,

    pub leaving: LedRef,
    /// Index-aligned with [KeyLayout::time].
    pub time_options: Vec<LedRef>,
    /// Index-aligned with [KeyLayout::guests].
    pub guest_options: Vec<LedRef>,
    /// Index-aligned with [KeyLayout::locations].
    pub location_options: Vec<LedRef>,
}

impl Default for LedLayout {
    fn default() -> Self {
        use LedRef::*;

        LedLayout {
            registers: 3,
            network: Dual(0, 1),
            status: Dual(2, 3),
            guests: Dual(4, 5),
            locations: Dual(6, 7),
            submittable: Dual(22, 23),
            leaving: Single(8),
            time_options: vec![Single(9), Single(10), Single(11)],
            guest_options: vec![Single(12), Single(13), Single(14), Single(15)],
            location_options: vec![
                Single(16),
                Single(17),
                Single(18),
                Single(19),
                Single(20),
                Single(21),
            ],
        }
    }
}

impl LedLayout {
    pub fn pin_count(&self) -> usize {
        self.registers * 8
    }

    /// Every indicator cleared by a full reset.
    pub fn selection_leds(&self) -> impl Iterator<Item = LedRef> + '_ {
        [self.status, self.guests, self.locations, self.submittable, self.leaving]
            .into_iter()
            .chain(self.time_options.iter().copied())
            .chain(self.guest_options.iter().copied())
            .chain(self.location_options.iter().copied())
    }

    /// Checks that every pin exists on the chain and the per-option lists line up with the keys.
    pub fn validate(&self, keys: &KeyLayout) -> Result<(), ConfigError> {
        let pin_count = self.pin_count();
        for led in self.selection_leds().chain([self.network]) {
            if let LedRef::Dual(on, off) = led {
                if on == off {
                    return Err(ConfigError::Invalid(format!("dual LED uses pin {on} twice")));
                }
            }
            if let Some(pin) = led.pins().into_iter().find(|&pin| pin >= pin_count) {
                return Err(ConfigError::Invalid(format!(
                    "LED pin {pin} is beyond the {pin_count} register outputs"
                )));
            }
        }

        let groups = [
            ("time", self.time_options.len(), keys.time.len()),
            ("guests", self.guest_options.len(), keys.guests.len()),
            ("locations", self.location_options.len(), keys.locations.len()),
        ];
        for (name, led_count, key_count) in groups {
            if led_count != key_count {
                return Err(ConfigError::Invalid(format!(
                    "{name}: {led_count} option LEDs for {key_count} keys"
                )));
            }
        }
        Ok(())
    }
}
