//! The module for the main control loop.

use std::time::{Duration, Instant};
use log::{debug, info, warn};
use presence_gpio::keypad::Keypad;
use presence_gpio::{GpioOutput, GpioResult};
use crate::input::EdgeDetector;
use crate::layout::{KeyCategory, KeyIndex};
use crate::machine::SelectionMachine;
use crate::submit::Submitter;

/// The main app state struct.
pub struct App<'a> {
    /// The touch keypad, scanned once per update.
    keypad: &'a dyn Keypad<Key = KeyIndex>,
    /// Turns scans into presses and releases.
    edges: EdgeDetector,
    /// The selection and the LEDs showing it.
    machine: SelectionMachine<'a>,
    /// Delivers finished selections.
    submitter: &'a mut dyn Submitter,
    /// Driven high while a submission is in flight.
    working: &'a dyn GpioOutput,
    /// When a key was last pressed. `None` once the inactivity reset has run.
    last_activity: Option<Instant>,
    inactivity_timeout: Duration,
}

impl<'a> App<'a> {
    /// Creates a new instance of the App.
    pub fn new(
        keypad: &'a dyn Keypad<Key = KeyIndex>,
        edges: EdgeDetector,
        machine: SelectionMachine<'a>,
        submitter: &'a mut dyn Submitter,
        working: &'a dyn GpioOutput,
        inactivity_timeout: Duration,
    ) -> App<'a> {
        App {
            keypad,
            edges,
            machine,
            submitter,
            working,
            last_activity: None,
            inactivity_timeout,
        }
    }

    pub fn machine(&self) -> &SelectionMachine<'a> {
        &self.machine
    }

    /// Scans the keypad, handles new presses and clears a stale selection.
    ///
    /// Any GPIO error ends the update early and is returned; the next update starts over.
    pub fn update(&mut self, now: Instant) -> GpioResult<()> {
        let active = self.keypad.read()?;
        let edges = self.edges.update(&active);

        for key in edges.released {
            self.machine.release(key);
        }

        if !edges.pressed.is_empty() {
            self.last_activity = Some(now);
        }

        for key in edges.pressed {
            self.press(key)?;
        }

        if let Some(last) = self.last_activity {
            if now.saturating_duration_since(last) > self.inactivity_timeout {
                self.last_activity = None;
                self.machine.timeout()?;
            }
        }

        Ok(())
    }

    fn press(&mut self, key: KeyIndex) -> GpioResult<()> {
        match self.machine.keys().category(key) {
            Some(KeyCategory::Submit) => {
                self.working.write(true)?;
                let outcome = self.machine.press_submit(&mut *self.submitter);
                self.working.write(false)?;
                let outcome = outcome?;
                debug!("Submit finished: {:?}", outcome);
                Ok(())
            }
            Some(category) => {
                debug!("Key {} pressed ({:?}).", key, category);
                self.machine.press(key, &mut *self.submitter)
            }
            None => {
                warn!("Unrecognized key: {}", key);
                Ok(())
            }
        }
    }

    /// Releases the status line before the first update.
    pub fn start(&mut self) -> GpioResult<()> {
        info!("Panel ready.");
        self.working.write(false)
    }
}
