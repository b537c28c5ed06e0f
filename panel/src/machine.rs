//! The selection state machine: key presses in, LED feedback and submissions out.

use std::thread::sleep;
use std::time::Duration;
use log::{debug, info, warn};
use presence_gpio::GpioResult;
use crate::config::Timing;
use crate::layout::{KeyCategory, KeyIndex, KeyLayout, LedLayout, LedRef};
use crate::leds::LedBank;
use crate::selection::{toggle_single, Selection, SubmissionRecord};
use crate::submit::{SubmitError, Submitter};

/// What happened when the submit key was pressed.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The selection isn't complete; the submittable LED blinked.
    Incomplete,
    /// Delivered, and the selection was cleared.
    Sent,
    /// Delivery failed; the selection is kept for another try.
    Failed(SubmitError),
}

/// Holds the in-progress [Selection] and keeps the LEDs in sync with it.
///
/// Every transition ends with a flush, so the panel always shows the current state.
#[derive(Debug)]
pub struct SelectionMachine<'a> {
    selection: Selection,
    keys: KeyLayout,
    layout: LedLayout,
    leds: LedBank<'a>,
    blink_count: u32,
    blink_interval: Duration,
    failure_delay: Duration,
}

impl<'a> SelectionMachine<'a> {
    pub fn new(keys: KeyLayout, layout: LedLayout, leds: LedBank<'a>, timing: &Timing) -> Self {
        SelectionMachine {
            selection: Selection::default(),
            keys,
            layout,
            leds,
            blink_count: timing.blink_count,
            blink_interval: timing.blink_interval(),
            failure_delay: timing.failure_delay(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn leds(&self) -> &LedBank<'a> {
        &self.leds
    }

    pub fn leds_mut(&mut self) -> &mut LedBank<'a> {
        &mut self.leds
    }

    pub fn keys(&self) -> &KeyLayout {
        &self.keys
    }

    /// Dispatches a key press by category. Unknown keys are logged and ignored.
    pub fn press(&mut self, key: KeyIndex, submitter: &mut dyn Submitter) -> GpioResult<()> {
        match self.keys.category(key) {
            Some(KeyCategory::Leaving | KeyCategory::Time) => self.press_status(key),
            Some(KeyCategory::Guests) => self.press_guests(key),
            Some(KeyCategory::Locations) => self.press_location(key),
            Some(KeyCategory::Submit) => self.press_submit(submitter).map(|_| ()),
            Some(KeyCategory::Clear) => self.press_clear(),
            None => {
                warn!("Unprocessable key: {}", key);
                Ok(())
            }
        }
    }

    /// Key releases don't change anything yet.
    pub fn release(&mut self, key: KeyIndex) {
        debug!("Key {} released.", key);
    }

    /// Clears the selection and darkens every selection LED.
    pub fn reset(&mut self) -> GpioResult<()> {
        debug!("Resetting selection.");
        self.selection = Selection::default();
        let leds: Vec<LedRef> = self.layout.selection_leds().collect();
        for led in leds {
            self.leds.disable(led);
        }
        self.leds.flush()
    }

    /// The per-option LED aligned with `key` in `keys`.
    fn option_led(keys: &[KeyIndex], leds: &[LedRef], key: KeyIndex) -> Option<LedRef> {
        keys.iter()
            .position(|&k| k == key)
            .and_then(|i| leds.get(i).copied())
    }

    /// Shows a group indicator: positive when something's picked, otherwise negative when
    /// arriving (it's required) or dark when leaving (it's optional).
    fn render_group(&mut self, led: LedRef, picked: bool) {
        if picked {
            self.leds.switch(led, true);
        } else if self.selection.leaving {
            self.leds.disable(led);
        } else {
            self.leds.switch(led, false);
        }
    }

    fn render_submittable(&mut self) {
        let submittable = self.selection.is_submittable();
        self.leds.switch(self.layout.submittable, submittable);
    }

    /// Handles the leaving key and the time keys.
    pub fn press_status(&mut self, key: KeyIndex) -> GpioResult<()> {
        if key == self.keys.leaving {
            self.selection.leaving = !self.selection.leaving;
            debug!("Leaving: {}", self.selection.leaving);
            if self.selection.leaving {
                self.leds.enable(self.layout.leaving);
            } else {
                self.leds.disable(self.layout.leaving);
            }
        } else {
            if let Some(armed) = self.selection.time {
                if let Some(led) = Self::option_led(&self.keys.time, &self.layout.time_options, armed) {
                    self.leds.disable(led);
                }
            }
            toggle_single(&mut self.selection.time, key);
            debug!("Time: {:?}", self.selection.time);
            if let Some(armed) = self.selection.time {
                if let Some(led) = Self::option_led(&self.keys.time, &self.layout.time_options, armed) {
                    self.leds.enable(led);
                }
            }
        }

        if !self.selection.status_valid() {
            return self.reset();
        }

        self.leds.switch(self.layout.status, true);
        self.render_group(self.layout.guests, self.selection.guests.is_some());
        self.render_group(self.layout.locations, !self.selection.locations.is_empty());
        self.render_submittable();
        self.leds.flush()
    }

    /// Single choice among the guest keys; pressing the armed key again clears it.
    pub fn press_guests(&mut self, key: KeyIndex) -> GpioResult<()> {
        if let Some(armed) = self.selection.guests {
            if let Some(led) = Self::option_led(&self.keys.guests, &self.layout.guest_options, armed) {
                self.leds.disable(led);
            }
        }
        toggle_single(&mut self.selection.guests, key);
        debug!("Guests: {:?}", self.selection.guests);
        if let Some(armed) = self.selection.guests {
            if let Some(led) = Self::option_led(&self.keys.guests, &self.layout.guest_options, armed) {
                self.leds.enable(led);
            }
        }

        self.render_group(self.layout.guests, self.selection.guests.is_some());
        self.render_submittable();
        self.leds.flush()
    }

    /// Any number of locations can be picked; each press flips one.
    pub fn press_location(&mut self, key: KeyIndex) -> GpioResult<()> {
        let picked = self.selection.toggle_location(key);
        debug!("Locations: {:?}", self.selection.locations);
        if let Some(led) = Self::option_led(&self.keys.locations, &self.layout.location_options, key) {
            self.leds.switch(led, picked);
        }

        self.render_group(self.layout.locations, !self.selection.locations.is_empty());
        self.render_submittable();
        self.leds.flush()
    }

    /// Blinks the submittable LED between dark and negative, then restores it.
    fn blink_rejection(&mut self) -> GpioResult<()> {
        let led = self.layout.submittable;
        let shown = self.leds.shown(led);
        for _ in 0..self.blink_count {
            self.leds.disable(led);
            self.leds.flush()?;
            sleep(self.blink_interval);
            self.leds.switch(led, false);
            self.leds.flush()?;
            sleep(self.blink_interval);
        }
        match shown {
            Some(state) => self.leds.switch(led, state),
            None => self.leds.disable(led),
        }
        self.leds.flush()
    }

    /// Sends the selection if it's complete. Failures keep the selection for another press.
    pub fn press_submit(&mut self, submitter: &mut dyn Submitter) -> GpioResult<SubmitOutcome> {
        if !self.selection.is_submittable() {
            info!("Selection isn't complete yet, not submitting.");
            self.blink_rejection()?;
            return Ok(SubmitOutcome::Incomplete);
        }

        let record = SubmissionRecord::new(&self.selection, &self.keys);
        match submitter.submit(&record, &mut self.leds) {
            Ok(()) => {
                self.reset()?;
                Ok(SubmitOutcome::Sent)
            }
            Err(e) => {
                warn!("Submitting {:?} failed: {}", record, e);
                self.leds.flush()?;
                sleep(self.failure_delay);
                Ok(SubmitOutcome::Failed(e))
            }
        }
    }

    pub fn press_clear(&mut self) -> GpioResult<()> {
        info!("Selection cleared.");
        self.reset()
    }

    /// Called by the control loop once nobody touched the panel for a while.
    pub fn timeout(&mut self) -> GpioResult<()> {
        info!("Selection cleared after inactivity.");
        self.reset()
    }
}
