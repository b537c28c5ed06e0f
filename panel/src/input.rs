//! Turning keypad snapshots into press and release events.

use log::debug;
use crate::layout::KeyIndex;

/// Keys whose state changed since the previous scan, ascending.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Edges {
    pub pressed: Vec<KeyIndex>,
    pub released: Vec<KeyIndex>,
}

/// Remembers which keys are held and reports the changes between two scans.
#[derive(Debug)]
pub struct EdgeDetector {
    held: Vec<bool>,
    /// Presses closer than this many ticks to the last accepted one are dropped.
    min_press_interval: u32,
    ticks_since_press: Option<u32>,
}

impl EdgeDetector {
    pub fn new(keys: usize) -> Self {
        EdgeDetector {
            held: vec![false; keys],
            min_press_interval: 0,
            ticks_since_press: None,
        }
    }

    pub fn with_min_press_interval(mut self, ticks: u32) -> Self {
        self.min_press_interval = ticks;
        self
    }

    pub fn is_held(&self, key: KeyIndex) -> bool {
        self.held.get(key).copied().unwrap_or(false)
    }

    /// Feeds one scan worth of active keys. Keys outside the tracked range are ignored.
    pub fn update(&mut self, active: &[KeyIndex]) -> Edges {
        let mut edges = Edges::default();

        for (key, held) in self.held.iter_mut().enumerate() {
            let now = active.contains(&key);
            match (*held, now) {
                (false, true) => edges.pressed.push(key),
                (true, false) => edges.released.push(key),
                _ => {}
            }
            *held = now;
        }

        let ticks = self.ticks_since_press.map(|t| t.saturating_add(1));
        if !edges.pressed.is_empty() {
            if ticks.is_some_and(|t| t < self.min_press_interval) {
                debug!("Dropping presses {:?} arriving too fast.", edges.pressed);
                edges.pressed.clear();
                self.ticks_since_press = ticks;
            } else {
                self.ticks_since_press = Some(0);
            }
        } else {
            self.ticks_since_press = ticks;
        }

        edges
    }
}
