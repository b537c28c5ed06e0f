use serde::Serialize;
use crate::layout::{KeyIndex, KeyLayout};

/// What the person at the panel has picked so far.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    pub leaving: bool,
    pub time: Option<KeyIndex>,
    pub guests: Option<KeyIndex>,
    /// Picked location keys, in the order they were picked.
    pub locations: Vec<KeyIndex>,
}

impl Selection {
    /// Either leaving, or a time bucket implying arrival.
    pub fn status_valid(&self) -> bool {
        self.leaving || self.time.is_some()
    }

    /// Leaving needs nothing else; arriving needs a time, a guest count and a location.
    pub fn is_submittable(&self) -> bool {
        if !self.status_valid() {
            return false;
        }
        self.leaving || (self.time.is_some() && self.guests.is_some() && !self.locations.is_empty())
    }

    /// Adds the location if absent, removes it otherwise. Returns whether it's now picked.
    pub fn toggle_location(&mut self, key: KeyIndex) -> bool {
        if let Some(i) = self.locations.iter().position(|&k| k == key) {
            self.locations.remove(i);
            false
        } else {
            self.locations.push(key);
            true
        }
    }
}

/// Toggles a single-choice slot: picking the armed key again clears it.
pub(crate) fn toggle_single(slot: &mut Option<KeyIndex>, key: KeyIndex) {
    *slot = if *slot == Some(key) { None } else { Some(key) };
}

/// The body sent to the remote endpoint.
///
/// Keys are given as their position within the category, so the server doesn't care about
/// how the pads are wired.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub leaving: bool,
    pub time: Option<usize>,
    pub guests: Option<usize>,
    pub locations: Vec<usize>,
}

impl SubmissionRecord {
    pub fn new(selection: &Selection, keys: &KeyLayout) -> Self {
        let position = |list: &[KeyIndex], key: KeyIndex| list.iter().position(|&k| k == key);

        SubmissionRecord {
            leaving: selection.leaving,
            time: selection.time.and_then(|key| position(&keys.time, key)),
            guests: selection.guests.and_then(|key| position(&keys.guests, key)),
            locations: selection
                .locations
                .iter()
                .filter_map(|&key| position(&keys.locations, key))
                .collect(),
        }
    }

    /// Serializes the record and merges `extra` into it. Record fields win over extra ones.
    pub fn to_payload(
        &self,
        extra: &serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Result<serde_json::Value> {
        let mut payload = extra.clone();
        if let serde_json::Value::Object(fields) = serde_json::to_value(self)? {
            payload.extend(fields);
        }
        Ok(serde_json::Value::Object(payload))
    }
}
