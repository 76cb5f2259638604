//! Signal identifiers and runtime signal state.
//!
//! Every signal in the kernel is a single 4-state wire. Signals are allocated
//! in creation order and addressed by a flat [`SignalId`].

use serde::{Deserialize, Serialize};
use spibench_common::Logic;

/// Opaque ID for a kernel signal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The runtime state of one signal.
#[derive(Clone, Debug)]
pub struct SignalState {
    /// Name used for lookup and waveform output.
    pub name: String,
    /// Current value.
    pub value: Logic,
    /// Value before the most recent change (for edge detection).
    pub previous: Logic,
}

impl SignalState {
    /// Creates a signal holding `init`.
    pub fn new(name: impl Into<String>, init: Logic) -> Self {
        Self {
            name: name.into(),
            value: init,
            previous: init,
        }
    }

    /// Applies a new value, returning whether it differs from the current one.
    pub(crate) fn apply(&mut self, value: Logic) -> bool {
        if value == self.value {
            return false;
        }
        self.previous = self.value;
        self.value = value;
        true
    }
}
