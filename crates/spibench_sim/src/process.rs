//! Edge-triggered processes and the context they run in.
//!
//! A [`Process`] is woken by the kernel when one of its [`Trigger`]s fires.
//! It runs to completion inside a single delta cycle, reading signal values
//! through a [`ProcessContext`] and scheduling drives that become visible one
//! delta later (or after an explicit delay). Any state that must survive
//! between activations lives in the process object itself.

use std::collections::HashMap;

use spibench_common::{Edge, Logic};

use crate::error::SimError;
use crate::signal::{SignalId, SignalState};
use crate::time::SimTime;

/// A behavioural process scheduled by the kernel.
pub trait Process {
    /// Name used in log messages and error reports.
    fn name(&self) -> &str;

    /// Reacts to a triggering signal change.
    fn react(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError>;
}

/// A signal change that wakes a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    /// The watched signal.
    pub signal: SignalId,
    /// Only wake on this edge; `None` wakes on any change.
    pub edge: Option<Edge>,
}

impl Trigger {
    /// Wakes on any change of `signal`.
    pub fn any(signal: SignalId) -> Self {
        Self { signal, edge: None }
    }

    /// Wakes on the given edge of `signal`.
    pub fn on(signal: SignalId, edge: Edge) -> Self {
        Self {
            signal,
            edge: Some(edge),
        }
    }

    /// Wakes on rising edges of `signal`.
    pub fn rising(signal: SignalId) -> Self {
        Self::on(signal, Edge::Rising)
    }

    /// Wakes on falling edges of `signal`.
    pub fn falling(signal: SignalId) -> Self {
        Self::on(signal, Edge::Falling)
    }

    /// Whether a change `old -> new` on the watched signal fires this trigger.
    pub fn fires(&self, old: Logic, new: Logic) -> bool {
        if old == new {
            return false;
        }
        match self.edge {
            None => true,
            Some(edge) => Edge::between(old, new) == Some(edge),
        }
    }
}

/// A drive requested by a process, applied after the process returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PendingDrive {
    pub signal: SignalId,
    pub value: Logic,
    pub delay_fs: u64,
}

/// The view of the simulation a process gets while it runs.
pub struct ProcessContext<'a> {
    now: SimTime,
    signals: &'a [SignalState],
    /// Pre-delta values of every signal that changed in this delta.
    changes: &'a HashMap<SignalId, Logic>,
    drives: Vec<PendingDrive>,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(
        now: SimTime,
        signals: &'a [SignalState],
        changes: &'a HashMap<SignalId, Logic>,
    ) -> Self {
        Self {
            now,
            signals,
            changes,
            drives: Vec::new(),
        }
    }

    /// The current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The current value of a signal.
    pub fn value(&self, id: SignalId) -> Result<Logic, SimError> {
        self.state(id).map(|s| s.value)
    }

    /// The value a signal held before this delta cycle.
    ///
    /// Equal to [`value`](Self::value) for signals that did not change.
    pub fn previous(&self, id: SignalId) -> Result<Logic, SimError> {
        let state = self.state(id)?;
        Ok(self.changes.get(&id).copied().unwrap_or(state.value))
    }

    /// Whether the signal changed in this delta cycle.
    pub fn changed(&self, id: SignalId) -> bool {
        self.changes.contains_key(&id)
    }

    /// The edge the signal made in this delta cycle, if any.
    pub fn edge(&self, id: SignalId) -> Option<Edge> {
        let old = *self.changes.get(&id)?;
        let new = self.signals.get(id.index())?.value;
        Edge::between(old, new)
    }

    /// Schedules `value` on `id` for the next delta cycle.
    pub fn drive(&mut self, id: SignalId, value: Logic) -> Result<(), SimError> {
        self.drive_after(id, value, 0)
    }

    /// Schedules `value` on `id` after `delay_fs` femtoseconds.
    ///
    /// A zero delay means the next delta cycle.
    pub fn drive_after(&mut self, id: SignalId, value: Logic, delay_fs: u64) -> Result<(), SimError> {
        self.state(id)?;
        self.drives.push(PendingDrive {
            signal: id,
            value,
            delay_fs,
        });
        Ok(())
    }

    pub(crate) fn into_drives(self) -> Vec<PendingDrive> {
        self.drives
    }

    fn state(&self, id: SignalId) -> Result<&SignalState, SimError> {
        self.signals
            .get(id.index())
            .ok_or(SimError::UnknownSignal(id.as_raw()))
    }
}
