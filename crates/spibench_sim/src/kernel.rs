//! Simulation kernel with event queue, clock generators, and delta-cycle loop.
//!
//! [`SimKernel`] owns every signal, a time-ordered event queue and the set of
//! registered processes. Each [`step`](SimKernel::step) applies all events at
//! the earliest pending time, detects edges, records waveform changes, wakes
//! the processes whose triggers fired and schedules the drives they request
//! for the next delta cycle.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use log::debug;
use spibench_common::Logic;

use crate::error::SimError;
use crate::process::{Process, ProcessContext, Trigger};
use crate::signal::{SignalId, SignalState};
use crate::time::SimTime;
use crate::waveform::WaveformRecorder;

/// What an event does when it is applied.
#[derive(Debug, Clone, Copy)]
enum EventKind {
    /// Write a value to a signal.
    Drive { signal: SignalId, value: Logic },
    /// Toggle step of a free-running clock.
    Clock { clock: usize, value: Logic },
}

/// An event scheduled in the simulation event queue.
#[derive(Debug, Clone)]
struct SimEvent {
    /// When this event should be applied.
    time: SimTime,
    /// Insertion order; later writes in one delta win.
    seq: u64,
    kind: EventKind,
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Clone, Copy)]
struct ClockGen {
    signal: SignalId,
    half_period_fs: u64,
}

struct SimProcess {
    process: Rc<RefCell<dyn Process>>,
    triggers: Vec<Trigger>,
}

/// The result of a single kernel step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// More events are pending.
    Continued,
    /// The event queue is empty.
    Done,
}

/// Totals reported when a simulation is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSummary {
    /// Simulation time when the run ended.
    pub final_time: SimTime,
    /// Total number of delta cycles executed.
    pub total_deltas: u64,
}

/// The simulation kernel: signals, event queue, processes and clocks.
pub struct SimKernel {
    current_time: SimTime,
    event_queue: BinaryHeap<Reverse<SimEvent>>,
    next_seq: u64,
    signals: Vec<SignalState>,
    processes: Vec<SimProcess>,
    /// Signal -> indices of processes with a trigger on it.
    sensitivity_map: HashMap<SignalId, Vec<usize>>,
    clocks: Vec<ClockGen>,
    recorder: Option<Box<dyn WaveformRecorder>>,
    /// Signals registered with the recorder; later signals are not dumped.
    recorded_signals: usize,
    time_limit: Option<u64>,
    /// Maximum delta cycles per time step (default 10,000).
    max_delta_per_step: u32,
    total_deltas: u64,
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKernel {
    /// Creates an empty kernel at time zero.
    pub fn new() -> Self {
        Self {
            current_time: SimTime::zero(),
            event_queue: BinaryHeap::new(),
            next_seq: 0,
            signals: Vec::new(),
            processes: Vec::new(),
            sensitivity_map: HashMap::new(),
            clocks: Vec::new(),
            recorder: None,
            recorded_signals: 0,
            time_limit: None,
            max_delta_per_step: 10_000,
            total_deltas: 0,
        }
    }

    /// Sets an absolute time limit; stepping past it is an error.
    pub fn set_time_limit(&mut self, limit_fs: u64) {
        self.time_limit = Some(limit_fs);
    }

    /// Sets the maximum number of delta cycles per time step.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// Attaches a waveform recorder.
    ///
    /// Every existing signal is registered under a `bench` scope and its
    /// current value dumped. Signals created afterwards are not recorded.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn WaveformRecorder>) -> Result<(), SimError> {
        recorder.begin_scope("bench")?;
        for (index, signal) in self.signals.iter().enumerate() {
            recorder.register_signal(SignalId::from_raw(index as u32), &signal.name)?;
        }
        recorder.end_scope()?;
        for (index, signal) in self.signals.iter().enumerate() {
            recorder.record_change(
                self.current_time.fs,
                SignalId::from_raw(index as u32),
                signal.value,
            )?;
        }
        self.recorded_signals = self.signals.len();
        self.recorder = Some(recorder);
        debug!("recording {} signals from {}", self.recorded_signals, self.current_time);
        Ok(())
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Returns the total number of delta cycles executed.
    pub fn total_deltas(&self) -> u64 {
        self.total_deltas
    }

    /// Returns the number of signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Returns the number of registered processes.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Returns the number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Creates a signal holding `init`.
    pub fn add_signal(&mut self, name: impl Into<String>, init: Logic) -> SignalId {
        let id = SignalId::from_raw(self.signals.len() as u32);
        self.signals.push(SignalState::new(name, init));
        id
    }

    /// Finds a signal by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .position(|s| s.name == name)
            .map(|i| SignalId::from_raw(i as u32))
    }

    /// Returns the current value of a signal.
    pub fn value(&self, id: SignalId) -> Result<Logic, SimError> {
        self.signal(id).map(|s| s.value)
    }

    /// Returns the full state of a signal.
    pub fn signal(&self, id: SignalId) -> Result<&SignalState, SimError> {
        self.signals
            .get(id.index())
            .ok_or(SimError::UnknownSignal(id.as_raw()))
    }

    /// Schedules `value` on `id` for the next delta cycle.
    ///
    /// When several writes to one signal land in the same delta, the last one
    /// wins. A write equal to the value already held produces no event.
    pub fn drive(&mut self, id: SignalId, value: Logic) -> Result<(), SimError> {
        self.signal(id)?;
        let time = self.current_time.next_delta();
        self.push(time, EventKind::Drive { signal: id, value });
        Ok(())
    }

    /// Schedules `value` on `id` after `delay_fs` femtoseconds.
    pub fn drive_at(&mut self, id: SignalId, value: Logic, delay_fs: u64) -> Result<(), SimError> {
        self.signal(id)?;
        let time = self.delayed(delay_fs);
        self.push(time, EventKind::Drive { signal: id, value });
        Ok(())
    }

    /// Attaches a free-running 50% duty clock to `id`.
    ///
    /// The clock goes low in the next delta cycle and rises half a period
    /// later. The period must be even and at least 2 fs.
    pub fn add_clock(&mut self, id: SignalId, period_fs: u64) -> Result<(), SimError> {
        self.signal(id)?;
        if period_fs < 2 || period_fs % 2 != 0 {
            return Err(SimError::InvalidClockPeriod { period_fs });
        }
        let clock = self.clocks.len();
        self.clocks.push(ClockGen {
            signal: id,
            half_period_fs: period_fs / 2,
        });
        let time = self.current_time.next_delta();
        self.push(
            time,
            EventKind::Clock {
                clock,
                value: Logic::Zero,
            },
        );
        Ok(())
    }

    /// Registers a process woken by any of `triggers`.
    pub fn add_process(
        &mut self,
        process: Rc<RefCell<dyn Process>>,
        triggers: Vec<Trigger>,
    ) -> Result<(), SimError> {
        for trigger in &triggers {
            self.signal(trigger.signal)?;
        }
        let index = self.processes.len();
        for trigger in &triggers {
            let entry = self.sensitivity_map.entry(trigger.signal).or_default();
            if !entry.contains(&index) {
                entry.push(index);
            }
        }
        self.processes.push(SimProcess { process, triggers });
        Ok(())
    }

    /// Time of the next pending event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.event_queue.peek().map(|Reverse(evt)| evt.time)
    }

    /// Applies every event at the earliest pending time and runs the
    /// processes woken by the resulting changes.
    pub fn step(&mut self) -> Result<StepResult, SimError> {
        let Some(next_time) = self.next_event_time() else {
            return Ok(StepResult::Done);
        };
        if let Some(limit) = self.time_limit {
            if next_time.fs > limit {
                return Err(SimError::TimeLimitExceeded { limit_fs: limit });
            }
        }
        if next_time.delta > self.max_delta_per_step {
            debug!("delta limit reached at {next_time}");
            return Err(SimError::DeltaCycleLimit {
                fs: next_time.fs,
                max_deltas: self.max_delta_per_step,
            });
        }
        self.current_time = next_time;

        // Pre-delta value of each signal touched in this delta
        let mut touched: HashMap<SignalId, Logic> = HashMap::new();
        while let Some(Reverse(evt)) = self.event_queue.peek() {
            if evt.time != self.current_time {
                break;
            }
            let Some(Reverse(evt)) = self.event_queue.pop() else {
                break;
            };
            let (signal, value) = match evt.kind {
                EventKind::Drive { signal, value } => (signal, value),
                EventKind::Clock { clock, value } => {
                    let gen = self.clocks[clock];
                    let time = SimTime::from_fs(self.current_time.fs + gen.half_period_fs);
                    self.push(time, EventKind::Clock { clock, value: !value });
                    (gen.signal, value)
                }
            };
            let state = &mut self.signals[signal.index()];
            touched.entry(signal).or_insert(state.value);
            state.value = value;
        }

        let mut changes: HashMap<SignalId, Logic> = HashMap::new();
        for (&signal, &old) in &touched {
            let state = &mut self.signals[signal.index()];
            let new = state.value;
            state.value = old;
            if state.apply(new) {
                changes.insert(signal, old);
            }
        }

        if let Some(rec) = &mut self.recorder {
            let mut changed: Vec<SignalId> = changes
                .keys()
                .copied()
                .filter(|id| id.index() < self.recorded_signals)
                .collect();
            changed.sort();
            for id in changed {
                rec.record_change(self.current_time.fs, id, self.signals[id.index()].value)?;
            }
        }

        let woken = self.find_woken_processes(&changes);
        let mut drives = Vec::new();
        for index in woken {
            let mut ctx = ProcessContext::new(self.current_time, &self.signals, &changes);
            self.processes[index].process.borrow_mut().react(&mut ctx)?;
            drives.extend(ctx.into_drives());
        }
        for drive in drives {
            let time = self.delayed(drive.delay_fs);
            self.push(
                time,
                EventKind::Drive {
                    signal: drive.signal,
                    value: drive.value,
                },
            );
        }

        self.total_deltas += 1;
        Ok(StepResult::Continued)
    }

    /// Runs for `duration_fs` femtoseconds of simulated time.
    pub fn run_for(&mut self, duration_fs: u64) -> Result<(), SimError> {
        self.run_until(|_| false, Some(duration_fs))?;
        Ok(())
    }

    /// Steps until `done` holds or `timeout_fs` of simulated time elapses.
    ///
    /// The predicate is only checked once the current instant has settled,
    /// that is when no delta cycles are pending at the current time. Returns
    /// `true` when it was satisfied and `false` on timeout, in which case the
    /// current time is moved to the deadline. Without a timeout, an empty
    /// event queue also ends the wait with `false`.
    pub fn run_until(
        &mut self,
        mut done: impl FnMut(&SimKernel) -> bool,
        timeout_fs: Option<u64>,
    ) -> Result<bool, SimError> {
        let deadline = timeout_fs.map(|t| self.current_time.fs.saturating_add(t));
        loop {
            if self.is_settled() && done(self) {
                return Ok(true);
            }
            match (self.next_event_time(), deadline) {
                (Some(next), Some(limit)) if next.fs > limit => {
                    self.current_time = self.current_time.advance_to(limit);
                    return Ok(false);
                }
                (None, Some(limit)) => {
                    if limit > self.current_time.fs {
                        self.current_time = self.current_time.advance_to(limit);
                    }
                    return Ok(false);
                }
                (None, None) => return Ok(false),
                (Some(_), _) => {
                    self.step()?;
                }
            }
        }
    }

    /// Whether no events are pending at the current instant.
    pub fn is_settled(&self) -> bool {
        self.next_event_time()
            .map_or(true, |t| t.fs > self.current_time.fs)
    }

    /// Finalizes the waveform output and reports totals.
    pub fn finish(&mut self) -> Result<SimSummary, SimError> {
        if let Some(rec) = &mut self.recorder {
            rec.finalize()?;
        }
        Ok(SimSummary {
            final_time: self.current_time,
            total_deltas: self.total_deltas,
        })
    }

    fn push(&mut self, time: SimTime, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.event_queue.push(Reverse(SimEvent { time, seq, kind }));
    }

    fn delayed(&self, delay_fs: u64) -> SimTime {
        if delay_fs == 0 {
            self.current_time.next_delta()
        } else {
            self.current_time.after(delay_fs)
        }
    }

    fn find_woken_processes(&self, changes: &HashMap<SignalId, Logic>) -> Vec<usize> {
        let mut woken: Vec<usize> = Vec::new();
        for (&signal, &old) in changes {
            let Some(indices) = self.sensitivity_map.get(&signal) else {
                continue;
            };
            let new = self.signals[signal.index()].value;
            for &index in indices {
                if woken.contains(&index) {
                    continue;
                }
                let fires = self.processes[index]
                    .triggers
                    .iter()
                    .any(|t| t.signal == signal && t.fires(old, new));
                if fires {
                    woken.push(index);
                }
            }
        }
        // Registration order keeps runs reproducible
        woken.sort_unstable();
        woken
    }
}
