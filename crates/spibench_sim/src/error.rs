//! Error types for the signal kernel.

use std::io;

/// Errors raised while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A signal ID does not belong to this kernel.
    #[error("unknown signal {0}")]
    UnknownSignal(u32),

    /// A clock period that cannot be split into two equal integer halves.
    #[error("invalid clock period: {period_fs} fs (must be even and at least 2 fs)")]
    InvalidClockPeriod {
        /// The rejected period in femtoseconds.
        period_fs: u64,
    },

    /// A duration string could not be parsed.
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A process reported a failure while reacting to an event.
    #[error("process '{process}' failed at {time_fs} fs: {reason}")]
    ProcessFailed {
        /// Name of the failing process.
        process: String,
        /// Simulation time of the failure in femtoseconds.
        time_fs: u64,
        /// Description of the failure.
        reason: String,
    },

    /// Too many delta cycles at one time step, usually a zero-delay feedback loop.
    #[error("delta cycle limit exceeded at {fs} fs (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// Time at which the limit was hit.
        fs: u64,
        /// The configured limit.
        max_deltas: u32,
    },

    /// The kernel's absolute time limit was reached.
    #[error("time limit exceeded: {limit_fs} fs")]
    TimeLimitExceeded {
        /// The configured limit in femtoseconds.
        limit_fs: u64,
    },

    /// Writing waveform output failed.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}
