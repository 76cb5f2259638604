//! Error types for the serial emulators.

use spibench_common::{InternalError, Logic};
use spibench_sim::SimError;

/// Errors raised by the source and sink emulators and the scenario runner.
#[derive(Debug, thiserror::Error)]
pub enum BitbangError {
    /// A word width outside `1..=64`.
    #[error("invalid word width {bits} (must be 1..=64)")]
    InvalidWordWidth {
        /// The rejected width.
        bits: u32,
    },

    /// A serial clock divider of zero.
    #[error("invalid serial clock divider {sclk_div} (must be at least 1)")]
    InvalidClockDivider {
        /// The rejected divider.
        sclk_div: u32,
    },

    /// A queue limit of zero.
    #[error("invalid queue limit 0 (must be at least 1 or unbounded)")]
    InvalidQueueLimit,

    /// Enqueueing would exceed the configured queue limit.
    #[error("queue full: {pending} pending + {requested} new words exceeds limit {limit}")]
    QueueFull {
        /// The configured limit.
        limit: usize,
        /// Words already queued.
        pending: usize,
        /// Words in the rejected write.
        requested: usize,
    },

    /// A configuration change was attempted while a word was in flight.
    #[error("{emulator} is busy: cannot reconfigure while a word is in flight")]
    Busy {
        /// Which emulator refused.
        emulator: String,
    },

    /// The data line was not a driven 0 or 1 at a sample edge.
    #[error("sampled {value} on the data line at {time_fs} fs")]
    UnknownDataBit {
        /// The value seen.
        value: Logic,
        /// When it was sampled.
        time_fs: u64,
    },

    /// A byte buffer that does not hold a whole number of words.
    #[error("buffer of {len} bytes is not a whole number of {bits}-bit words")]
    UnalignedBuffer {
        /// Buffer length in bytes.
        len: usize,
        /// Word width.
        bits: u32,
    },

    /// The underlying simulation failed.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// A broken internal invariant.
    #[error(transparent)]
    Internal(#[from] InternalError),
}
