//! Event-driven single-bit signal kernel for spibench.
//!
//! This crate provides the simulated-time substrate the serial emulators run
//! on: a store of 4-state wires, a time-ordered event queue with delta
//! cycles, free-running clock generators, edge-triggered behavioural
//! processes, and VCD waveform output.
//!
//! # Usage
//!
//! ```
//! use spibench_common::Logic;
//! use spibench_sim::{SimKernel, FS_PER_NS};
//!
//! let mut kernel = SimKernel::new();
//! let clk = kernel.add_signal("clk", Logic::X);
//! kernel.add_clock(clk, 4 * FS_PER_NS)?;
//! kernel.run_for(10 * FS_PER_NS)?;
//! assert_eq!(kernel.value(clk)?, Logic::One);
//! # Ok::<(), spibench_sim::SimError>(())
//! ```
//!
//! # Modules
//!
//! - `error`: Simulation error types
//! - `time`: Femtosecond-precision time with delta cycles, duration parsing
//! - `signal`: Signal IDs and runtime state
//! - `process`: The process trait, triggers and process context
//! - `kernel`: Event queue, clocks and the delta-cycle loop
//! - `waveform`: Waveform recording (VCD format)

#![warn(missing_docs)]

pub mod error;
pub mod kernel;
pub mod process;
pub mod signal;
pub mod time;
pub mod waveform;

pub use error::SimError;
pub use kernel::{SimKernel, SimSummary, StepResult};
pub use process::{Process, ProcessContext, Trigger};
pub use signal::{SignalId, SignalState};
pub use time::{
    format_duration, parse_duration, SimTime, FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_S,
    FS_PER_US,
};
pub use waveform::{VcdRecorder, WaveformRecorder};
