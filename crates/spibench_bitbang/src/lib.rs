//! Bit-level SPI emulators for spibench.
//!
//! [`BufferSource`] shifts queued words out on a data line and generates the
//! serial clock from a system clock; [`BufferSink`] samples a data line on
//! serial clock edges and queues the received words. Both are edge-triggered
//! processes on a [`spibench_sim::SimKernel`], with sample and shift edges
//! chosen by the [`SpiMode`](spibench_common::SpiMode) table.
//! [`LoopbackSlave`] is a peer that echoes the previous word, and
//! [`run_scenario`] wires everything together to check that what was sent
//! is what came back.
//!
//! # Usage
//!
//! ```
//! use spibench_bitbang::{BufferSink, BufferSource, SinkPins, SourceConfig, SourcePins};
//! use spibench_common::Logic;
//! use spibench_sim::{SimKernel, FS_PER_NS, FS_PER_US};
//!
//! let mut kernel = SimKernel::new();
//! let clk = kernel.add_signal("clk", Logic::X);
//! let sclk = kernel.add_signal("sclk", Logic::X);
//! let mosi = kernel.add_signal("mosi", Logic::X);
//! kernel.add_clock(clk, 4 * FS_PER_NS)?;
//!
//! let config = SourceConfig::default();
//! let source = BufferSource::attach(
//!     &mut kernel,
//!     "source",
//!     SourcePins { clk, sclk, dout: mosi, cs: None },
//!     config,
//! )?;
//! let sink = BufferSink::attach(
//!     &mut kernel,
//!     "sink",
//!     SinkPins { sclk, din: mosi, cs: None },
//!     config.sink(),
//! )?;
//!
//! source.write_nowait(&[0x5a, 0xc3])?;
//! let mut words = Vec::new();
//! while words.len() < 2 {
//!     words.extend(sink.read(&mut kernel, None, Some(10 * FS_PER_US))?);
//! }
//! assert_eq!(words, vec![0x5a, 0xc3]);
//! # Ok::<(), spibench_bitbang::BitbangError>(())
//! ```
//!
//! # Modules
//!
//! - `config`: Emulator configuration, chip select and pin bindings
//! - `error`: Emulator error types
//! - `source`: The clock-generating serial source
//! - `sink`: The edge-sampling serial sink
//! - `loopback`: A peer that echoes the previous word
//! - `payload`: Payload generators and standard sweep sizes
//! - `scenario`: Bench construction, stream comparison and reports

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loopback;
pub mod payload;
pub mod scenario;
pub mod sink;
pub mod source;

pub use config::{
    ChipSelect, SinkConfig, SinkPins, SourceConfig, SourcePins, DEFAULT_BITS, DEFAULT_SCLK_DIV,
};
pub use error::BitbangError;
pub use loopback::{LoopbackPins, LoopbackSlave};
pub use payload::{standard_lengths, Payload, STANDARD_WIDTHS};
pub use scenario::{
    compare_streams, run_scenario, LengthOutcome, Mismatch, Scenario, ScenarioReport, Topology,
};
pub use sink::BufferSink;
pub use source::BufferSource;
