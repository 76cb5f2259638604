//! End-to-end scenarios: wire a source to a sink (directly or through a
//! loopback peer), push payloads through and compare the streams.

use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use spibench_common::{BitOrder, InternalError, Logic, SpiMode};
use spibench_sim::{SimKernel, WaveformRecorder, FS_PER_NS, FS_PER_US};

use crate::config::{ChipSelect, SinkPins, SourceConfig, SourcePins, DEFAULT_BITS, DEFAULT_SCLK_DIV};
use crate::error::BitbangError;
use crate::loopback::{LoopbackPins, LoopbackSlave};
use crate::payload::{standard_lengths, Payload};
use crate::sink::BufferSink;
use crate::source::BufferSource;

/// How the source reaches the sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// The sink samples the source's data line.
    #[default]
    Direct,
    /// A loopback peer samples the source and the sink samples the peer, so
    /// the received stream lags the sent stream by one word.
    Echo,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Direct => write!(f, "direct"),
            Topology::Echo => write!(f, "echo"),
        }
    }
}

/// One bench configuration and the payloads to push through it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Name used in logs and reports.
    pub name: String,
    /// SPI clock mode for both ends.
    pub mode: SpiMode,
    /// Word width.
    pub bits: u32,
    /// Bit order for both ends.
    pub bit_order: BitOrder,
    /// System clock cycles per half serial clock period.
    pub sclk_div: u32,
    /// System clock period in femtoseconds.
    pub clock_period_fs: u64,
    /// Wiring between source and sink.
    pub topology: Topology,
    /// Payload generator.
    pub payload: Payload,
    /// Payload lengths in words, run in order.
    pub lengths: Vec<usize>,
    /// Idle time between payloads in femtoseconds.
    pub gap_fs: u64,
    /// Drive an active-low chip select around each burst.
    pub chip_select: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            mode: SpiMode::MODE_0,
            bits: DEFAULT_BITS,
            bit_order: BitOrder::MsbFirst,
            sclk_div: DEFAULT_SCLK_DIV,
            clock_period_fs: 4 * FS_PER_NS,
            topology: Topology::Direct,
            payload: Payload::Incrementing,
            lengths: standard_lengths(),
            gap_fs: 2 * FS_PER_US,
            chip_select: false,
        }
    }
}

impl Scenario {
    /// Name plus the settings that distinguish matrix entries.
    pub fn label(&self) -> String {
        format!(
            "{} [{}, {} bits, {}, {}]",
            self.name, self.mode, self.bits, self.bit_order, self.topology
        )
    }

    /// Source configuration for this scenario.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            bits: self.bits,
            sclk_div: self.sclk_div,
            mode: self.mode,
            bit_order: self.bit_order,
            queue_limit: None,
        }
    }

    /// Expands `base` over every combination of mode, width and bit order.
    pub fn matrix(
        base: &Scenario,
        modes: &[SpiMode],
        widths: &[u32],
        orders: &[BitOrder],
    ) -> Vec<Scenario> {
        let mut out = Vec::with_capacity(modes.len() * widths.len() * orders.len());
        for &mode in modes {
            for &bits in widths {
                for &bit_order in orders {
                    out.push(Scenario {
                        mode,
                        bits,
                        bit_order,
                        ..base.clone()
                    });
                }
            }
        }
        out
    }

    /// Simulated time budget for one payload of `len` words.
    fn budget_fs(&self, len: usize) -> u64 {
        let cycles = self.source_config().cycles_per_word();
        (len as u64 + 2)
            .saturating_mul(cycles)
            .saturating_mul(self.clock_period_fs)
            .saturating_mul(2)
    }
}

/// A word that did not arrive as expected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Index into the sent payload.
    pub index: usize,
    /// The word that was sent.
    pub expected: u64,
    /// The word that was received, `None` if it never arrived.
    pub actual: Option<u64>,
}

/// Result of pushing one payload through the bench.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LengthOutcome {
    /// Payload length in words.
    pub length: usize,
    /// Words checked against the payload.
    pub words_compared: usize,
    /// Words received.
    pub words_received: usize,
    /// Every disagreement found.
    pub mismatches: Vec<Mismatch>,
    /// Simulation time when the payload was queued.
    pub start_fs: u64,
    /// Simulation time when the last word was received.
    pub end_fs: u64,
}

impl LengthOutcome {
    /// Whether every compared word matched.
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Result of a whole scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario label.
    pub label: String,
    /// One entry per payload length.
    pub outcomes: Vec<LengthOutcome>,
    /// Simulation time at the end of the run.
    pub final_time_fs: u64,
    /// Delta cycles executed.
    pub total_deltas: u64,
}

impl ScenarioReport {
    /// Whether every payload came back intact.
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(LengthOutcome::passed)
    }

    /// Total mismatching words.
    pub fn mismatch_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.mismatches.len()).sum()
    }

    /// Total words compared.
    pub fn words_compared(&self) -> usize {
        self.outcomes.iter().map(|o| o.words_compared).sum()
    }
}

/// Compares a received stream against the sent payload.
///
/// For [`Topology::Echo`] the received stream lags by one word, so
/// `received[1..]` is checked against `sent[..n-1]`.
pub fn compare_streams(topology: Topology, sent: &[u64], received: &[u64]) -> Vec<Mismatch> {
    let (expected, actual) = match topology {
        Topology::Direct => (sent, received),
        Topology::Echo => (
            &sent[..sent.len().saturating_sub(1)],
            received.get(1..).unwrap_or(&[]),
        ),
    };
    expected
        .iter()
        .enumerate()
        .filter_map(|(index, &want)| {
            let got = actual.get(index).copied();
            (got != Some(want)).then_some(Mismatch {
                index,
                expected: want,
                actual: got,
            })
        })
        .collect()
}

/// Builds a fresh bench for `scenario`, runs every payload length through it
/// and reports the comparison results.
pub fn run_scenario(
    scenario: &Scenario,
    recorder: Option<Box<dyn WaveformRecorder>>,
) -> Result<ScenarioReport, BitbangError> {
    let config = scenario.source_config();
    config.validate()?;
    let label = scenario.label();
    info!("Running {label}");

    let mut kernel = SimKernel::new();
    let clk = kernel.add_signal("clk", Logic::X);
    let sclk = kernel.add_signal("sclk", Logic::X);
    let mosi = kernel.add_signal("mosi", Logic::X);
    let miso = match scenario.topology {
        Topology::Echo => Some(kernel.add_signal("miso", Logic::X)),
        Topology::Direct => None,
    };
    let cs = scenario
        .chip_select
        .then(|| ChipSelect::active_low(kernel.add_signal("cs_n", Logic::X)));
    kernel.add_clock(clk, scenario.clock_period_fs)?;
    if let Some(recorder) = recorder {
        kernel.set_recorder(recorder)?;
    }

    let source = BufferSource::attach(
        &mut kernel,
        "source",
        SourcePins {
            clk,
            sclk,
            dout: mosi,
            cs,
        },
        config,
    )?;
    let sink_din = match miso {
        Some(miso) => {
            LoopbackSlave::attach(
                &mut kernel,
                "loopback",
                LoopbackPins {
                    sclk,
                    mosi,
                    miso,
                    cs,
                },
                config.sink(),
                0,
            )?;
            miso
        }
        None => mosi,
    };
    let sink = BufferSink::attach(
        &mut kernel,
        "sink",
        SinkPins {
            sclk,
            din: sink_din,
            cs,
        },
        config.sink(),
    )?;

    let mut outcomes = Vec::with_capacity(scenario.lengths.len());
    for &length in &scenario.lengths {
        let sent = scenario.payload.generate(length, scenario.bits);
        let start_fs = kernel.current_time().fs;
        let deadline = start_fs.saturating_add(scenario.budget_fs(length));
        source.write(&mut kernel, &sent)?;

        let mut received = Vec::with_capacity(length);
        while received.len() < length {
            let now = kernel.current_time().fs;
            if now >= deadline {
                break;
            }
            let words = sink.read(&mut kernel, Some(length - received.len()), Some(deadline - now))?;
            if words.is_empty() {
                break;
            }
            received.extend(words);
        }
        let end_fs = kernel.current_time().fs;

        let remaining = deadline.saturating_sub(end_fs);
        if !source.wait(&mut kernel, Some(remaining))? {
            return Err(InternalError::new(format!(
                "{label}: source still busy {remaining} fs after the last word"
            ))
            .into());
        }

        let mismatches = compare_streams(scenario.topology, &sent, &received);
        for m in &mismatches {
            warn!(
                "{label}: length {length}, word {}: expected 0x{:x}, got {}",
                m.index,
                m.expected,
                m.actual.map_or("nothing".to_string(), |w| format!("0x{w:x}"))
            );
        }
        let words_compared = match scenario.topology {
            Topology::Direct => sent.len(),
            Topology::Echo => sent.len().saturating_sub(1),
        };
        outcomes.push(LengthOutcome {
            length,
            words_compared,
            words_received: received.len(),
            mismatches,
            start_fs,
            end_fs,
        });

        kernel.run_for(scenario.gap_fs)?;
    }

    let summary = kernel.finish()?;
    let report = ScenarioReport {
        label,
        outcomes,
        final_time_fs: summary.final_time.fs,
        total_deltas: summary.total_deltas,
    };
    info!(
        "{}: {} words compared, {} mismatches, ended at {}",
        report.label,
        report.words_compared(),
        report.mismatch_count(),
        summary.final_time
    );
    Ok(report)
}
