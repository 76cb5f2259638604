//! Configuration types deserialized from `spibench.toml`.

use serde::Deserialize;
use spibench_bitbang::{standard_lengths, Payload, Topology, DEFAULT_SCLK_DIV, STANDARD_WIDTHS};
use spibench_common::BitOrder;

/// The top-level bench configuration parsed from `spibench.toml`.
#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    /// Bench-wide settings (name, clock, gap between payloads).
    pub bench: BenchMeta,
    /// Values applied to every scenario that does not override them.
    #[serde(default)]
    pub defaults: Defaults,
    /// Scenario entries, each expanded over its modes, widths and bit orders.
    #[serde(default, rename = "scenario")]
    pub scenarios: Vec<ScenarioConfig>,
}

/// Bench-wide settings required in every `spibench.toml`.
#[derive(Debug, Deserialize)]
pub struct BenchMeta {
    /// The bench name.
    pub name: String,
    /// System clock period as a duration string (e.g. `"4ns"`).
    #[serde(default = "default_clock_period")]
    pub clock_period: String,
    /// Idle time between payloads as a duration string (e.g. `"2us"`).
    #[serde(default = "default_gap")]
    pub gap: String,
    /// Optional VCD output path.
    #[serde(default)]
    pub waveform: Option<String>,
}

/// Defaults shared by all scenarios.
#[derive(Debug, Clone, Deserialize)]
pub struct Defaults {
    /// System clock cycles per half serial clock period.
    #[serde(default = "default_sclk_div")]
    pub sclk_div: u32,
    /// Payload generator.
    #[serde(default)]
    pub payload: PayloadSpec,
    /// Payload lengths in words.
    #[serde(default = "standard_lengths")]
    pub lengths: Vec<usize>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            sclk_div: DEFAULT_SCLK_DIV,
            payload: PayloadSpec::default(),
            lengths: standard_lengths(),
        }
    }
}

/// Payload selection as written in the bench file.
///
/// Either the string `"incrementing"` or an inline table `{ random = <seed> }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSpec {
    /// 0, 1, 2, ... wrapping at the word width.
    #[default]
    Incrementing,
    /// Seeded random words.
    Random(u64),
}

impl From<PayloadSpec> for Payload {
    fn from(spec: PayloadSpec) -> Self {
        match spec {
            PayloadSpec::Incrementing => Payload::Incrementing,
            PayloadSpec::Random(seed) => Payload::Random { seed },
        }
    }
}

/// One `[[scenario]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// The scenario name.
    pub name: String,
    /// SPI mode numbers to run (0..=3).
    #[serde(default = "all_modes")]
    pub modes: Vec<u8>,
    /// Word widths to run.
    #[serde(default = "standard_widths")]
    pub bits: Vec<u32>,
    /// Bit orders to run.
    #[serde(default = "msb_only")]
    pub bit_order: Vec<BitOrder>,
    /// Wiring between source and sink.
    #[serde(default)]
    pub topology: Topology,
    /// Drive an active-low chip select around each burst.
    #[serde(default)]
    pub chip_select: bool,
    /// Overrides `defaults.sclk_div`.
    #[serde(default)]
    pub sclk_div: Option<u32>,
    /// Overrides `defaults.payload`.
    #[serde(default)]
    pub payload: Option<PayloadSpec>,
    /// Overrides `defaults.lengths`.
    #[serde(default)]
    pub lengths: Option<Vec<usize>>,
}

fn default_clock_period() -> String {
    "4ns".to_string()
}

fn default_gap() -> String {
    "2us".to_string()
}

fn default_sclk_div() -> u32 {
    DEFAULT_SCLK_DIV
}

fn all_modes() -> Vec<u8> {
    vec![0, 1, 2, 3]
}

fn standard_widths() -> Vec<u32> {
    STANDARD_WIDTHS.to_vec()
}

fn msb_only() -> Vec<BitOrder> {
    vec![BitOrder::MsbFirst]
}
