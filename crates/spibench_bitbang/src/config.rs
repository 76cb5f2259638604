//! Emulator configuration and pin bindings.

use serde::{Deserialize, Serialize};
use spibench_common::{BitOrder, Logic, SpiMode, MAX_WORD_BITS};
use spibench_sim::SignalId;

use crate::error::BitbangError;

/// Default word width.
pub const DEFAULT_BITS: u32 = 8;
/// Default system clock cycles per half serial clock period.
pub const DEFAULT_SCLK_DIV: u32 = 4;

/// Configuration of a [`BufferSource`](crate::BufferSource).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Word width in bits, 1..=64.
    pub bits: u32,
    /// System clock cycles per half serial clock period.
    pub sclk_div: u32,
    /// Clock polarity and phase.
    pub mode: SpiMode,
    /// Order of bits on the wire.
    pub bit_order: BitOrder,
    /// Maximum pending words; `None` is unbounded.
    pub queue_limit: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bits: DEFAULT_BITS,
            sclk_div: DEFAULT_SCLK_DIV,
            mode: SpiMode::MODE_0,
            bit_order: BitOrder::MsbFirst,
            queue_limit: None,
        }
    }
}

impl SourceConfig {
    /// Checks the word width, divider and queue limit.
    pub fn validate(&self) -> Result<(), BitbangError> {
        validate_bits(self.bits)?;
        if self.sclk_div == 0 {
            return Err(BitbangError::InvalidClockDivider {
                sclk_div: self.sclk_div,
            });
        }
        if self.queue_limit == Some(0) {
            return Err(BitbangError::InvalidQueueLimit);
        }
        Ok(())
    }

    /// The matching sink configuration.
    pub fn sink(&self) -> SinkConfig {
        SinkConfig {
            bits: self.bits,
            mode: self.mode,
            bit_order: self.bit_order,
        }
    }

    /// Simulated time one word occupies on the wire, in system clock cycles.
    pub fn cycles_per_word(&self) -> u64 {
        2 * u64::from(self.sclk_div) * u64::from(self.bits)
    }
}

/// Configuration of a [`BufferSink`](crate::BufferSink) or a
/// [`LoopbackSlave`](crate::LoopbackSlave).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Word width in bits, 1..=64.
    pub bits: u32,
    /// Clock polarity and phase.
    pub mode: SpiMode,
    /// Order of bits on the wire.
    pub bit_order: BitOrder,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            bits: DEFAULT_BITS,
            mode: SpiMode::MODE_0,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

impl SinkConfig {
    /// Checks the word width.
    pub fn validate(&self) -> Result<(), BitbangError> {
        validate_bits(self.bits)
    }
}

fn validate_bits(bits: u32) -> Result<(), BitbangError> {
    if bits == 0 || bits > MAX_WORD_BITS {
        return Err(BitbangError::InvalidWordWidth { bits });
    }
    Ok(())
}

/// A chip-select line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipSelect {
    /// The select signal.
    pub signal: SignalId,
    /// Selected when low (the usual `cs_n` convention).
    pub active_low: bool,
}

impl ChipSelect {
    /// An active-low select on `signal`.
    pub fn active_low(signal: SignalId) -> Self {
        Self {
            signal,
            active_low: true,
        }
    }

    /// An active-high select on `signal`.
    pub fn active_high(signal: SignalId) -> Self {
        Self {
            signal,
            active_low: false,
        }
    }

    /// Level that selects the peer.
    pub fn active_level(&self) -> Logic {
        Logic::from_bool(!self.active_low)
    }

    /// Level that deselects the peer.
    pub fn inactive_level(&self) -> Logic {
        Logic::from_bool(self.active_low)
    }

    /// Whether `value` selects the peer. `X`/`Z` never select.
    pub fn is_selected(&self, value: Logic) -> bool {
        value == self.active_level()
    }
}

/// Signals a [`BufferSource`](crate::BufferSource) is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourcePins {
    /// System clock input.
    pub clk: SignalId,
    /// Serial clock output.
    pub sclk: SignalId,
    /// Serial data output.
    pub dout: SignalId,
    /// Optional chip-select output.
    pub cs: Option<ChipSelect>,
}

/// Signals a [`BufferSink`](crate::BufferSink) is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkPins {
    /// Serial clock input.
    pub sclk: SignalId,
    /// Serial data input.
    pub din: SignalId,
    /// Optional chip-select input.
    pub cs: Option<ChipSelect>,
}
