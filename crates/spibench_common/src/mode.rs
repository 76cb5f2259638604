//! SPI clock modes and serial bit order.
//!
//! The mode table maps clock polarity (CPOL) and phase (CPHA) to the idle
//! level of the serial clock and the edges on which data is shifted out and
//! sampled:
//!
//! ```text
//! mode  cpol  cpha  idle  sample   shift
//!   0     0     0    low   rising   falling
//!   1     0     1    low   falling  rising
//!   2     1     0    high  falling  rising
//!   3     1     1    high  rising   falling
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::logic::{Edge, Logic};

/// An SPI clock mode: polarity plus phase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct SpiMode {
    /// Clock polarity: idle level of the serial clock.
    pub cpol: bool,
    /// Clock phase: when set, the leading edge of each bit shifts and the
    /// trailing edge samples.
    pub cpha: bool,
}

impl SpiMode {
    /// Mode 0 (`cpol = 0`, `cpha = 0`).
    pub const MODE_0: SpiMode = SpiMode {
        cpol: false,
        cpha: false,
    };
    /// Mode 1 (`cpol = 0`, `cpha = 1`).
    pub const MODE_1: SpiMode = SpiMode {
        cpol: false,
        cpha: true,
    };
    /// Mode 2 (`cpol = 1`, `cpha = 0`).
    pub const MODE_2: SpiMode = SpiMode {
        cpol: true,
        cpha: false,
    };
    /// Mode 3 (`cpol = 1`, `cpha = 1`).
    pub const MODE_3: SpiMode = SpiMode {
        cpol: true,
        cpha: true,
    };

    /// All four modes in numeric order.
    pub const ALL: [SpiMode; 4] = [Self::MODE_0, Self::MODE_1, Self::MODE_2, Self::MODE_3];

    /// Builds a mode from its conventional number (0–3).
    pub fn from_number(n: u8) -> Result<Self, ParseModeError> {
        match n {
            0..=3 => Ok(Self {
                cpol: n & 0b10 != 0,
                cpha: n & 0b01 != 0,
            }),
            _ => Err(ParseModeError {
                input: n.to_string(),
            }),
        }
    }

    /// The conventional mode number.
    pub fn number(self) -> u8 {
        (u8::from(self.cpol) << 1) | u8::from(self.cpha)
    }

    /// Level of the serial clock between transfers.
    pub fn idle_level(self) -> Logic {
        Logic::from_bool(self.cpol)
    }

    /// Edge on which the receiving side captures data.
    pub fn sample_edge(self) -> Edge {
        if self.cpol == self.cpha {
            Edge::Rising
        } else {
            Edge::Falling
        }
    }

    /// Edge on which the transmitting side changes data.
    pub fn shift_edge(self) -> Edge {
        self.sample_edge().opposite()
    }

    /// Whether the first clock edge of a word is a shift edge.
    pub fn has_leading_shift(self) -> bool {
        self.cpha
    }
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode {}", self.number())
    }
}

impl FromStr for SpiMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("mode")
            .map(str::trim)
            .unwrap_or(trimmed);
        let n: u8 = digits.parse().map_err(|_| ParseModeError {
            input: s.to_string(),
        })?;
        SpiMode::from_number(n).map_err(|_| ParseModeError {
            input: s.to_string(),
        })
    }
}

/// Error for mode numbers or bit order names that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid SPI setting: '{}'", self.input)
    }
}

impl std::error::Error for ParseModeError {}

/// Order in which word bits appear on the serial line.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum BitOrder {
    /// Most significant bit first.
    #[default]
    #[serde(rename = "msb")]
    MsbFirst,
    /// Least significant bit first.
    #[serde(rename = "lsb")]
    LsbFirst,
}

impl BitOrder {
    /// Word bit index carried by serial position `k` of a `bits`-wide word.
    pub fn bit_index(self, k: u32, bits: u32) -> u32 {
        debug_assert!(k < bits, "serial position {k} out of range for {bits} bits");
        match self {
            BitOrder::MsbFirst => bits - 1 - k,
            BitOrder::LsbFirst => k,
        }
    }
}

impl fmt::Display for BitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitOrder::MsbFirst => write!(f, "msb-first"),
            BitOrder::LsbFirst => write!(f, "lsb-first"),
        }
    }
}

impl FromStr for BitOrder {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msb" | "msb-first" | "msb_first" => Ok(BitOrder::MsbFirst),
            "lsb" | "lsb-first" | "lsb_first" => Ok(BitOrder::LsbFirst),
            _ => Err(ParseModeError {
                input: s.to_string(),
            }),
        }
    }
}
