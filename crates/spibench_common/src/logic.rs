//! Four-state single-bit logic values and clock edge classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// A single 4-state wire value in the style of IEEE 1164.
///
/// - `Zero`: driven low
/// - `One`: driven high
/// - `X`: unknown or never driven
/// - `Z`: high-impedance
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Logic {
    /// Logic low (0).
    Zero = 0,
    /// Logic high (1).
    One = 1,
    /// Unknown or uninitialized.
    #[default]
    X = 2,
    /// High-impedance.
    Z = 3,
}

impl Logic {
    /// Converts a boolean level to a driven value.
    pub fn from_bool(level: bool) -> Self {
        if level {
            Logic::One
        } else {
            Logic::Zero
        }
    }

    /// Returns the boolean level, or `None` for `X` and `Z`.
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Logic::Zero => Some(false),
            Logic::One => Some(true),
            Logic::X | Logic::Z => None,
        }
    }

    /// Returns true for `Zero` and `One`.
    pub fn is_known(self) -> bool {
        self.to_bool().is_some()
    }

    /// Parses `0`, `1`, `x`/`X`, `z`/`Z`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' | 'X' => Some(Logic::X),
            'z' | 'Z' => Some(Logic::Z),
            _ => None,
        }
    }

    /// Lowercase character used in VCD output.
    pub fn vcd_char(self) -> char {
        match self {
            Logic::Zero => '0',
            Logic::One => '1',
            Logic::X => 'x',
            Logic::Z => 'z',
        }
    }
}

impl From<bool> for Logic {
    fn from(level: bool) -> Self {
        Logic::from_bool(level)
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::Zero => write!(f, "0"),
            Logic::One => write!(f, "1"),
            Logic::X => write!(f, "X"),
            Logic::Z => write!(f, "Z"),
        }
    }
}

/// `!0 = 1`, `!1 = 0`, `!X = X`, `!Z = X`.
impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Logic::Zero => Logic::One,
            Logic::One => Logic::Zero,
            Logic::X | Logic::Z => Logic::X,
        }
    }
}

/// A clock edge.
///
/// A transition *into* `One` from any other state is rising and a transition
/// into `Zero` is falling, so `X -> 1` counts as rising (Verilog `posedge`
/// rules rather than VHDL `rising_edge`). Transitions into `X`/`Z` are not
/// edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Edge {
    /// Transition into `One`.
    Rising,
    /// Transition into `Zero`.
    Falling,
}

impl Edge {
    /// Classifies the transition `old -> new`.
    pub fn between(old: Logic, new: Logic) -> Option<Edge> {
        if old == new {
            return None;
        }
        match new {
            Logic::One => Some(Edge::Rising),
            Logic::Zero => Some(Edge::Falling),
            Logic::X | Logic::Z => None,
        }
    }

    /// The other edge.
    pub fn opposite(self) -> Edge {
        match self {
            Edge::Rising => Edge::Falling,
            Edge::Falling => Edge::Rising,
        }
    }

    /// The level a line settles at after this edge.
    pub fn level_after(self) -> bool {
        self == Edge::Rising
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising"),
            Edge::Falling => write!(f, "falling"),
        }
    }
}
