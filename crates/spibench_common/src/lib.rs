//! Shared foundational types used across the spibench workspace.
//!
//! This crate provides the single-bit 4-state [`Logic`] value carried on
//! simulated wires, clock [`Edge`]s, the SPI clock mode table ([`SpiMode`]),
//! serial [`BitOrder`], word/byte packing helpers, and the internal error type.

#![warn(missing_docs)]

pub mod logic;
pub mod mode;
pub mod result;
pub mod word;

pub use logic::{Edge, Logic};
pub use mode::{BitOrder, ParseModeError, SpiMode};
pub use result::{InternalError, SpibenchResult};
pub use word::{bytes_per_word, pack_words, unpack_words, word_mask, MAX_WORD_BITS};
