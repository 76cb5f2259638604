//! Test payload generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use spibench_common::word_mask;

/// Word widths exercised by a default sweep.
pub const STANDARD_WIDTHS: [u32; 3] = [8, 16, 32];

/// Payload lengths exercised by a default sweep: 1 through 15 words, then 128.
pub fn standard_lengths() -> Vec<usize> {
    (1..=15).chain(std::iter::once(128)).collect()
}

/// How payload words are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// 0, 1, 2, ... wrapping at the word width.
    #[default]
    Incrementing,
    /// Uniformly random words from a seeded generator.
    Random {
        /// Generator seed; equal seeds give equal payloads.
        seed: u64,
    },
}

impl Payload {
    /// Produces `len` words of `bits` bits.
    pub fn generate(&self, len: usize, bits: u32) -> Vec<u64> {
        let mask = word_mask(bits);
        match *self {
            Payload::Incrementing => (0..len as u64).map(|i| i & mask).collect(),
            Payload::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..len).map(|_| rng.gen::<u64>() & mask).collect()
            }
        }
    }
}
