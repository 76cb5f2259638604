//! Serial word helpers: width masks and little-endian byte packing.
//!
//! Words of 1–64 bits are carried as `u64`. When a word stream has to be
//! exchanged as bytes, each word occupies the smallest power-of-two number of
//! bytes that holds it (a 9-bit word uses two bytes, a 24-bit word four),
//! stored little-endian.

/// Widest word a serial emulator can carry.
pub const MAX_WORD_BITS: u32 = 64;

/// Mask selecting the low `bits` bits of a word.
pub fn word_mask(bits: u32) -> u64 {
    if bits >= MAX_WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Bytes used to store one word of the given width.
pub fn bytes_per_word(bits: u32) -> usize {
    match bits {
        0..=8 => 1,
        9..=16 => 2,
        17..=32 => 4,
        _ => 8,
    }
}

/// Packs words into bytes, little-endian, `bytes_per_word(bits)` bytes each.
///
/// Bits above the word width are dropped.
pub fn pack_words(words: &[u64], bits: u32) -> Vec<u8> {
    let stride = bytes_per_word(bits);
    let mask = word_mask(bits);
    let mut out = Vec::with_capacity(words.len() * stride);
    for &w in words {
        out.extend_from_slice(&(w & mask).to_le_bytes()[..stride]);
    }
    out
}

/// Unpacks a byte buffer into words, the inverse of [`pack_words`].
///
/// Returns `None` if the buffer length is not a whole number of words.
pub fn unpack_words(bytes: &[u8], bits: u32) -> Option<Vec<u64>> {
    let stride = bytes_per_word(bits);
    if bytes.len() % stride != 0 {
        return None;
    }
    let mask = word_mask(bits);
    let words = bytes
        .chunks_exact(stride)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..stride].copy_from_slice(chunk);
            u64::from_le_bytes(buf) & mask
        })
        .collect();
    Some(words)
}
