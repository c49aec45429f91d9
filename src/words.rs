//! Fixed-width word encoding of group elements.
//!
//! Every number crossing the host/device boundary travels as a vector of
//! 32-bit words, least-significant word first, zero-padded to the layout
//! width. Multi-point buffers come in two shapes: row-major (one point per
//! row, convenient on the host) and "vertical" column-major (one word index
//! per row, one lane per column), which is what the device consumes so that
//! all lanes read the same word index in a single access cycle.

use anyhow::{ensure, Result};
use num_bigint::BigUint;

/// Number of 32-bit words needed to hold values in `[0, modulus)`.
pub fn words_per_number(modulus: &BigUint) -> usize {
    let bits = modulus.bits().max(1);
    ((bits + 31) / 32) as usize
}

/// Encodes a value into exactly `width` little-endian 32-bit words.
///
/// Fails if the value does not fit the layout; this is a configuration
/// error, not something the search loop can recover from.
pub fn encode(value: &BigUint, width: usize) -> Result<Vec<u32>> {
    let mut words = value.to_u32_digits();
    ensure!(
        words.len() <= width,
        "value needs {} words but the layout holds {}",
        words.len(),
        width
    );
    words.resize(width, 0);
    Ok(words)
}

/// Decodes a little-endian 32-bit word vector back into a value.
pub fn decode(words: &[u32]) -> BigUint {
    BigUint::new(words.to_vec())
}

/// Transposes a row-major point matrix into the vertical device layout.
///
/// `rows` holds `amount` points of `width` words each; in the result,
/// word `j` of point `i` lives at index `i + j * amount`.
pub fn transpose_vertical(rows: &[u32], amount: usize, width: usize) -> Vec<u32> {
    debug_assert_eq!(rows.len(), amount * width);
    let mut out = vec![0u32; rows.len()];
    for i in 0..amount {
        for j in 0..width {
            out[i + j * amount] = rows[i * width + j];
        }
    }
    out
}
