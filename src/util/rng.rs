//! Deterministic PCG random number generator.
//!
//! Seeds are derived by hashing `(base_seed, chain, sample)` so that
//! correlated inputs (consecutive pixel or path indices) still produce
//! uncorrelated sequences.

use super::math::Vec2;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Uniform random number generator with 32 bits of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    state: u32,
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(0xAB2_0F90)
    }
}

impl Rng {
    /// Create a generator from a raw seed.
    #[inline]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Create a generator for one chain (pixel, path) and sample (iteration).
    #[inline]
    pub fn from_chain(base_seed: u32, chain: u32, sample: u32) -> Self {
        Self::new(hash_seed(base_seed, chain, sample))
    }

    /// Next raw 32 bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let state = self.state;
        let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
        self.state = state.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
        (word >> 22) ^ word
    }

    /// Uniform value in `[0, 1]`.
    #[inline]
    pub fn next_float(&mut self) -> f32 {
        (self.next_u32() as f64 / u32::MAX as f64) as f32
    }

    /// Pair of uniform values in `[0, 1]`.
    #[inline]
    pub fn next_float_2d(&mut self) -> Vec2 {
        let x = self.next_float();
        let y = self.next_float();
        Vec2::new(x, y)
    }
}

#[inline]
fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

#[inline]
fn fnv_hash(mut hash: u32, data: u32) -> u32 {
    for shift in [0, 8, 16, 24] {
        hash = hash.wrapping_mul(FNV_PRIME) ^ ((data >> shift) & 0xFF);
    }
    hash
}

/// Combine three seed components into one 32 bit seed.
pub fn hash_seed(base_seed: u32, chain: u32, sample: u32) -> u32 {
    let mut hash = fnv_hash(FNV_OFFSET_BASIS, pcg_hash(base_seed));
    hash = fnv_hash(hash, pcg_hash(chain));
    hash = fnv_hash(hash, pcg_hash(sample));
    pcg_hash(hash)
}
