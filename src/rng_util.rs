/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// One step of the `SplitMix64` output function.
#[inline]
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the seed for chunk `chunk` of trial `trial` from a base seed.
///
/// Distinct `(trial, chunk)` pairs give unrelated streams, so neither two
/// trials nor two chunks of one trial replay the same random numbers.
#[inline]
pub(crate) fn derive_seed(base: u64, trial: usize, chunk: usize) -> u64 {
    mix(mix(mix(base) ^ trial as u64) ^ chunk as u64)
}
