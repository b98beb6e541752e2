use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Used for calibration values (probabilities, ratios) so that scheduler
/// decisions replay identically across platforms.
pub type Fixed64 = I32F32;

/// Cycles are the atomic unit of scheduler time.
pub type Cycles = u64;

/// Convert an f64 to Fixed64. Use only for configuration, never in the cycle loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Clamp a probability into `[0, 1]`.
#[inline]
pub fn clamp_probability(p: Fixed64) -> Fixed64 {
    p.clamp(Fixed64::ZERO, Fixed64::ONE)
}
