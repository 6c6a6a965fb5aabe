//! Wraparound-aware sequence number arithmetic.

/// Modulo arithmetic over `[0, 2^53)`.
///
/// Ordering is only well-defined while the true distance between two
/// numbers stays within half the modulus; the authority enforces that by
/// rejecting tokens that drift further than its configured bound.
pub struct SequenceSpace;

impl SequenceSpace {
    /// Size of the sequence space (2^53).
    pub const MODULUS: u64 = 1 << 53;

    /// Half the sequence space (2^52): the largest forward distance that
    /// still counts as "ahead".
    pub const HALF_MODULUS: u64 = 1 << 52;

    /// Largest valid sequence number.
    pub const MAX: u64 = Self::MODULUS - 1;

    pub fn is_valid(n: u64) -> bool {
        n < Self::MODULUS
    }

    /// `(n + 1) mod 2^53`.
    pub fn increment(n: u64) -> u64 {
        (n + 1) & Self::MAX
    }

    /// `(a - b) mod 2^53`.
    pub fn forward_distance(from: u64, to: u64) -> u64 {
        to.wrapping_sub(from) & Self::MAX
    }

    /// True iff `a` is ahead of `b`: `(a - b) mod 2^53` is in `[1, 2^52]`.
    pub fn is_ahead(a: u64, b: u64) -> bool {
        let distance = Self::forward_distance(b, a);
        (1..=Self::HALF_MODULUS).contains(&distance)
    }

    /// Shortest distance between `a` and `b` in the circular space.
    pub fn drift(a: u64, b: u64) -> u64 {
        let forward = Self::forward_distance(b, a);
        forward.min(Self::MODULUS - forward)
    }
}
