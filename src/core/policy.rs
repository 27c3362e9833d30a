//! Decay policies: how accumulated signal loses weight as time passes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Seconds in one day.
pub const ONE_DAY_SECONDS: u64 = 86_400;

/// How a counter's accumulated value is reduced over elapsed time.
///
/// `Sum` keeps raw totals forever. The half-life policies halve a
/// contribution's weight every 1 / 7 / 30 / 180 days, which keeps recent
/// behavior dominant without ever dropping history outright. The policy is
/// part of the counter key, so one store never changes its decay law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecayPolicy {
    /// Plain running total. Never decays and tolerates reads at any instant.
    Sum,
    /// Halve every day.
    HalfLife1d,
    /// Halve every 7 days.
    HalfLife7d,
    /// Halve every 30 days.
    HalfLife30d,
    /// Halve every 180 days.
    HalfLife180d,
}

impl DecayPolicy {
    /// Half-life in seconds, or `None` for [`DecayPolicy::Sum`].
    pub fn half_life_seconds(self) -> Option<u64> {
        match self {
            DecayPolicy::Sum => None,
            DecayPolicy::HalfLife1d => Some(ONE_DAY_SECONDS),
            DecayPolicy::HalfLife7d => Some(7 * ONE_DAY_SECONDS),
            DecayPolicy::HalfLife30d => Some(30 * ONE_DAY_SECONDS),
            DecayPolicy::HalfLife180d => Some(180 * ONE_DAY_SECONDS),
        }
    }

    /// True when this policy applies no decay at all.
    pub fn is_sum(self) -> bool {
        matches!(self, DecayPolicy::Sum)
    }
}

/// Multiplicative weight remaining after `delta_seconds` under `policy`.
///
/// `Sum` and a zero delta both short-circuit to exactly `1.0`, so a no-op
/// projection never picks up float round-off. Very long gaps under a short
/// half-life underflow to `0.0`.
pub fn decay_weight(policy: DecayPolicy, delta_seconds: u64) -> f64 {
    let Some(half_life) = policy.half_life_seconds() else {
        return 1.0;
    };
    if delta_seconds == 0 {
        return 1.0;
    }
    // 2^(-dt/hl): equivalent to exp(-ln2 * dt / hl) but one unit-exponent op.
    (-(delta_seconds as f64) / half_life as f64).exp2()
}
