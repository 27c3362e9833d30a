use thiserror::Error;

use crate::policy::DecayPolicy;

/// Failures surfaced by the counters core.
///
/// Both variants are programmer-error class: the surrounding ingestion
/// pipeline is expected to validate inputs before they get here, and nothing
/// is retried or silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CounterError {
    /// A projected read or a destructive projection asked for an instant
    /// strictly earlier than the accumulator's stored timestamp, under a
    /// policy that decays. Signals out-of-order or corrupted reads; `Sum`
    /// stores tolerate any instant.
    #[error("timestamp {requested} precedes stored timestamp {stored}")]
    InvalidTimestamp { stored: u64, requested: u64 },

    /// A cross-feed was given a decaying source policy. Feeding an
    /// already-decayed value into a store that decays it again would count
    /// the same elapsed time twice, so only raw `Sum` totals may be a
    /// source.
    #[error("cross-feed source policy must be Sum, got {source_policy:?}")]
    InvalidPolicyCombination { source_policy: DecayPolicy },
}

/// Result type alias for counter operations.
pub type Result<T> = std::result::Result<T, CounterError>;
