//! Single-accumulator algebra: lazy decay on read and order-independent
//! folding of raw observations.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CounterError, Result};
use crate::policy::{decay_weight, DecayPolicy};

/// One accumulator: a value as it stood at `timestamp`.
///
/// Decay is applied lazily. The stored pair means "this much signal, as
/// observed at this instant"; any later read re-weights it across the gap.
/// A fresh accumulator is `(0.0, 0)`, the identity for [`CounterValue::merge`]
/// under every policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterValue {
    pub value: f64,
    pub timestamp: u64,
}

impl CounterValue {
    pub fn new(value: f64, timestamp: u64) -> Self {
        Self { value, timestamp }
    }

    /// The value this accumulator holds when read at `at`, without mutating.
    ///
    /// Reading at the stored timestamp returns the stored value exactly, no
    /// decay math involved. `Sum` ignores `at` entirely. Decaying policies
    /// reject instants earlier than the stored timestamp: the accumulator
    /// cannot say what it looked like before its last fold.
    pub fn value_at(&self, policy: DecayPolicy, at: u64) -> Result<f64> {
        if at == self.timestamp || policy.is_sum() {
            return Ok(self.value);
        }
        if at < self.timestamp {
            return Err(CounterError::InvalidTimestamp {
                stored: self.timestamp,
                requested: at,
            });
        }
        Ok(self.value * decay_weight(policy, at - self.timestamp))
    }

    /// Destructively project forward: fold decay up to `at` into the stored
    /// value so later reads and folds start from there.
    pub fn project(&mut self, policy: DecayPolicy, at: u64) -> Result<()> {
        self.value = self.value_at(policy, at)?;
        self.timestamp = at;
        Ok(())
    }

    /// Fold one raw observation into the accumulator.
    ///
    /// The stored state and the observation are ordered by time first, then
    /// the earlier operand is decayed across the gap and the later one added
    /// on top. Ordering before decaying is what makes any permutation of the
    /// same observations fold to the same final state, so out-of-order
    /// delivery is harmless here. The stored timestamp tracks the running
    /// maximum.
    pub fn merge(&mut self, policy: DecayPolicy, value: f64, timestamp: u64) {
        let (earlier, gap, later) = if self.timestamp <= timestamp {
            (self.value, timestamp - self.timestamp, value)
        } else {
            (value, self.timestamp - timestamp, self.value)
        };
        self.value = earlier * decay_weight(policy, gap) + later;
        self.timestamp = self.timestamp.max(timestamp);
    }
}
