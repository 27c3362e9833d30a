//! Cosine similarity between two counter profiles.

use crate::counters::{CounterStore, Counters, EntityId, Tag};
use crate::error::Result;
use crate::policy::DecayPolicy;

/// Cosine similarity between two selected stores, both read at `at`.
///
/// Each side is addressed by `(entity, signal, policy)` in its own
/// container; the two containers may be the same or different instances,
/// but both sides share one policy and one evaluation instant. Reading both
/// sides at the same `at` is what keeps decay from skewing magnitudes
/// between profiles last touched at different times.
///
/// An absent store, or a side whose squared norm is exactly zero, makes the
/// whole similarity `0.0` before any division, so the result is never NaN.
/// The dot product only walks ids present on both sides; everything else
/// contributes nothing. Stale-read failures propagate.
#[allow(clippy::too_many_arguments)]
pub fn counter_cosine<E: Tag, S: Tag, I: EntityId>(
    a: &Counters<E, S, I>,
    entity_a: E,
    signal_a: S,
    b: &Counters<E, S, I>,
    entity_b: E,
    signal_b: S,
    policy: DecayPolicy,
    at: u64,
) -> Result<f64> {
    let Some(store_a) = a.store(entity_a, signal_a, policy) else {
        return Ok(0.0);
    };
    let Some(store_b) = b.store(entity_b, signal_b, policy) else {
        return Ok(0.0);
    };

    let norm_sq_a = squared_norm(store_a, at)?;
    if norm_sq_a == 0.0 {
        return Ok(0.0);
    }
    let norm_sq_b = squared_norm(store_b, at)?;
    if norm_sq_b == 0.0 {
        return Ok(0.0);
    }

    // Walk the smaller side; the product is symmetric.
    let (small, large) = if store_a.len() <= store_b.len() {
        (store_a, store_b)
    } else {
        (store_b, store_a)
    };
    let mut dot = 0.0;
    for (id, slot) in small.iter() {
        if let Some(other) = large.get_at(id, at)? {
            dot += slot.value_at(policy, at)? * other;
        }
    }

    // Square-root each side before multiplying: the product of two tiny
    // squared norms can underflow to zero even when both sides are nonzero.
    Ok(dot / (norm_sq_a.sqrt() * norm_sq_b.sqrt()))
}

fn squared_norm<I: EntityId>(store: &CounterStore<I>, at: u64) -> Result<f64> {
    let mut sum = 0.0;
    for (_, slot) in store.iter() {
        let value = slot.value_at(store.policy(), at)?;
        sum += value * value;
    }
    Ok(sum)
}
