//! Sparse counter stores and the multi-key container that routes updates,
//! reads, bulk projection, and cross-feeds between signals.

use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{CounterError, Result};
use crate::policy::DecayPolicy;
use crate::value::CounterValue;

/// Marker for the caller-defined tag enums that address a store (what kind
/// of entity is counted, which behavioral signal).
///
/// Blanket-implemented, so any small `Copy` enum with the usual derives
/// qualifies. Keeping the tags as closed enums makes "wrong enumeration"
/// unrepresentable instead of a runtime check.
pub trait Tag: Copy + Eq + Hash + Ord + fmt::Debug {}

impl<T> Tag for T where T: Copy + Eq + Hash + Ord + fmt::Debug {}

/// Marker for entity identifiers within a store (string or integer ids in
/// practice).
pub trait EntityId: Clone + Eq + Hash + Ord {}

impl<T> EntityId for T where T: Clone + Eq + Hash + Ord {}

/// Addresses exactly one store: what kind of entity, which signal, and how
/// it decays.
///
/// The policy is part of the address, so the same signal tracked under two
/// half-lives lands in two independent stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterKey<E, S> {
    pub entity: E,
    pub signal: S,
    pub policy: DecayPolicy,
}

impl<E: Tag, S: Tag> CounterKey<E, S> {
    pub fn new(entity: E, signal: S, policy: DecayPolicy) -> Self {
        Self {
            entity,
            signal,
            policy,
        }
    }
}

/// One id-indexed sheet of accumulators under a single key.
///
/// The decay policy is fixed at construction, inherited from the owning
/// key, and applies to every slot for the store's whole lifetime.
#[derive(Debug, Clone)]
pub struct CounterStore<I> {
    policy: DecayPolicy,
    slots: HashMap<I, CounterValue>,
}

impl<I: EntityId> CounterStore<I> {
    pub fn new(policy: DecayPolicy) -> Self {
        Self {
            policy,
            slots: HashMap::new(),
        }
    }

    pub fn policy(&self) -> DecayPolicy {
        self.policy
    }

    /// Number of tracked entity ids.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Raw accumulated value at its own stored timestamp, no decay applied.
    pub fn get(&self, id: &I) -> Option<f64> {
        self.slots.get(id).map(|slot| slot.value)
    }

    /// Value projected to `at`, without mutating the slot.
    pub fn get_at(&self, id: &I, at: u64) -> Result<Option<f64>> {
        match self.slots.get(id) {
            Some(slot) => slot.value_at(self.policy, at).map(Some),
            None => Ok(None),
        }
    }

    /// Fold one observation into the id's accumulator, creating it at the
    /// identity `(0.0, 0)` first when the id is new.
    pub fn update(&mut self, id: I, value: f64, timestamp: u64) {
        self.slots
            .entry(id)
            .or_insert_with(CounterValue::default)
            .merge(self.policy, value, timestamp);
    }

    /// Project every slot forward to `at`.
    ///
    /// Amortizes decay before a batch of reads and keeps stored timestamps
    /// from drifting arbitrarily far apart. Fails fast on the first slot
    /// already past `at` under a decaying policy; slots visited earlier stay
    /// projected.
    pub fn reduce_all(&mut self, at: u64) -> Result<()> {
        for slot in self.slots.values_mut() {
            slot.project(self.policy, at)?;
        }
        Ok(())
    }

    /// Iterate `(id, accumulator)` pairs in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&I, &CounterValue)> {
        self.slots.iter()
    }

    pub(crate) fn insert_slot(&mut self, id: I, slot: CounterValue) {
        self.slots.insert(id, slot);
    }
}

/// Multi-key counter container.
///
/// Routes every operation by `(entity, signal, policy)` and creates stores
/// lazily on first write. Read paths never allocate: asking about a key or
/// id that was never written reports absence instead of materializing an
/// empty store.
#[derive(Debug, Clone)]
pub struct Counters<E, S, I> {
    stores: HashMap<CounterKey<E, S>, CounterStore<I>>,
}

impl<E: Tag, S: Tag, I: EntityId> Default for Counters<E, S, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Tag, S: Tag, I: EntityId> Counters<E, S, I> {
    pub fn new() -> Self {
        Self {
            stores: HashMap::new(),
        }
    }

    /// Number of distinct `(entity, signal, policy)` stores.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Select a store for reading; `None` when nothing was ever written
    /// under this key.
    pub fn store(&self, entity: E, signal: S, policy: DecayPolicy) -> Option<&CounterStore<I>> {
        self.stores.get(&CounterKey::new(entity, signal, policy))
    }

    /// Fold one observation into the addressed accumulator, creating the
    /// store and the slot on first touch.
    pub fn update(
        &mut self,
        entity: E,
        signal: S,
        policy: DecayPolicy,
        id: I,
        value: f64,
        timestamp: u64,
    ) {
        self.stores
            .entry(CounterKey::new(entity, signal, policy))
            .or_insert_with(|| CounterStore::new(policy))
            .update(id, value, timestamp);
    }

    /// Raw accumulated value, or `None` when the store or the id is absent.
    pub fn value(&self, entity: E, signal: S, policy: DecayPolicy, id: &I) -> Option<f64> {
        self.store(entity, signal, policy)?.get(id)
    }

    /// Value projected to `at`, or `Ok(None)` when the store or the id is
    /// absent.
    pub fn value_at(
        &self,
        entity: E,
        signal: S,
        policy: DecayPolicy,
        id: &I,
        at: u64,
    ) -> Result<Option<f64>> {
        match self.store(entity, signal, policy) {
            Some(store) => store.get_at(id, at),
            None => Ok(None),
        }
    }

    /// Project every store's slots forward to `at`, each under its own
    /// key-determined policy.
    pub fn reduce(&mut self, at: u64) -> Result<()> {
        for store in self.stores.values_mut() {
            store.reduce_all(at)?;
        }
        trace!(stores = self.stores.len(), at, "reduced counters");
        Ok(())
    }

    /// Fold a whole source store into one of this container's stores.
    ///
    /// Every source slot is read at `at`, scaled by `weight`, and folded
    /// into `(entity, dst_signal, dst_policy)` with timestamp `at`. The
    /// source must be a raw `Sum` store; feeding an already-decayed value
    /// into a decaying destination would discount the same elapsed time
    /// twice. The policy check runs before any store lookup, so a bad
    /// combination fails even when the source store does not exist yet. A
    /// missing or empty source is a no-op that creates no destination
    /// store.
    #[allow(clippy::too_many_arguments)]
    pub fn update_from(
        &mut self,
        source: &Counters<E, S, I>,
        entity: E,
        src_signal: S,
        src_policy: DecayPolicy,
        dst_signal: S,
        dst_policy: DecayPolicy,
        at: u64,
        weight: f64,
    ) -> Result<()> {
        if !src_policy.is_sum() {
            return Err(CounterError::InvalidPolicyCombination {
                source_policy: src_policy,
            });
        }
        let Some(src) = source.store(entity, src_signal, src_policy) else {
            return Ok(());
        };
        if src.is_empty() {
            return Ok(());
        }
        let dst = self
            .stores
            .entry(CounterKey::new(entity, dst_signal, dst_policy))
            .or_insert_with(|| CounterStore::new(dst_policy));
        for (id, slot) in src.iter() {
            let value = slot.value_at(src_policy, at)?;
            dst.update(id.clone(), value * weight, at);
        }
        debug!(entries = src.len(), at, "cross-fed counters");
        Ok(())
    }

    pub(crate) fn stores(&self) -> impl Iterator<Item = (&CounterKey<E, S>, &CounterStore<I>)> {
        self.stores.iter()
    }

    pub(crate) fn insert_store(&mut self, key: CounterKey<E, S>, store: CounterStore<I>) {
        self.stores.insert(key, store);
    }
}
