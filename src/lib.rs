//! Decay-weighted behavioral counters with profile similarity.
//!
//! `embers` folds `(value, timestamp)` observations into per-entity
//! accumulators addressed by `(entity tag, signal tag, decay policy)`.
//! Under a half-life policy every contribution loses weight exponentially
//! with age; decay is applied lazily at read time, so updates stay cheap
//! and out-of-order delivery folds to the same state as in-order delivery.
//! Two counter profiles can be compared with
//! [`similarity::counter_cosine`] at one shared evaluation instant.
//!
//! # Quick Start
//!
//! ```
//! use embers::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
//! enum Entity { User }
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
//! enum Signal { Plays }
//!
//! let mut counters: Counters<Entity, Signal, String> = Counters::new();
//! counters.update(
//!     Entity::User,
//!     Signal::Plays,
//!     DecayPolicy::HalfLife30d,
//!     "artist-1".to_string(),
//!     10.0,
//!     86_400,
//! );
//!
//! // Raw value, as of its own timestamp.
//! let raw = counters
//!     .value(Entity::User, Signal::Plays, DecayPolicy::HalfLife30d, &"artist-1".to_string())
//!     .unwrap_or(0.0);
//! assert_eq!(raw, 10.0);
//!
//! // Projected one half-life later: half the weight remains.
//! let halved = counters
//!     .value_at(
//!         Entity::User,
//!         Signal::Plays,
//!         DecayPolicy::HalfLife30d,
//!         &"artist-1".to_string(),
//!         31 * 86_400,
//!     )
//!     .unwrap()
//!     .unwrap();
//! assert!((halved - 5.0).abs() < 1e-9);
//! ```
//!
//! # Feature Flags
//!
//! - `serde` (default): raw-contents snapshots and the binary image format
//!
//! # Modules
//!
//! - [`policy`]: decay policies and the half-life weight law
//! - [`value`]: the single-accumulator fold/projection algebra
//! - [`counters`]: sparse stores and the multi-key container
//! - [`similarity`]: cosine similarity between counter profiles
//! - [`snapshot`]: snapshots and the binary counter image
//! - [`storage`]: byte-level image helpers

#[path = "core/counters.rs"]
pub mod counters;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/policy.rs"]
pub mod policy;

#[path = "core/similarity.rs"]
pub mod similarity;

#[cfg(feature = "serde")]
#[path = "core/snapshot.rs"]
pub mod snapshot;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/value.rs"]
pub mod value;

/// Convenience re-exports of the types most callers touch.
pub mod prelude {
    pub use crate::counters::{CounterKey, CounterStore, Counters, EntityId, Tag};
    pub use crate::error::{CounterError, Result};
    pub use crate::policy::{decay_weight, DecayPolicy};
    pub use crate::similarity::counter_cosine;
    #[cfg(feature = "serde")]
    pub use crate::snapshot::{CountersSnapshot, StoreSnapshot};
    pub use crate::value::CounterValue;
}
