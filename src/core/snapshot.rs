//! Raw-contents snapshots and the versioned binary counter image.
//!
//! A snapshot is the plain nested contents of a container, `{key -> {id ->
//! (value, timestamp)}}`, flattened into sorted vectors so that equal
//! containers produce identical snapshots regardless of insertion order.
//! Whatever persistence layer wraps the container decides where snapshots
//! go; this module only guarantees that capture then restore reproduces
//! every accumulator bit for bit.
//!
//! The binary image wraps the JSON-encoded snapshot in an LZ4-compressed
//! chunk behind a magic header. Readers skip chunks they do not recognize,
//! so older readers stay compatible with images written by newer code.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counters::{CounterKey, CounterStore, Counters, EntityId, Tag};
use crate::storage::{self, CountingWriter};
use crate::value::CounterValue;

/// Tag of the chunk holding the whole counters payload.
const TAG_COUNTERS: [u8; 4] = *b"CNTR";

/// Raw contents of one store: its key plus every `(id, accumulator)` entry,
/// sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot<E, S, I> {
    pub key: CounterKey<E, S>,
    pub entries: Vec<(I, CounterValue)>,
}

/// Raw contents of a whole container, sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountersSnapshot<E, S, I> {
    pub stores: Vec<StoreSnapshot<E, S, I>>,
}

impl<E: Tag, S: Tag, I: EntityId> Counters<E, S, I> {
    /// Capture the raw contents of this container.
    ///
    /// Values and timestamps are taken verbatim, with no projection to any
    /// instant, so the snapshot is a faithful dump rather than a view.
    pub fn snapshot(&self) -> CountersSnapshot<E, S, I> {
        let mut stores: Vec<StoreSnapshot<E, S, I>> = self
            .stores()
            .map(|(key, store)| {
                let mut entries: Vec<(I, CounterValue)> = store
                    .iter()
                    .map(|(id, slot)| (id.clone(), *slot))
                    .collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
                StoreSnapshot { key: *key, entries }
            })
            .collect();
        stores.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        CountersSnapshot { stores }
    }

    /// Rebuild a container holding exactly the snapshot's contents.
    ///
    /// Slots are installed directly rather than folded through an update,
    /// so restore reproduces the captured accumulators bit for bit. A
    /// duplicated key or id simply overwrites; the image loader is the
    /// layer that treats duplicates as corruption.
    pub fn from_snapshot(snapshot: CountersSnapshot<E, S, I>) -> Self {
        let mut counters = Counters::new();
        for store_snapshot in snapshot.stores {
            let mut store = CounterStore::new(store_snapshot.key.policy);
            for (id, slot) in store_snapshot.entries {
                store.insert_slot(id, slot);
            }
            counters.insert_store(store_snapshot.key, store);
        }
        counters
    }

    /// Write the whole container as a binary image.
    ///
    /// Layout: 8-byte magic, u32 version, then tagged chunks. Version 1
    /// carries one `CNTR` chunk with the LZ4-compressed JSON snapshot.
    pub fn save_image_to<W: Write>(&self, writer: &mut W) -> io::Result<()>
    where
        E: Serialize,
        S: Serialize,
        I: Serialize,
    {
        let snapshot = self.snapshot();
        let payload = serde_json::to_vec(&snapshot).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("counter snapshot encode failed: {e}"),
            )
        })?;

        writer.write_all(storage::MAGIC)?;
        storage::write_u32_le(writer, storage::VERSION_V1)?;
        storage::write_chunk_lz4(writer, TAG_COUNTERS, &payload)?;
        debug!(
            stores = snapshot.stores.len(),
            payload_bytes = payload.len(),
            "saved counter image"
        );
        Ok(())
    }

    /// Exact byte size of the image [`Counters::save_image_to`] would write.
    pub fn image_size_bytes(&self) -> io::Result<usize>
    where
        E: Serialize,
        S: Serialize,
        I: Serialize,
    {
        let mut counting = CountingWriter::new();
        self.save_image_to(&mut counting)?;
        Ok(counting.written())
    }

    /// Read a binary image back into a container.
    ///
    /// Unknown chunks are skipped. A missing counters chunk, a bad magic or
    /// version, an undecodable payload, or a payload with duplicate keys or
    /// ids all fail with `InvalidData`.
    pub fn load_image_from<R: Read>(reader: &mut R) -> io::Result<Self>
    where
        E: DeserializeOwned,
        S: DeserializeOwned,
        I: DeserializeOwned,
    {
        let magic = storage::read_exact::<8, _>(reader)?;
        if &magic != storage::MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad counter image magic",
            ));
        }
        let version = storage::read_u32_le(reader)?;
        if version != storage::VERSION_V1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported counter image version {version}"),
            ));
        }

        let mut payload: Option<Vec<u8>> = None;
        loop {
            let (tag, len) = match storage::read_chunk_header(reader) {
                Ok(header) => header,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            if tag == TAG_COUNTERS {
                payload = Some(storage::read_chunk_lz4(reader, len)?);
            } else {
                storage::skip_chunk(reader, len)?;
            }
        }
        let payload = payload.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "image has no counters chunk")
        })?;

        let snapshot: CountersSnapshot<E, S, I> =
            serde_json::from_slice(&payload).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("counter snapshot decode failed: {e}"),
                )
            })?;
        let snapshot_stores = snapshot.stores.len();
        let snapshot_entries: usize = snapshot.stores.iter().map(|s| s.entries.len()).sum();

        let counters = Counters::from_snapshot(snapshot);
        if counters.len() != snapshot_stores || total_entries(&counters) != snapshot_entries {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "duplicate store or entry in counter image",
            ));
        }
        debug!(
            stores = snapshot_stores,
            entries = snapshot_entries,
            "loaded counter image"
        );
        Ok(counters)
    }
}

fn total_entries<E: Tag, S: Tag, I: EntityId>(counters: &Counters<E, S, I>) -> usize {
    counters.stores().map(|(_, store)| store.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DecayPolicy, ONE_DAY_SECONDS};
    use std::io::Cursor;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    enum Entity {
        User,
        Session,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    enum Signal {
        Plays,
        Likes,
    }

    type TestCounters = Counters<Entity, Signal, String>;

    fn days(d: u64) -> u64 {
        1 + d * ONE_DAY_SECONDS
    }

    fn populated() -> TestCounters {
        let half_life = DecayPolicy::HalfLife30d;
        let mut counters = TestCounters::new();
        counters.update(Entity::User, Signal::Plays, half_life, "a".into(), 4_000.0, days(0));
        counters.update(Entity::User, Signal::Plays, half_life, "a".into(), 2_000.0, days(30));
        counters.update(Entity::User, Signal::Plays, half_life, "b".into(), 0.1, days(7));
        counters.update(Entity::User, Signal::Likes, DecayPolicy::Sum, "c".into(), 1e-300, days(1));
        counters.update(
            Entity::Session,
            Signal::Plays,
            DecayPolicy::HalfLife1d,
            "d".into(),
            123_456.789,
            days(2),
        );
        counters
    }

    fn assert_bitwise_equal(left: &TestCounters, right: &TestCounters) {
        let a = left.snapshot();
        let b = right.snapshot();
        assert_eq!(a.stores.len(), b.stores.len());
        for (sa, sb) in a.stores.iter().zip(&b.stores) {
            assert_eq!(sa.key, sb.key);
            assert_eq!(sa.entries.len(), sb.entries.len());
            for ((ia, va), (ib, vb)) in sa.entries.iter().zip(&sb.entries) {
                assert_eq!(ia, ib);
                assert_eq!(va.value.to_bits(), vb.value.to_bits());
                assert_eq!(va.timestamp, vb.timestamp);
            }
        }
    }

    #[test]
    fn capture_then_restore_is_bit_identical() {
        let original = populated();
        let restored = TestCounters::from_snapshot(original.snapshot());
        assert_bitwise_equal(&original, &restored);
    }

    #[test]
    fn capture_ignores_insertion_order() {
        let mut forward = TestCounters::new();
        forward.update(Entity::User, Signal::Plays, DecayPolicy::Sum, "a".into(), 1.0, days(0));
        forward.update(Entity::User, Signal::Plays, DecayPolicy::Sum, "b".into(), 2.0, days(0));
        forward.update(Entity::User, Signal::Likes, DecayPolicy::Sum, "c".into(), 3.0, days(0));

        let mut shuffled = TestCounters::new();
        shuffled.update(Entity::User, Signal::Likes, DecayPolicy::Sum, "c".into(), 3.0, days(0));
        shuffled.update(Entity::User, Signal::Plays, DecayPolicy::Sum, "b".into(), 2.0, days(0));
        shuffled.update(Entity::User, Signal::Plays, DecayPolicy::Sum, "a".into(), 1.0, days(0));

        assert_eq!(forward.snapshot(), shuffled.snapshot());
    }

    #[test]
    fn empty_container_roundtrips() {
        let empty = TestCounters::new();
        let mut bytes = Vec::new();
        empty.save_image_to(&mut bytes).unwrap();
        let restored = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn image_roundtrip_is_bit_identical() {
        let original = populated();
        let mut bytes = Vec::new();
        original.save_image_to(&mut bytes).unwrap();
        let restored = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap();
        assert_bitwise_equal(&original, &restored);
    }

    #[test]
    fn image_size_matches_written_bytes() {
        let counters = populated();
        let mut bytes = Vec::new();
        counters.save_image_to(&mut bytes).unwrap();
        assert_eq!(counters.image_size_bytes().unwrap(), bytes.len());
    }

    #[test]
    fn image_with_bad_magic_is_rejected() {
        let counters = populated();
        let mut bytes = Vec::new();
        counters.save_image_to(&mut bytes).unwrap();
        bytes[0] = b'X';
        let err = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn image_with_unknown_version_is_rejected() {
        let counters = populated();
        let mut bytes = Vec::new();
        counters.save_image_to(&mut bytes).unwrap();
        bytes[8] = 99;
        let err = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let original = populated();
        let mut plain = Vec::new();
        original.save_image_to(&mut plain).unwrap();

        // Rebuild the image with a foreign chunk ahead of the real one.
        let mut doctored = Vec::new();
        doctored.extend_from_slice(storage::MAGIC);
        storage::write_u32_le(&mut doctored, storage::VERSION_V1).unwrap();
        storage::write_chunk(&mut doctored, *b"XTRA", &[0xAB; 64]).unwrap();
        doctored.extend_from_slice(&plain[12..]);

        let restored = TestCounters::load_image_from(&mut Cursor::new(doctored)).unwrap();
        assert_bitwise_equal(&original, &restored);
    }

    #[test]
    fn image_without_counters_chunk_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(storage::MAGIC);
        storage::write_u32_le(&mut bytes, storage::VERSION_V1).unwrap();
        let err = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn image_with_duplicate_ids_is_rejected() {
        let key = CounterKey::new(Entity::User, Signal::Plays, DecayPolicy::Sum);
        let snapshot = CountersSnapshot {
            stores: vec![StoreSnapshot {
                key,
                entries: vec![
                    ("a".to_string(), CounterValue::new(1.0, days(0))),
                    ("a".to_string(), CounterValue::new(2.0, days(1))),
                ],
            }],
        };
        let payload = serde_json::to_vec(&snapshot).unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(storage::MAGIC);
        storage::write_u32_le(&mut bytes, storage::VERSION_V1).unwrap();
        storage::write_chunk_lz4(&mut bytes, *b"CNTR", &payload).unwrap();

        let err = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn image_with_duplicate_stores_is_rejected() {
        let key = CounterKey::new(Entity::User, Signal::Plays, DecayPolicy::Sum);
        let store = StoreSnapshot {
            key,
            entries: vec![("a".to_string(), CounterValue::new(1.0, days(0)))],
        };
        let snapshot = CountersSnapshot {
            stores: vec![store.clone(), store],
        };
        let payload = serde_json::to_vec(&snapshot).unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(storage::MAGIC);
        storage::write_u32_le(&mut bytes, storage::VERSION_V1).unwrap();
        storage::write_chunk_lz4(&mut bytes, *b"CNTR", &payload).unwrap();

        let err = TestCounters::load_image_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_image_is_an_io_error() {
        let counters = populated();
        let mut bytes = Vec::new();
        counters.save_image_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(TestCounters::load_image_from(&mut Cursor::new(bytes)).is_err());
    }
}
