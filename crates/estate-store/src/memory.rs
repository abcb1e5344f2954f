use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::journal::{verify_journal, CommitReceipt};
use crate::partition::{CollectionPolicy, Partition, StateKey, VersionedValue};
use crate::traits::LedgerStore;
use crate::write_set::WriteSet;

/// In-memory, `BTreeMap`-based ledger store.
///
/// Intended for tests, the CLI and embedding. Entries are kept in key order
/// so prefix scans are range walks. Commits take the write lock, validate the
/// read set and apply every write under the next height before releasing it.
pub struct InMemoryLedgerStore {
    collections: CollectionPolicy,
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    entries: BTreeMap<StateKey, VersionedValue>,
    journal: Vec<CommitReceipt>,
}

/// Serializable image of a store, used to persist state between CLI runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub collections: CollectionPolicy,
    pub entries: Vec<(StateKey, VersionedValue)>,
    pub journal: Vec<CommitReceipt>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_collections(CollectionPolicy::default())
    }

    pub fn with_collections(collections: CollectionPolicy) -> Self {
        Self {
            collections,
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of committed entries across all partitions.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_state()?.entries.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Capture every entry and the journal.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let state = self.read_state()?;
        Ok(StoreSnapshot {
            collections: self.collections.clone(),
            entries: state
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            journal: state.journal.clone(),
        })
    }

    /// Rebuild a store from a snapshot, refusing one whose journal does not
    /// verify.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        verify_journal(&snapshot.journal)?;
        let state = StoreState {
            entries: snapshot.entries.into_iter().collect(),
            journal: snapshot.journal,
        };
        Ok(Self {
            collections: snapshot.collections,
            inner: RwLock::new(state),
        })
    }

    /// Write a bincode snapshot to `path`.
    pub fn save_to(&self, path: &Path) -> StoreResult<()> {
        let bytes = bincode::serialize(&self.snapshot()?)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(path, bytes)?;
        tracing::debug!(path = %path.display(), "state snapshot saved");
        Ok(())
    }

    /// Load a bincode snapshot written by [`Self::save_to`].
    pub fn load_from(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let snapshot: StoreSnapshot = bincode::deserialize(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    fn read_state(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn scan_entries(
        entries: &BTreeMap<StateKey, VersionedValue>,
        partition: Partition,
        prefix: &str,
        start_after: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<(String, VersionedValue)> {
        let lower = match start_after {
            Some(after) if after >= prefix => Bound::Excluded(StateKey::new(partition, after)),
            _ => Bound::Included(StateKey::new(partition, prefix)),
        };
        entries
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.partition == partition && k.key.starts_with(prefix))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(k, v)| (k.key.clone(), v.clone()))
            .collect()
    }

    /// Re-check every read and range of `write_set` against committed state.
    fn validate(state: &StoreState, write_set: &WriteSet) -> StoreResult<()> {
        for read in &write_set.reads {
            let found = state.entries.get(&read.key).map(|v| v.version);
            if found != read.version {
                return Err(StoreError::ReadConflict {
                    key: read.key.to_string(),
                    expected: read.version,
                    found,
                });
            }
        }

        for range in &write_set.ranges {
            let current: Vec<(String, u64)> = Self::scan_entries(
                &state.entries,
                range.partition,
                &range.prefix,
                range.start_after.as_deref(),
                None,
            )
            .into_iter()
            .filter(|(k, _)| range.covers(k))
            .map(|(k, v)| (k, v.version))
            .collect();
            if current != range.observed {
                return Err(StoreError::PhantomRead {
                    range: range.describe(),
                });
            }
        }

        Ok(())
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<VersionedValue>> {
        let state = self.read_state()?;
        Ok(state.entries.get(&StateKey::new(partition, key)).cloned())
    }

    fn scan(
        &self,
        partition: Partition,
        prefix: &str,
        start_after: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, VersionedValue)>> {
        let state = self.read_state()?;
        Ok(Self::scan_entries(
            &state.entries,
            partition,
            prefix,
            start_after,
            limit,
        ))
    }

    fn commit(&self, write_set: &WriteSet) -> StoreResult<CommitReceipt> {
        let mut state = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;

        if let Err(err) = Self::validate(&state, write_set) {
            tracing::warn!(
                tx_id = %write_set.tx_id,
                function = %write_set.function,
                error = %err,
                "commit rejected"
            );
            return Err(err);
        }

        let seq = state.journal.len() as u64 + 1;
        let prev_hash = state.journal.last().map(|r| r.receipt_hash);
        let receipt = CommitReceipt::seal(
            seq,
            write_set.tx_id.clone(),
            write_set.function.clone(),
            write_set.organization,
            write_set.writes.len(),
            write_set.digest()?,
            prev_hash,
        )?;

        for write in &write_set.writes {
            state.entries.insert(
                write.key.clone(),
                VersionedValue {
                    value: write.value.clone(),
                    version: seq,
                },
            );
        }
        state.journal.push(receipt.clone());

        tracing::debug!(
            seq,
            tx_id = %write_set.tx_id,
            function = %write_set.function,
            writes = write_set.writes.len(),
            "write set committed"
        );
        Ok(receipt)
    }

    fn height(&self) -> StoreResult<u64> {
        Ok(self.read_state()?.journal.len() as u64)
    }

    fn journal(&self) -> StoreResult<Vec<CommitReceipt>> {
        Ok(self.read_state()?.journal.clone())
    }

    fn collection_policy(&self) -> &CollectionPolicy {
        &self.collections
    }
}

impl std::fmt::Debug for InMemoryLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (entries, height) = match self.inner.read() {
            Ok(state) => (state.entries.len(), state.journal.len()),
            Err(_) => (0, 0),
        };
        f.debug_struct("InMemoryLedgerStore")
            .field("entry_count", &entries)
            .field("height", &height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write_set::{RangeRead, ReadEntry, WriteEntry};
    use estate_types::{Collection, Organization, TxId};

    fn write_set(writes: &[(&str, &str)]) -> WriteSet {
        WriteSet {
            tx_id: TxId::new(),
            function: "test".into(),
            organization: Organization::Government,
            reads: Vec::new(),
            ranges: Vec::new(),
            writes: writes
                .iter()
                .map(|(k, v)| WriteEntry {
                    key: StateKey::new(Partition::Shared, *k),
                    value: v.as_bytes().to_vec(),
                })
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Commit and versions
    // -----------------------------------------------------------------------

    #[test]
    fn commit_applies_all_writes_at_one_height() {
        let store = InMemoryLedgerStore::new();
        let receipt = store.commit(&write_set(&[("a", "1"), ("b", "2")])).unwrap();
        assert_eq!(receipt.seq, 1);
        assert_eq!(store.height().unwrap(), 1);

        let a = store.get(Partition::Shared, "a").unwrap().unwrap();
        let b = store.get(Partition::Shared, "b").unwrap().unwrap();
        assert_eq!(a.version, 1);
        assert_eq!(b.version, 1);
        assert_eq!(b.value, b"2");
    }

    #[test]
    fn partitions_are_separate() {
        let store = InMemoryLedgerStore::new();
        let mut ws = write_set(&[]);
        ws.writes.push(WriteEntry {
            key: StateKey::new(Partition::Private(Collection::UserData), "a"),
            value: b"secret".to_vec(),
        });
        store.commit(&ws).unwrap();
        assert!(store.get(Partition::Shared, "a").unwrap().is_none());
        assert!(store
            .get(Partition::Private(Collection::UserData), "a")
            .unwrap()
            .is_some());
    }

    // -----------------------------------------------------------------------
    // MVCC validation
    // -----------------------------------------------------------------------

    #[test]
    fn stale_read_is_rejected() {
        let store = InMemoryLedgerStore::new();
        store.commit(&write_set(&[("bal", "10")])).unwrap();

        let mut stale = write_set(&[("bal", "0")]);
        stale.reads.push(ReadEntry {
            key: StateKey::new(Partition::Shared, "bal"),
            version: Some(1),
        });
        let mut racing = stale.clone();
        racing.tx_id = TxId::new();

        store.commit(&racing).unwrap();
        let err = store.commit(&stale).unwrap_err();
        assert!(err.is_mvcc_conflict());
        assert!(matches!(
            err,
            StoreError::ReadConflict {
                expected: Some(1),
                found: Some(2),
                ..
            }
        ));
        // Rejected commit left nothing behind.
        assert_eq!(store.height().unwrap(), 2);
    }

    #[test]
    fn absent_read_conflicts_with_concurrent_create() {
        let store = InMemoryLedgerStore::new();
        let mut create = write_set(&[("k", "x")]);
        create.reads.push(ReadEntry {
            key: StateKey::new(Partition::Shared, "k"),
            version: None,
        });
        let mut twin = create.clone();
        twin.tx_id = TxId::new();
        store.commit(&create).unwrap();
        assert!(store.commit(&twin).unwrap_err().is_mvcc_conflict());
    }

    #[test]
    fn phantom_insert_is_rejected() {
        let store = InMemoryLedgerStore::new();
        store.commit(&write_set(&[("p/1", "a")])).unwrap();

        let observed: Vec<(String, u64)> = store
            .scan(Partition::Shared, "p/", None, None)
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k, v.version))
            .collect();
        let mut reader = write_set(&[("summary", "1")]);
        reader.ranges.push(RangeRead {
            partition: Partition::Shared,
            prefix: "p/".into(),
            start_after: None,
            end_inclusive: None,
            observed,
        });

        store.commit(&write_set(&[("p/2", "b")])).unwrap();
        assert!(matches!(
            store.commit(&reader),
            Err(StoreError::PhantomRead { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Scans
    // -----------------------------------------------------------------------

    #[test]
    fn scan_respects_prefix_start_and_limit() {
        let store = InMemoryLedgerStore::new();
        store
            .commit(&write_set(&[
                ("a/1", "x"),
                ("a/2", "x"),
                ("a/3", "x"),
                ("b/1", "x"),
            ]))
            .unwrap();

        let all = store.scan(Partition::Shared, "a/", None, None).unwrap();
        assert_eq!(all.len(), 3);

        let after = store
            .scan(Partition::Shared, "a/", Some("a/1"), Some(1))
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].0, "a/2");

        // A resume point before the prefix starts at the prefix.
        let early = store.scan(Partition::Shared, "b/", Some("a/9"), None).unwrap();
        assert_eq!(early.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Journal and snapshots
    // -----------------------------------------------------------------------

    #[test]
    fn journal_chains_commits() {
        let store = InMemoryLedgerStore::new();
        for i in 0..4 {
            store.commit(&write_set(&[(&format!("k{i}"), "v")])).unwrap();
        }
        let journal = store.journal().unwrap();
        assert_eq!(journal.len(), 4);
        verify_journal(&journal).unwrap();
        assert_eq!(journal[3].prev_hash, Some(journal[2].receipt_hash));
    }

    #[test]
    fn snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");

        let store = InMemoryLedgerStore::new();
        store.commit(&write_set(&[("a", "1")])).unwrap();
        store.commit(&write_set(&[("b", "2")])).unwrap();
        store.save_to(&path).unwrap();

        let loaded = InMemoryLedgerStore::load_from(&path).unwrap();
        assert_eq!(loaded.height().unwrap(), 2);
        assert_eq!(loaded.snapshot().unwrap(), store.snapshot().unwrap());
    }

    #[test]
    fn tampered_snapshot_is_refused() {
        let store = InMemoryLedgerStore::new();
        store.commit(&write_set(&[("a", "1")])).unwrap();
        let mut snapshot = store.snapshot().unwrap();
        snapshot.journal[0].function = "forged".into();
        assert!(matches!(
            InMemoryLedgerStore::from_snapshot(snapshot),
            Err(StoreError::JournalIntegrity { .. })
        ));
    }

    #[test]
    fn missing_snapshot_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InMemoryLedgerStore::load_from(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
