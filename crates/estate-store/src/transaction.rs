use std::collections::BTreeMap;

use estate_types::{Collection, CompositeKey, Organization, TxId};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::page::{Bookmark, Page, PageRequest};
use crate::partition::{Partition, StateKey};
use crate::traits::LedgerStore;
use crate::write_set::{RangeRead, ReadEntry, WriteEntry, WriteSet};

/// Invocation-scoped view over a [`LedgerStore`].
///
/// Point reads see this invocation's own buffered writes first, then
/// committed state. Range scans see committed state only. Every committed
/// read is recorded with its version so [`LedgerStore::commit`] can reject
/// the write set if anything it depended on changed.
///
/// Private partitions are only reachable through the `*_private` methods,
/// which check that the calling organization is a collection member.
pub struct StoreTransaction<'a> {
    store: &'a dyn LedgerStore,
    organization: Organization,
    tx_id: TxId,
    reads: BTreeMap<StateKey, Option<u64>>,
    ranges: Vec<RangeRead>,
    writes: BTreeMap<StateKey, Vec<u8>>,
}

impl<'a> StoreTransaction<'a> {
    pub fn begin(store: &'a dyn LedgerStore, organization: Organization, tx_id: TxId) -> Self {
        Self {
            store,
            organization,
            tx_id,
            reads: BTreeMap::new(),
            ranges: Vec::new(),
            writes: BTreeMap::new(),
        }
    }

    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    pub fn organization(&self) -> Organization {
        self.organization
    }

    /// Whether the calling organization may access `collection`.
    pub fn can_access(&self, collection: Collection) -> bool {
        self.store
            .collection_policy()
            .is_member(collection, self.organization)
    }

    fn check_member(&self, collection: Collection) -> StoreResult<()> {
        if self.can_access(collection) {
            Ok(())
        } else {
            Err(StoreError::PartitionAccessDenied {
                collection,
                organization: self.organization,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    fn get(&mut self, partition: Partition, key: &CompositeKey) -> StoreResult<Option<Vec<u8>>> {
        let state_key = StateKey::new(partition, key.encode());
        if let Some(pending) = self.writes.get(&state_key) {
            return Ok(Some(pending.clone()));
        }
        let committed = self.store.get(partition, &state_key.key)?;
        self.reads
            .entry(state_key)
            .or_insert_with(|| committed.as_ref().map(|v| v.version));
        Ok(committed.map(|v| v.value))
    }

    fn put(&mut self, partition: Partition, key: &CompositeKey, value: Vec<u8>) {
        self.writes
            .insert(StateKey::new(partition, key.encode()), value);
    }

    fn scan(
        &mut self,
        partition: Partition,
        partial: &CompositeKey,
        page: &PageRequest,
    ) -> StoreResult<Page<(CompositeKey, Vec<u8>)>> {
        let prefix = partial.encode();
        let start_after = page
            .bookmark
            .as_ref()
            .map(Bookmark::resume_key)
            .transpose()?;
        let page_size = page.page_size.max(1);

        // One extra entry tells us whether another page exists.
        let mut entries =
            self.store
                .scan(partition, &prefix, start_after.as_deref(), Some(page_size + 1))?;
        let has_more = entries.len() > page_size;
        entries.truncate(page_size);

        let end_inclusive = if has_more {
            entries.last().map(|(k, _)| k.clone())
        } else {
            None
        };
        self.ranges.push(RangeRead {
            partition,
            prefix,
            start_after,
            end_inclusive: end_inclusive.clone(),
            observed: entries.iter().map(|(k, v)| (k.clone(), v.version)).collect(),
        });

        let records = entries
            .into_iter()
            .map(|(k, v)| Ok((CompositeKey::decode(&k)?, v.value)))
            .collect::<StoreResult<Vec<_>>>()?;
        let bookmark = end_inclusive.as_deref().map(Bookmark::after_key);
        tracing::debug!(
            partition = %partition,
            prefix = %partial,
            fetched = records.len(),
            more = has_more,
            "range scan"
        );
        Ok(Page::new(records, bookmark))
    }

    // -----------------------------------------------------------------------
    // Shared partition
    // -----------------------------------------------------------------------

    pub fn get_shared(&mut self, key: &CompositeKey) -> StoreResult<Option<Vec<u8>>> {
        self.get(Partition::Shared, key)
    }

    pub fn put_shared(&mut self, key: &CompositeKey, value: Vec<u8>) {
        self.put(Partition::Shared, key, value)
    }

    pub fn scan_shared(
        &mut self,
        partial: &CompositeKey,
        page: &PageRequest,
    ) -> StoreResult<Page<(CompositeKey, Vec<u8>)>> {
        self.scan(Partition::Shared, partial, page)
    }

    // -----------------------------------------------------------------------
    // Private partitions
    // -----------------------------------------------------------------------

    pub fn get_private(
        &mut self,
        collection: Collection,
        key: &CompositeKey,
    ) -> StoreResult<Option<Vec<u8>>> {
        self.check_member(collection)?;
        self.get(Partition::Private(collection), key)
    }

    pub fn put_private(
        &mut self,
        collection: Collection,
        key: &CompositeKey,
        value: Vec<u8>,
    ) -> StoreResult<()> {
        self.check_member(collection)?;
        self.put(Partition::Private(collection), key, value);
        Ok(())
    }

    pub fn scan_private(
        &mut self,
        collection: Collection,
        partial: &CompositeKey,
        page: &PageRequest,
    ) -> StoreResult<Page<(CompositeKey, Vec<u8>)>> {
        self.check_member(collection)?;
        self.scan(Partition::Private(collection), partial, page)
    }

    // -----------------------------------------------------------------------
    // JSON documents
    // -----------------------------------------------------------------------

    pub fn get_shared_json<T: DeserializeOwned>(
        &mut self,
        key: &CompositeKey,
    ) -> StoreResult<Option<T>> {
        self.get_shared(key)?.map(|b| decode_json(&b)).transpose()
    }

    pub fn put_shared_json<T: Serialize>(&mut self, key: &CompositeKey, value: &T) -> StoreResult<()> {
        let bytes = encode_json(value)?;
        self.put_shared(key, bytes);
        Ok(())
    }

    pub fn get_private_json<T: DeserializeOwned>(
        &mut self,
        collection: Collection,
        key: &CompositeKey,
    ) -> StoreResult<Option<T>> {
        self.get_private(collection, key)?
            .map(|b| decode_json(&b))
            .transpose()
    }

    pub fn put_private_json<T: Serialize>(
        &mut self,
        collection: Collection,
        key: &CompositeKey,
        value: &T,
    ) -> StoreResult<()> {
        let bytes = encode_json(value)?;
        self.put_private(collection, key, bytes)
    }

    /// Returns `true` if nothing has been buffered for writing.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Close the view and produce the write set to submit for commit.
    pub fn into_write_set(self, function: impl Into<String>) -> WriteSet {
        WriteSet {
            tx_id: self.tx_id,
            function: function.into(),
            organization: self.organization,
            reads: self
                .reads
                .into_iter()
                .map(|(key, version)| ReadEntry { key, version })
                .collect(),
            ranges: self.ranges,
            writes: self
                .writes
                .into_iter()
                .map(|(key, value)| WriteEntry { key, value })
                .collect(),
        }
    }
}

/// Decode a JSON document value.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Encode a JSON document value.
pub fn encode_json<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedgerStore;
    use estate_types::DocType;

    fn commit_shared(store: &InMemoryLedgerStore, pairs: &[(&str, u32)]) {
        let mut txn = StoreTransaction::begin(store, Organization::Government, TxId::new());
        for (id, v) in pairs {
            txn.put_shared_json(&CompositeKey::realty(id).unwrap(), v)
                .unwrap();
        }
        store.commit(&txn.into_write_set("seed")).unwrap();
    }

    #[test]
    fn reads_see_own_writes() {
        let store = InMemoryLedgerStore::new();
        let mut txn = StoreTransaction::begin(&store, Organization::Government, TxId::new());
        let key = CompositeKey::realty("C1").unwrap();
        assert_eq!(txn.get_shared_json::<u32>(&key).unwrap(), None);
        txn.put_shared_json(&key, &7u32).unwrap();
        assert_eq!(txn.get_shared_json::<u32>(&key).unwrap(), Some(7));

        let ws = txn.into_write_set("t");
        // Only the committed (absent) read is recorded.
        assert_eq!(ws.reads.len(), 1);
        assert_eq!(ws.reads[0].version, None);
        assert_eq!(ws.writes.len(), 1);
    }

    #[test]
    fn private_access_requires_membership() {
        let store = InMemoryLedgerStore::new();
        let mut txn = StoreTransaction::begin(&store, Organization::ThirdParty, TxId::new());
        let key = CompositeKey::realty("C1").unwrap();
        assert!(!txn.can_access(Collection::RealEstatePrivate));
        let err = txn
            .get_private(Collection::RealEstatePrivate, &key)
            .unwrap_err();
        assert!(matches!(err, StoreError::PartitionAccessDenied { .. }));
        assert!(txn
            .put_private(Collection::RealEstatePrivate, &key, b"x".to_vec())
            .is_err());
        // User data is open to every organization by default.
        assert!(txn.get_private(Collection::UserData, &key).is_ok());
    }

    #[test]
    fn paginated_scan_visits_every_key_once() {
        let store = InMemoryLedgerStore::new();
        let ids: Vec<String> = (0..7).map(|i| format!("C{i}")).collect();
        let pairs: Vec<(&str, u32)> = ids.iter().map(|s| (s.as_str(), 1)).collect();
        commit_shared(&store, &pairs);

        let mut txn = StoreTransaction::begin(&store, Organization::Bank, TxId::new());
        let partial = CompositeKey::namespace(DocType::Realty);
        let mut seen = Vec::new();
        let mut request = PageRequest::first(3);
        loop {
            let page = txn.scan_shared(&partial, &request).unwrap();
            assert!(page.fetched_records_count <= 3);
            seen.extend(page.records.iter().map(|(k, _)| k.attributes()[0].clone()));
            match page.bookmark {
                Some(b) => request = PageRequest::after(3, b),
                None => break,
            }
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn exact_page_boundary_has_no_bookmark() {
        let store = InMemoryLedgerStore::new();
        commit_shared(&store, &[("A", 1), ("B", 2)]);
        let mut txn = StoreTransaction::begin(&store, Organization::Bank, TxId::new());
        let page = txn
            .scan_shared(&CompositeKey::namespace(DocType::Realty), &PageRequest::first(2))
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(page.is_last());
    }

    #[test]
    fn insert_beyond_scanned_page_does_not_conflict() {
        let store = InMemoryLedgerStore::new();
        commit_shared(&store, &[("A", 1), ("B", 2), ("C", 3)]);

        let mut txn = StoreTransaction::begin(&store, Organization::Government, TxId::new());
        let page = txn
            .scan_shared(&CompositeKey::namespace(DocType::Realty), &PageRequest::first(1))
            .unwrap();
        assert_eq!(page.records.len(), 1);
        txn.put_shared_json(&CompositeKey::realty("Z0").unwrap(), &0u32)
            .unwrap();
        let ws = txn.into_write_set("t");

        // Lands after the validated window (which ended at "A").
        commit_shared(&store, &[("D", 4)]);
        store.commit(&ws).unwrap();
    }

    #[test]
    fn corrupt_document_is_serialization_error() {
        let store = InMemoryLedgerStore::new();
        let mut txn = StoreTransaction::begin(&store, Organization::Government, TxId::new());
        let key = CompositeKey::realty("C1").unwrap();
        txn.put_shared(&key, b"{not json".to_vec());
        assert!(matches!(
            txn.get_shared_json::<u32>(&key),
            Err(StoreError::Serialization(_))
        ));
    }
}
