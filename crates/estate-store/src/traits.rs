use crate::error::StoreResult;
use crate::journal::CommitReceipt;
use crate::partition::{CollectionPolicy, Partition, VersionedValue};
use crate::write_set::WriteSet;

/// Partitioned, versioned key-value store supplied by the hosting platform.
///
/// All implementations must satisfy these invariants:
/// - A committed write set is applied entirely or not at all.
/// - Every value written by one commit carries that commit's height as its
///   version, and heights strictly increase.
/// - `commit` rejects a write set whose recorded reads or ranges no longer
///   match committed state.
/// - Reads never observe uncommitted writes of other invocations.
pub trait LedgerStore: Send + Sync {
    /// Read one committed value. Returns `Ok(None)` if absent.
    fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// Committed entries whose key starts with `prefix`, in key order,
    /// starting strictly after `start_after` and returning at most `limit`.
    fn scan(
        &self,
        partition: Partition,
        prefix: &str,
        start_after: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, VersionedValue)>>;

    /// Validate and apply a write set, returning its journal receipt.
    fn commit(&self, write_set: &WriteSet) -> StoreResult<CommitReceipt>;

    /// Height of the last commit (0 before the first).
    fn height(&self) -> StoreResult<u64>;

    /// The full commit journal in order.
    fn journal(&self) -> StoreResult<Vec<CommitReceipt>>;

    /// Membership of private partitions.
    fn collection_policy(&self) -> &CollectionPolicy;
}
