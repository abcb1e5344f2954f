use estate_types::{Collection, Organization, TypeError};

/// Errors from ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A key read during endorsement changed before commit.
    #[error("read conflict on {key}: read version {expected:?}, committed version {found:?}")]
    ReadConflict {
        key: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// A range scanned during endorsement returns different keys at commit.
    #[error("phantom read in range {range}")]
    PhantomRead { range: String },

    /// The calling organization is not a member of the private partition.
    #[error("{organization} is not a member of {collection}")]
    PartitionAccessDenied {
        collection: Collection,
        organization: Organization,
    },

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A key or bookmark is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    /// The bookmark is not one this store issued.
    #[error("invalid bookmark: {0}")]
    InvalidBookmark(String),

    /// The commit journal hash chain is broken.
    #[error("journal integrity violation at seq {seq}: {reason}")]
    JournalIntegrity { seq: u64, reason: String },

    /// I/O error while persisting or loading a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Returns `true` for errors caused by a concurrent commit. The caller
    /// may re-run the invocation against fresh state.
    pub fn is_mvcc_conflict(&self) -> bool {
        matches!(self, Self::ReadConflict { .. } | Self::PhantomRead { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
