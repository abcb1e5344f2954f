//! Partitioned ledger state for the Estate Registry Ledger.
//!
//! The hosting platform supplies a key-value store with two visibility tiers:
//! a *shared* partition every organization reads, and named *private
//! partitions* ([`Collection`](estate_types::Collection)) replicated only to
//! member organizations. This crate defines that boundary as the
//! [`LedgerStore`] trait and ships an in-memory implementation.
//!
//! # Invocation model
//!
//! Contract code never writes to the store directly. It works through a
//! [`StoreTransaction`], which:
//!
//! - records the committed version of every key it reads (the read set),
//! - records the keys observed by every range scan,
//! - buffers writes (the write set) and serves them back to later reads.
//!
//! [`LedgerStore::commit`] re-validates the read set against current state and
//! applies the whole write set under one new height, or rejects it with
//! [`StoreError::ReadConflict`]. Nothing is ever partially applied.
//!
//! # Design Rules
//!
//! 1. Private partitions are only reachable through collection-scoped methods
//!    that check membership of the calling organization.
//! 2. Every committed write set is appended to a hash-chained journal.
//! 3. Range scans paginate with opaque bookmarks, never numeric offsets.
//! 4. Lock poisoning and codec failures are errors, never panics.

pub mod error;
pub mod journal;
pub mod memory;
pub mod page;
pub mod partition;
pub mod traits;
pub mod transaction;
pub mod write_set;

pub use error::{StoreError, StoreResult};
pub use journal::{verify_journal, CommitReceipt};
pub use memory::{InMemoryLedgerStore, StoreSnapshot};
pub use page::{Bookmark, Page, PageRequest};
pub use partition::{CollectionMembers, CollectionPolicy, Partition, StateKey, VersionedValue};
pub use traits::LedgerStore;
pub use transaction::{decode_json, encode_json, StoreTransaction};
pub use write_set::{RangeRead, ReadEntry, WriteEntry, WriteSet};
