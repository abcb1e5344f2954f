use estate_types::{IdentityHasher, Organization, TxId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::partition::{Partition, StateKey};

/// A key read during endorsement and the version it had (`None` = absent).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEntry {
    pub key: StateKey,
    pub version: Option<u64>,
}

/// A buffered write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEntry {
    pub key: StateKey,
    pub value: Vec<u8>,
}

/// A range scan performed during endorsement.
///
/// At commit the same range is scanned again and must yield exactly the
/// `observed` keys at the same versions. `end_inclusive` bounds the check to
/// what was actually paged through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRead {
    pub partition: Partition,
    pub prefix: String,
    pub start_after: Option<String>,
    pub end_inclusive: Option<String>,
    pub observed: Vec<(String, u64)>,
}

impl RangeRead {
    /// Whether `key` falls inside the validated window of this range.
    pub fn covers(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
            && self.start_after.as_deref().map_or(true, |s| key > s)
            && self.end_inclusive.as_deref().map_or(true, |e| key <= e)
    }

    pub(crate) fn describe(&self) -> String {
        format!(
            "{}:{}",
            self.partition,
            self.prefix.trim_matches('\u{0}').replace('\u{0}', "/")
        )
    }
}

/// Everything an invocation read and wants to write, submitted for commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSet {
    pub tx_id: TxId,
    pub function: String,
    pub organization: Organization,
    pub reads: Vec<ReadEntry>,
    pub ranges: Vec<RangeRead>,
    pub writes: Vec<WriteEntry>,
}

impl WriteSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Digest over the ordered writes, recorded in the commit journal.
    pub fn digest(&self) -> StoreResult<[u8; 32]> {
        IdentityHasher::WRITE_SET
            .hash_json(&self.writes)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start_after: Option<&str>, end: Option<&str>) -> RangeRead {
        RangeRead {
            partition: Partition::Shared,
            prefix: "\u{0}RE\u{0}".into(),
            start_after: start_after.map(Into::into),
            end_inclusive: end.map(Into::into),
            observed: Vec::new(),
        }
    }

    #[test]
    fn range_cover_bounds() {
        let r = range(Some("\u{0}RE\u{0}B\u{0}"), Some("\u{0}RE\u{0}D\u{0}"));
        assert!(!r.covers("\u{0}RE\u{0}A\u{0}"));
        assert!(!r.covers("\u{0}RE\u{0}B\u{0}"));
        assert!(r.covers("\u{0}RE\u{0}C\u{0}"));
        assert!(r.covers("\u{0}RE\u{0}D\u{0}"));
        assert!(!r.covers("\u{0}RE\u{0}E\u{0}"));
        assert!(!r.covers("\u{0}TX\u{0}C\u{0}"));
    }

    #[test]
    fn unbounded_range_covers_prefix() {
        let r = range(None, None);
        assert!(r.covers("\u{0}RE\u{0}ZZZ\u{0}"));
    }

    #[test]
    fn digest_depends_on_writes() {
        let mut ws = WriteSet {
            tx_id: TxId::new(),
            function: "CreateRealty".into(),
            organization: Organization::Government,
            reads: Vec::new(),
            ranges: Vec::new(),
            writes: vec![WriteEntry {
                key: StateKey::new(Partition::Shared, "k"),
                value: b"v1".to_vec(),
            }],
        };
        let a = ws.digest().unwrap();
        ws.writes[0].value = b"v2".to_vec();
        assert_ne!(a, ws.digest().unwrap());
        assert!(!ws.is_read_only());
    }
}
