use estate_types::{IdentityHasher, Organization, TxId};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Ordered, hash-chained record of one committed write set.
///
/// The journal stands in for the platform's ordering service: `seq` is the
/// commit height, and each receipt hashes over its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub seq: u64,
    pub tx_id: TxId,
    pub function: String,
    pub organization: Organization,
    pub write_count: usize,
    pub write_set_hash: [u8; 32],
    pub prev_hash: Option<[u8; 32]>,
    pub receipt_hash: [u8; 32],
}

/// Fields covered by the receipt hash.
#[derive(Serialize)]
struct ReceiptPayload<'a> {
    seq: u64,
    tx_id: &'a TxId,
    function: &'a str,
    organization: Organization,
    write_count: usize,
    write_set_hash: &'a [u8; 32],
}

impl CommitReceipt {
    /// Build the receipt for `seq`, chaining onto `prev_hash`.
    pub fn seal(
        seq: u64,
        tx_id: TxId,
        function: String,
        organization: Organization,
        write_count: usize,
        write_set_hash: [u8; 32],
        prev_hash: Option<[u8; 32]>,
    ) -> StoreResult<Self> {
        let mut receipt = Self {
            seq,
            tx_id,
            function,
            organization,
            write_count,
            write_set_hash,
            prev_hash,
            receipt_hash: [0u8; 32],
        };
        receipt.receipt_hash = receipt.compute_hash()?;
        Ok(receipt)
    }

    /// Recompute this receipt's hash from its payload and `prev_hash`.
    pub fn compute_hash(&self) -> StoreResult<[u8; 32]> {
        let payload = serde_json::to_vec(&ReceiptPayload {
            seq: self.seq,
            tx_id: &self.tx_id,
            function: &self.function,
            organization: self.organization,
            write_count: self.write_count,
            write_set_hash: &self.write_set_hash,
        })
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut data = Vec::with_capacity(32 + payload.len());
        if let Some(prev) = self.prev_hash {
            data.extend_from_slice(&prev);
        }
        data.extend_from_slice(&payload);
        Ok(IdentityHasher::JOURNAL.hash(&data))
    }

    pub fn short_hash(&self) -> String {
        hex::encode(&self.receipt_hash[..4])
    }
}

/// Verify a journal: sequences start at 1 and increase by one, the genesis
/// receipt has no predecessor, every link matches, and every hash recomputes.
pub fn verify_journal(receipts: &[CommitReceipt]) -> StoreResult<()> {
    for (index, receipt) in receipts.iter().enumerate() {
        let expected_seq = (index + 1) as u64;
        if receipt.seq != expected_seq {
            return Err(StoreError::JournalIntegrity {
                seq: receipt.seq,
                reason: format!("expected seq {expected_seq}"),
            });
        }

        let expected_prev = if index == 0 {
            None
        } else {
            Some(receipts[index - 1].receipt_hash)
        };
        if receipt.prev_hash != expected_prev {
            return Err(StoreError::JournalIntegrity {
                seq: receipt.seq,
                reason: "previous hash link mismatch".into(),
            });
        }

        if receipt.compute_hash()? != receipt.receipt_hash {
            return Err(StoreError::JournalIntegrity {
                seq: receipt.seq,
                reason: "receipt hash mismatch".into(),
            });
        }
    }
    Ok(())
}
