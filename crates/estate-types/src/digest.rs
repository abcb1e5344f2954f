use serde::Serialize;

use crate::error::TypeError;

/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag prepended to every computation, so an
/// identity digest and a journal digest over identical bytes never collide.
pub struct IdentityHasher {
    domain: &'static str,
}

impl IdentityHasher {
    /// Citizen identity numbers stored on the shared partition.
    pub const CITIZEN: Self = Self {
        domain: "estate-citizen-v1",
    };
    /// Realty certificate numbers.
    pub const REALTY_CERT: Self = Self {
        domain: "estate-realty-cert-v1",
    };
    /// Committed write sets.
    pub const WRITE_SET: Self = Self {
        domain: "estate-write-set-v1",
    };
    /// Commit journal receipts.
    pub const JOURNAL: Self = Self {
        domain: "estate-journal-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Hex digest of a clear-text identifier, as stored in `...Hash` fields.
    pub fn hash_hex(&self, value: &str) -> String {
        hex::encode(self.hash(value.as_bytes()))
    }

    /// Hash a serializable value as JSON.
    pub fn hash_json<T: Serialize>(&self, value: &T) -> Result<[u8; 32], TypeError> {
        let data =
            serde_json::to_vec(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Parse a 32-byte hex digest.
pub fn digest_from_hex(s: &str) -> Result<[u8; 32], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| TypeError::InvalidHex(format!("expected 32 bytes in '{s}'")))
}
