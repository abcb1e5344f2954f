//! Foundation types for the Estate Registry Ledger.
//!
//! This crate provides the identity, status, keying and monetary types shared
//! by every other estate crate. Nothing here touches storage or performs
//! authorization; it only defines the vocabulary.
//!
//! # Key Types
//!
//! - [`Organization`]: MSP identifier of a participating organization
//! - [`CompositeKey`]: typed `(DocType, [attributes])` storage key builder
//! - [`Collection`]: named private partition and its default membership
//! - [`Amount`]: non-negative monetary value in minor units
//! - [`TransactionStatus`]: sale lifecycle with forward-only transitions
//! - [`TxId`]: UUID v7 identifier of a single ledger invocation
//! - [`IdentityHasher`]: domain-separated BLAKE3 digests

#[macro_use]
mod macros;

pub mod amount;
pub mod digest;
pub mod error;
pub mod key;
pub mod org;
pub mod status;
pub mod temporal;
pub mod txid;

pub use amount::Amount;
pub use digest::{digest_from_hex, IdentityHasher};
pub use error::TypeError;
pub use key::{Collection, CompositeKey, DocType};
pub use org::{Organization, Role};
pub use status::{
    ContractStatus, MortgageStatus, PaymentType, RealtyStatus, RealtyType, TaxStatus,
    TransactionStatus, UserStatus,
};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
pub use txid::TxId;
