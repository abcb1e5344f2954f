//! Contract layer of the Estate Registry Ledger.
//!
//! A permissioned real-estate registry: organizations register users and
//! properties, negotiate sale transactions, settle them through escrow
//! payments, attach contracts and leave an audit trail. Every operation runs
//! as one invocation against an [`InvocationContext`] and commits atomically
//! or not at all.
//!
//! # Services
//!
//! - [`UserRegistry`]: participants, contact data and balances
//! - [`RealtyRegistry`]: certificates, status and private ownership
//! - [`TransactionEngine`]: forward-only sale lifecycle, cascading into realty
//! - [`PaymentLedger`]: transfers and escrow settlement with refunds
//! - [`ContractRegistry`]: contract documents and their status
//! - [`MortgageBook`]: bank loans that hold a realty as MORTGAGED
//! - [`TaxOffice`]: transfer taxes assessed on sales and paid by the buyer
//! - [`AuditTrail`]: audit findings, status cascades and provenance queries
//!
//! [`EstateLedger`] wires them together behind the authorization gate.
//!
//! # Quick Start
//!
//! ```rust
//! use estate_core::{EstateLedger, Invocation, LedgerConfig};
//! use estate_gate::CallerIdentity;
//! use estate_store::InMemoryLedgerStore;
//!
//! let ledger = EstateLedger::new(InMemoryLedgerStore::new(), LedgerConfig::default()).unwrap();
//! let gov = CallerIdentity::new("GovernmentMSP", Some("registrar".into()));
//! let outcome = ledger
//!     .invoke_named(
//!         &gov,
//!         &Invocation::new(
//!             "CreateRealty",
//!             ["C1", "CERT-1", "HOUSE", "NORMAL", "H1", "InvestorMSP", "[]"],
//!         ),
//!     )
//!     .unwrap();
//! assert_eq!(outcome.result["status"], "NORMAL");
//! assert_eq!(outcome.receipt.unwrap().seq, 1);
//! ```

pub mod audit;
pub mod config;
pub mod context;
pub mod contracts;
pub mod error;
pub mod ledger;
pub mod mortgages;
pub mod payments;
pub mod provenance;
pub mod realty;
pub mod request;
pub mod taxes;
pub mod transactions;
pub mod users;

#[cfg(test)]
mod testkit;

// Re-exports for convenience.
pub use audit::{AddAuditLog, AuditRecord, AuditSummary, AuditTrail, AuditTransaction};
pub use config::{BootstrapUser, ConfigError, LedgerConfig};
pub use context::InvocationContext;
pub use contracts::{ContractRecord, ContractRegistry, CreateContract, UpdateContract};
pub use error::{ContractError, ContractResult};
pub use ledger::{Endorsement, EstateLedger, InvocationOutcome};
pub use mortgages::{CreateMortgage, Mortgage, MortgageBook};
pub use payments::{CreatePayment, PayForTransaction, Payment, PaymentLedger, Settlement};
pub use provenance::ProvenanceRecord;
pub use realty::{
    CreateRealty, Realty, RealtyOwnership, RealtyRegistry, RealtyService, RealtyView,
    UpdateRealty,
};
pub use request::{Invocation, Request};
pub use taxes::{CreateTax, Tax, TaxOffice};
pub use transactions::{
    CreateTransaction, TransactionEngine, TransactionRecord, TransactionService,
    TransactionTerms, TransactionView,
};
pub use users::{AccountRef, BalanceView, RegisterUser, UpdateUser, User, UserRegistry, UserView};
