//! Authorization gate for the Estate Registry Ledger.
//!
//! Every invocation passes through the gate before it touches state. The
//! gate runs a pipeline of stages (identity, organization allow-list,
//! configured policies) against the caller identity supplied by the
//! platform, and produces an accept/reject decision with a per-stage trail.
//!
//! # Quick Start
//!
//! ```rust
//! use estate_gate::{AccessRequest, AuthorizationGate, CallerIdentity, GateConfig, Operation};
//!
//! let gate = AuthorizationGate::with_default_stages(GateConfig::default()).unwrap();
//! let caller = CallerIdentity::new("GovernmentMSP", None);
//! let result = gate.evaluate(&AccessRequest::new(Operation::CreateRealty, caller)).unwrap();
//! assert!(result.is_accepted());
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod operation;
pub mod stage;
pub mod stages;

// Re-exports for convenience.
pub use config::GateConfig;
pub use error::GateError;
pub use gate::{AuthorizationGate, Decision, GateResult};
pub use operation::{Module, Operation};
pub use stage::{AccessRequest, CallerIdentity, GateContext, GateStage, StageDecision, StageResult};
pub use stages::identity::IdentityStage;
pub use stages::organization::OrganizationStage;
pub use stages::policy::{Policy, PolicyRule, PolicyScope, PolicyStage};
