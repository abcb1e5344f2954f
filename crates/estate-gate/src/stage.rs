use std::time::Duration;

use estate_types::{Organization, TypeError};
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::operation::Operation;
use crate::stages::policy::Policy;

// ---------------------------------------------------------------------------
// CallerIdentity
// ---------------------------------------------------------------------------

/// Identity of the invoking client as asserted by the hosting platform.
///
/// The MSP id is kept as the raw string the platform supplied; the identity
/// stage decides whether it names a known organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub msp_id: String,
    /// Client principal (certificate subject or user name), if known.
    pub principal: Option<String>,
}

impl CallerIdentity {
    pub fn new(msp_id: impl Into<String>, principal: Option<String>) -> Self {
        Self {
            msp_id: msp_id.into(),
            principal,
        }
    }

    /// Identity of a known organization with no principal.
    pub fn of(organization: Organization) -> Self {
        Self::new(organization.as_str(), None)
    }

    pub fn organization(&self) -> Result<Organization, TypeError> {
        self.msp_id.parse()
    }

    /// Principal for provenance records, falling back to the MSP id.
    pub fn client_id(&self) -> String {
        match &self.principal {
            Some(p) if !p.trim().is_empty() => format!("{}::{}", self.msp_id, p),
            _ => self.msp_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessRequest
// ---------------------------------------------------------------------------

/// A single authorization question: may this caller run this operation?
#[derive(Clone, Debug)]
pub struct AccessRequest {
    pub operation: Operation,
    pub caller: CallerIdentity,
}

impl AccessRequest {
    pub fn new(operation: Operation, caller: CallerIdentity) -> Self {
        Self { operation, caller }
    }
}

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single gate stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// The stage passed; proceed to the next stage.
    Pass,
    /// The stage failed; the request is rejected.
    Fail { reason: String },
}

impl StageDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    pub(crate) fn fail(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage evaluation.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    /// Populated on failure.
    pub reason: Option<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// GateContext
// ---------------------------------------------------------------------------

/// Contextual information available to every gate stage.
pub struct GateContext {
    /// Configured policies in evaluation order.
    pub policies: Vec<Policy>,
    /// Whether callers must present a principal.
    pub require_principal: bool,
    /// Results from stages that have already run in this evaluation.
    pub previous_stages: Vec<StageResult>,
}

impl GateContext {
    pub fn minimal() -> Self {
        Self {
            policies: Vec::new(),
            require_principal: false,
            previous_stages: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateStage trait
// ---------------------------------------------------------------------------

/// A single evaluation stage in the gate pipeline.
///
/// The trait is object-safe and `Send + Sync` so stages can be stored in a
/// `Vec<Box<dyn GateStage>>`.
pub trait GateStage: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        request: &AccessRequest,
        context: &GateContext,
    ) -> Result<StageDecision, GateError>;

    /// Whether the stage still runs when the gate is in permissive mode.
    fn enforced_when_permissive(&self) -> bool {
        false
    }
}
