use std::time::{Duration, Instant};

use estate_types::IdentityHasher;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision, StageResult};
use crate::stages::{IdentityStage, OrganizationStage, PolicyStage};

// ---------------------------------------------------------------------------
// Decision / GateResult
// ---------------------------------------------------------------------------

/// Final gate verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accepted,
    Rejected { reason: String },
}

/// The outcome of running a request through the full gate pipeline.
#[derive(Clone, Debug)]
pub struct GateResult {
    pub decision: Decision,
    /// BLAKE3 hash of the policy configuration that was active.
    pub policy_hash: [u8; 32],
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
    pub elapsed: Duration,
}

impl GateResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self.decision, Decision::Accepted)
    }

    /// Rejection reason, if rejected.
    pub fn reason(&self) -> Option<String> {
        match &self.decision {
            Decision::Accepted => None,
            Decision::Rejected { reason } => Some(reason.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthorizationGate
// ---------------------------------------------------------------------------

/// The authorization gate: a configurable pipeline of stages every
/// invocation passes through before it may read or write state.
pub struct AuthorizationGate {
    stages: Vec<Box<dyn GateStage>>,
    config: GateConfig,
    policy_hash: [u8; 32],
}

impl AuthorizationGate {
    /// Create a gate with an empty pipeline.
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        let policy_hash = policy_digest(&config)?;
        Ok(Self {
            stages: Vec::new(),
            config,
            policy_hash,
        })
    }

    /// Create a gate with the default pipeline:
    /// Identity -> Organization -> Policy
    pub fn with_default_stages(config: GateConfig) -> Result<Self, GateError> {
        let mut gate = Self::new(config)?;
        gate.add_stage(Box::new(IdentityStage));
        gate.add_stage(Box::new(OrganizationStage));
        gate.add_stage(Box::new(PolicyStage));
        Ok(gate)
    }

    pub fn add_stage(&mut self, stage: Box<dyn GateStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Evaluate a request through the pipeline.
    ///
    /// The pipeline is fail-fast: the first failing stage stops evaluation
    /// and produces a `Rejected` decision.
    pub fn evaluate(&self, request: &AccessRequest) -> Result<GateResult, GateError> {
        let pipeline_start = Instant::now();
        let mut context = GateContext {
            policies: self.config.policies.clone(),
            require_principal: self.config.require_principal,
            previous_stages: Vec::new(),
        };
        let mut stage_results = Vec::with_capacity(self.stages.len());

        let active = self
            .stages
            .iter()
            .filter(|s| !self.config.permissive || s.enforced_when_permissive());

        for stage in active {
            let stage_start = Instant::now();
            let decision = stage.evaluate(request, &context)?;
            let reason = match &decision {
                StageDecision::Pass => None,
                StageDecision::Fail { reason } => Some(reason.clone()),
            };

            let result = StageResult {
                stage_name: stage.name().to_string(),
                passed: decision.is_pass(),
                reason,
                elapsed: stage_start.elapsed(),
            };
            stage_results.push(result.clone());
            context.previous_stages.push(result);

            if let StageDecision::Fail { reason } = decision {
                tracing::warn!(
                    operation = %request.operation,
                    msp_id = %request.caller.msp_id,
                    stage = stage.name(),
                    %reason,
                    "invocation rejected by gate"
                );
                return Ok(GateResult {
                    decision: Decision::Rejected { reason },
                    policy_hash: self.policy_hash,
                    stage_results,
                    elapsed: pipeline_start.elapsed(),
                });
            }
        }

        Ok(GateResult {
            decision: Decision::Accepted,
            policy_hash: self.policy_hash,
            stage_results,
            elapsed: pipeline_start.elapsed(),
        })
    }
}

/// Digest of a gate configuration, reported with every decision.
fn policy_digest<T: Serialize>(config: &T) -> Result<[u8; 32], GateError> {
    IdentityHasher::new("estate-gate-policy-v1")
        .hash_json(config)
        .map_err(|e| GateError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::stage::CallerIdentity;

    struct AlwaysFail;

    impl GateStage for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }

        fn evaluate(
            &self,
            _request: &AccessRequest,
            _context: &GateContext,
        ) -> Result<StageDecision, GateError> {
            Ok(StageDecision::fail("nope"))
        }
    }

    struct Broken;

    impl GateStage for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn evaluate(
            &self,
            _request: &AccessRequest,
            _context: &GateContext,
        ) -> Result<StageDecision, GateError> {
            Err(GateError::stage("broken", "backend unavailable"))
        }
    }

    fn request() -> AccessRequest {
        AccessRequest::new(Operation::QueryRealty, CallerIdentity::new("BankMSP", None))
    }

    #[test]
    fn empty_pipeline_accepts() {
        let gate = AuthorizationGate::new(GateConfig::default()).unwrap();
        assert_eq!(gate.stage_count(), 0);
        assert!(gate.evaluate(&request()).unwrap().is_accepted());
    }

    #[test]
    fn custom_stage_rejects() {
        let mut gate = AuthorizationGate::with_default_stages(GateConfig::default()).unwrap();
        gate.add_stage(Box::new(AlwaysFail));
        let result = gate.evaluate(&request()).unwrap();
        assert_eq!(result.reason().as_deref(), Some("nope"));
        assert_eq!(result.stage_results.len(), 4);
    }

    #[test]
    fn custom_stage_skipped_when_permissive() {
        let mut gate = AuthorizationGate::new(GateConfig::permissive()).unwrap();
        gate.add_stage(Box::new(AlwaysFail));
        assert!(gate.evaluate(&request()).unwrap().is_accepted());
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[test]
    fn unhashable_configuration_is_an_error() {
        let err = policy_digest(&Unserializable).unwrap_err();
        assert!(matches!(err, GateError::Config(ref m) if m.contains("not representable")));
        let hash = policy_digest(&GateConfig::default()).unwrap();
        assert_ne!(hash, [0u8; 32]);
    }

    #[test]
    fn stage_errors_propagate() {
        let mut gate = AuthorizationGate::new(GateConfig::default()).unwrap();
        gate.add_stage(Box::new(Broken));
        let err = gate.evaluate(&request()).unwrap_err();
        assert_eq!(err, GateError::stage("broken", "backend unavailable"));
    }
}
