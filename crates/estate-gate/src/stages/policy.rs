use estate_types::Organization;
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::operation::{Module, Operation};
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision};

// ---------------------------------------------------------------------------
// Policy types
// ---------------------------------------------------------------------------

/// A named policy containing one or more rules.
///
/// Policies can only narrow access: they run after the built-in allow-lists,
/// so no rule can grant an organization an operation its allow-list denies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub rules: Vec<PolicyRule>,
    pub applies_to: PolicyScope,
}

impl Policy {
    /// A policy that rejects every state-changing operation.
    pub fn read_only() -> Self {
        Self {
            id: "read-only".into(),
            name: "Read-only ledger".into(),
            rules: vec![PolicyRule::DenyWrites],
            applies_to: PolicyScope::All,
        }
    }

    /// Check whether this policy applies to the given request.
    pub fn applies(&self, request: &AccessRequest) -> bool {
        match &self.applies_to {
            PolicyScope::All => true,
            PolicyScope::Module(module) => request.operation.module() == *module,
            PolicyScope::Operation(op) => request.operation == *op,
            PolicyScope::Organization(org) => request.caller.organization().ok() == Some(*org),
        }
    }
}

/// Individual rule within a policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PolicyRule {
    /// These organizations are rejected.
    DenyOrganizations(Vec<Organization>),
    /// Only these organizations pass.
    AllowOnlyOrganizations(Vec<Organization>),
    /// The caller must present a principal.
    RequirePrincipal,
    /// Only query operations pass.
    DenyWrites,
    /// These operations are rejected outright.
    DenyOperations(Vec<Operation>),
}

/// Scope controlling when a policy is evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PolicyScope {
    All,
    Module(Module),
    Operation(Operation),
    /// Applies to requests from one organization.
    Organization(Organization),
}

// ---------------------------------------------------------------------------
// PolicyStage
// ---------------------------------------------------------------------------

/// Policy enforcement stage.
///
/// Evaluates every applicable policy against the request. All rules in all
/// applicable policies must pass for the stage to pass.
pub struct PolicyStage;

impl PolicyStage {
    fn evaluate_rule(rule: &PolicyRule, request: &AccessRequest) -> StageDecision {
        let organization = request.caller.organization().ok();
        match rule {
            PolicyRule::DenyOrganizations(denied) => match organization {
                Some(org) if denied.contains(&org) => StageDecision::fail(format!(
                    "{org} is denied {} by policy",
                    request.operation
                )),
                _ => StageDecision::Pass,
            },

            PolicyRule::AllowOnlyOrganizations(allowed) => match organization {
                Some(org) if allowed.contains(&org) => StageDecision::Pass,
                _ => StageDecision::fail(format!(
                    "{} is restricted by policy to {}",
                    request.operation,
                    allowed
                        .iter()
                        .map(Organization::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            },

            PolicyRule::RequirePrincipal => {
                if request.caller.principal.is_some() {
                    StageDecision::Pass
                } else {
                    StageDecision::fail("policy requires a caller principal")
                }
            }

            PolicyRule::DenyWrites => {
                if request.operation.is_query() {
                    StageDecision::Pass
                } else {
                    StageDecision::fail(format!(
                        "{} changes state but the ledger is read-only",
                        request.operation
                    ))
                }
            }

            PolicyRule::DenyOperations(ops) => {
                if ops.contains(&request.operation) {
                    StageDecision::fail(format!("{} is disabled by policy", request.operation))
                } else {
                    StageDecision::Pass
                }
            }
        }
    }
}

impl GateStage for PolicyStage {
    fn name(&self) -> &str {
        "policy"
    }

    fn evaluate(
        &self,
        request: &AccessRequest,
        context: &GateContext,
    ) -> Result<StageDecision, GateError> {
        for policy in context.policies.iter().filter(|p| p.applies(request)) {
            for rule in &policy.rules {
                let decision = Self::evaluate_rule(rule, request);
                if decision.is_fail() {
                    tracing::debug!(policy = %policy.id, operation = %request.operation, "policy rule failed");
                    return Ok(decision);
                }
            }
        }
        Ok(StageDecision::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::CallerIdentity;

    fn ctx(policies: Vec<Policy>) -> GateContext {
        GateContext {
            policies,
            ..GateContext::minimal()
        }
    }

    fn req(op: Operation, org: Organization) -> AccessRequest {
        AccessRequest::new(op, CallerIdentity::of(org))
    }

    #[test]
    fn read_only_policy_blocks_writes() {
        let c = ctx(vec![Policy::read_only()]);
        let write = PolicyStage
            .evaluate(&req(Operation::CreateRealty, Organization::Government), &c)
            .unwrap();
        assert!(write.is_fail());
        let read = PolicyStage
            .evaluate(&req(Operation::QueryRealty, Organization::Government), &c)
            .unwrap();
        assert!(read.is_pass());
    }

    #[test]
    fn organization_scope() {
        let policy = Policy {
            id: "tp".into(),
            name: "third parties need a principal".into(),
            rules: vec![PolicyRule::RequirePrincipal],
            applies_to: PolicyScope::Organization(Organization::ThirdParty),
        };
        let c = ctx(vec![policy]);
        assert!(PolicyStage
            .evaluate(&req(Operation::QueryRealty, Organization::ThirdParty), &c)
            .unwrap()
            .is_fail());
        assert!(PolicyStage
            .evaluate(&req(Operation::QueryRealty, Organization::Bank), &c)
            .unwrap()
            .is_pass());
    }

    #[test]
    fn deny_operations_rule() {
        let policy = Policy {
            id: "no-unfreeze".into(),
            name: "unfreeze disabled".into(),
            rules: vec![PolicyRule::DenyOperations(vec![Operation::UnfreezeRealty])],
            applies_to: PolicyScope::Operation(Operation::UnfreezeRealty),
        };
        let c = ctx(vec![policy]);
        let d = PolicyStage
            .evaluate(&req(Operation::UnfreezeRealty, Organization::Government), &c)
            .unwrap();
        assert_eq!(
            d,
            StageDecision::Fail {
                reason: "UnfreezeRealty is disabled by policy".into()
            }
        );
    }
}
