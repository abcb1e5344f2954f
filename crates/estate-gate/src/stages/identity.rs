use crate::error::GateError;
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision};

/// Caller identity validation.
///
/// The MSP id must name a known organization, and a principal must be
/// present when the gate is configured to require one.
pub struct IdentityStage;

impl GateStage for IdentityStage {
    fn name(&self) -> &str {
        "identity"
    }

    fn evaluate(
        &self,
        request: &AccessRequest,
        context: &GateContext,
    ) -> Result<StageDecision, GateError> {
        let caller = &request.caller;
        if caller.msp_id.trim().is_empty() {
            return Ok(StageDecision::fail("caller MSP id is empty"));
        }
        if caller.organization().is_err() {
            return Ok(StageDecision::fail(format!(
                "unknown organization '{}'",
                caller.msp_id
            )));
        }
        if context.require_principal
            && caller
                .principal
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Ok(StageDecision::fail("caller principal is required"));
        }
        Ok(StageDecision::Pass)
    }

    fn enforced_when_permissive(&self) -> bool {
        true
    }
}
