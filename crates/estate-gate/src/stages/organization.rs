use crate::error::GateError;
use crate::stage::{AccessRequest, GateContext, GateStage, StageDecision};

/// Built-in allow-list stage.
///
/// Checks the caller's organization against the operation's default
/// allow-list from the operation catalogue.
pub struct OrganizationStage;

impl GateStage for OrganizationStage {
    fn name(&self) -> &str {
        "organization"
    }

    fn evaluate(
        &self,
        request: &AccessRequest,
        _context: &GateContext,
    ) -> Result<StageDecision, GateError> {
        let organization = request
            .caller
            .organization()
            .map_err(|e| GateError::stage(self.name(), e.to_string()))?;

        if request.operation.allows(organization) {
            Ok(StageDecision::Pass)
        } else {
            Ok(StageDecision::fail(format!(
                "{organization} may not invoke {}",
                request.operation
            )))
        }
    }
}
