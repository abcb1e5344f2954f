/// Failure of the gate itself, as opposed to a rejected caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// A stage could not reach a decision.
    #[error("gate stage '{stage}' failed: {message}")]
    StageError { stage: String, message: String },

    /// The configuration could not be digested into a policy hash.
    #[error("gate configuration error: {0}")]
    Config(String),
}

impl GateError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageError {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
