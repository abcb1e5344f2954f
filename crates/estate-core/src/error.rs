use estate_gate::GateError;
use estate_store::StoreError;
use estate_types::TypeError;

/// Errors returned by contract operations.
///
/// Every error aborts the whole invocation; nothing it buffered is committed.
/// Variants carry the operation and key involved so callers can log them
/// without re-reading state.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Malformed or missing arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller's organization may not perform the operation.
    #[error("{organization} is not authorized to {operation}: {reason}")]
    Authorization {
        operation: String,
        organization: String,
        reason: String,
    },

    /// A referenced record does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The key already exists, or the record is frozen or terminal.
    #[error("{operation} conflict on {key}: {reason}")]
    Conflict {
        operation: String,
        key: String,
        reason: String,
    },

    /// A business rule was violated (insufficient balance, wrong owner, ...).
    #[error("{operation} rejected for {key}: {reason}")]
    Consistency {
        operation: String,
        key: String,
        reason: String,
    },

    /// The gate pipeline itself failed.
    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    /// Storage failure, including optimistic-concurrency rejections.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl ContractError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn conflict(
        operation: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            operation: operation.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn consistency(
        operation: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Consistency {
            operation: operation.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn unauthorized(
        operation: impl Into<String>,
        organization: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Authorization {
            operation: operation.into(),
            organization: organization.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used by the CLI and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Authorization { .. } => "AuthorizationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Conflict { .. } => "ConflictError",
            Self::Consistency { .. } => "ConsistencyError",
            Self::Gate(_) => "GateError",
            Self::Store(e) if e.is_mvcc_conflict() => "MvccConflictError",
            Self::Store(_) => "StoreError",
        }
    }
}

impl From<StoreError> for ContractError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PartitionAccessDenied {
                collection,
                organization,
            } => Self::unauthorized(
                format!("access {collection}"),
                organization.as_str(),
                "not a member of the private collection",
            ),
            StoreError::InvalidBookmark(reason) => {
                Self::Validation(format!("invalid bookmark: {reason}"))
            }
            other => Self::Store(other),
        }
    }
}

impl From<TypeError> for ContractError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;

#[cfg(test)]
mod tests {
    use super::*;
    use estate_types::{Collection, Organization};

    #[test]
    fn partition_denial_becomes_authorization_error() {
        let err: ContractError = StoreError::PartitionAccessDenied {
            collection: Collection::TransactionPrivate,
            organization: Organization::ThirdParty,
        }
        .into();
        assert_eq!(err.kind(), "AuthorizationError");
        assert!(err.to_string().contains("ThirdpartyMSP"));
    }

    #[test]
    fn mvcc_conflicts_have_their_own_kind() {
        let err: ContractError = StoreError::ReadConflict {
            key: "k".into(),
            expected: Some(1),
            found: Some(2),
        }
        .into();
        assert_eq!(err.kind(), "MvccConflictError");
        let err: ContractError = StoreError::LockPoisoned.into();
        assert_eq!(err.kind(), "StoreError");
    }

    #[test]
    fn type_errors_are_validation_errors() {
        let err: ContractError = "BOGUS".parse::<estate_types::RealtyStatus>().unwrap_err().into();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn messages_carry_context() {
        let err = ContractError::conflict("CreateRealty", "C1", "realty already exists");
        assert_eq!(
            err.to_string(),
            "CreateRealty conflict on C1: realty already exists"
        );
    }
}
