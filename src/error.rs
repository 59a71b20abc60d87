use thiserror::Error;

use crate::client::ClientError;
use crate::content_type::ContentType;
use crate::resolver::ReferenceKind;
use crate::validation::ValidationReport;

/// Errors raised while transforming a single content item
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{kind} reference {id} not found in source organization")]
    MissingReference { kind: ReferenceKind, id: String },

    #[error("{content_type} {id} already exists in target organization with a different origin ({owner})")]
    ConflictingIdentifier {
        content_type: ContentType,
        id: String,
        owner: String,
    },

    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("transformed document failed validation with {} error(s)", .0.error_count())]
    ValidationFailed(ValidationReport),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransferError {
    /// Errors a bulk run records against the item and then moves past.
    pub fn is_item_recoverable(&self) -> bool {
        !matches!(self, TransferError::UnsupportedType(_))
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reference_message() {
        let err = TransferError::MissingReference {
            kind: ReferenceKind::Distributor,
            id: "D1".to_string(),
        };
        assert_eq!(err.to_string(), "distributor reference D1 not found in source organization");
    }

    #[test]
    fn test_unsupported_type_is_fatal() {
        assert!(!TransferError::UnsupportedType("podcast".to_string()).is_item_recoverable());
        assert!(TransferError::InvalidDocument("no _id".to_string()).is_item_recoverable());
    }
}
