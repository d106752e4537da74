//! Domain error types.

use order_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure codes reported per command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Authorization attempted on an order without services.
    NoServices,
    /// Operation not permitted in the order's current status.
    SequenceError,
    /// Services modified after authorization, or any operation on a delivered order.
    NotAllowedAfterAuthorization,
    /// Real cost went over the overrun limit; the order awaits a new authorization.
    RequiresReauth,
    /// Referenced order does not exist.
    OrderNotFound,
    /// Malformed payload, invalid amount, or unknown service/component.
    ValidationError,
    /// Unrecognized operation tag.
    UnsupportedOperation,
    /// Operation on a cancelled order.
    OrderCancelled,
    /// CREATE_ORDER with an id that is already taken.
    OrderAlreadyExists,
}

impl ErrorCode {
    /// Returns the code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoServices => "NO_SERVICES",
            ErrorCode::SequenceError => "SEQUENCE_ERROR",
            ErrorCode::NotAllowedAfterAuthorization => "NOT_ALLOWED_AFTER_AUTHORIZATION",
            ErrorCode::RequiresReauth => "REQUIRES_REAUTH",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::OrderCancelled => "ORDER_CANCELLED",
            ErrorCode::OrderAlreadyExists => "ORDER_ALREADY_EXISTS",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a whole command batch.
///
/// Rule violations never end up here; they are reported per command.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the snapshot store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_wire_format() {
        let codes = [
            ErrorCode::NoServices,
            ErrorCode::SequenceError,
            ErrorCode::NotAllowedAfterAuthorization,
            ErrorCode::RequiresReauth,
            ErrorCode::OrderNotFound,
            ErrorCode::ValidationError,
            ErrorCode::UnsupportedOperation,
            ErrorCode::OrderCancelled,
            ErrorCode::OrderAlreadyExists,
        ];

        for code in codes {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }
}
