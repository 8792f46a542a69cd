use crate::models::MemberId;
use std::fmt;

/// Which half of a reconciliation pass a failed row belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOp {
    Add,
    Remove,
}

impl fmt::Display for BatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOp::Add => write!(f, "+"),
            BatchOp::Remove => write!(f, "-"),
        }
    }
}

/// A single attendee row that could not be written
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BatchFailure {
    pub op: BatchOp,
    pub member_id: MemberId,
    pub message: String,
}

/// Custom error type for club operations
#[derive(Debug, thiserror::Error)]
pub enum ClubError {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{operation} failed: {message}")]
    Remote { operation: String, message: String },

    #[error("{failed} of {attempted} attendee changes failed")]
    PartialBatch {
        failed: usize,
        attempted: usize,
        failures: Vec<BatchFailure>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClubError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClubError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        ClubError::Remote {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

pub type ClubResult<T> = Result<T, ClubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClubError::validation("date", "Date is required");
        assert_eq!(err.to_string(), "Invalid date: Date is required");

        let err = ClubError::remote("Create meetup", "HTTP error! status: 500");
        assert_eq!(err.to_string(), "Create meetup failed: HTTP error! status: 500");

        let err = ClubError::PartialBatch {
            failed: 1,
            attempted: 3,
            failures: vec![],
        };
        assert_eq!(err.to_string(), "1 of 3 attendee changes failed");
    }
}
