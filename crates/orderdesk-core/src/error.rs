//! # Error Types
//!
//! Domain-specific error types for orderdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  orderdesk-core errors (this file)                                     │
//! │  └── ValidationError  - Entity field rule violations                   │
//! │                                                                         │
//! │  orderdesk-db errors (separate crate)                                  │
//! │  └── DbError          - Session, repository and store failures         │
//! │                                                                         │
//! │  Flow: ValidationError → DbError::Validation → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Absence of an entity is never an error in this workspace; lookups return
//! `Option` instead.

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by [`crate::Entity::validate`] before a change is staged, and by
/// report queries that take caller-supplied ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., an email without `@`).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A lower/upper bound pair that cannot describe a range.
    ///
    /// ## When This Occurs
    /// - Negative price bound
    /// - Lower bound greater than upper bound
    #[error("Invalid {field} range: {min} to {max}")]
    InvalidRange {
        field: String,
        min: String,
        max: String,
    },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        };
        assert_eq!(err.to_string(), "name must be at most 200 characters");
    }

    #[test]
    fn test_invalid_range_message() {
        let err = ValidationError::InvalidRange {
            field: "price".to_string(),
            min: "50.00".to_string(),
            max: "10.00".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid price range: 50.00 to 10.00");
    }
}
