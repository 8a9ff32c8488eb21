//! # Validation Module
//!
//! Field rules for OrderDesk entities.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Repository add/update (Rust)                                 │
//! │  ├── Entity::validate() runs before a change is staged                 │
//! │  └── THIS MODULE: per-field rules                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Session flush                                                │
//! │  ├── Unknown identity on update/remove → whole batch rejected          │
//! │  └── Referential integrity (FK / in-memory check)                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use orderdesk_core::validation::{validate_email, validate_quantity};
//!
//! assert!(validate_email("ana@example.com").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use crate::entity::EntityId;
use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_ITEM_QUANTITY, MAX_NAME_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of an email address (RFC 5321 path limit).
const MAX_EMAIL_LENGTH: usize = 254;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a client or product name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use orderdesk_core::validation::validate_name;
///
/// assert!(validate_name("name", "Laptop").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates a client email.
///
/// Only the shape is checked. Uniqueness is a caller convention.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
        });
    }

    if !email.contains('@') {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must contain '@'".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a product price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## Example
/// ```rust
/// use orderdesk_core::validation::validate_quantity;
///
/// assert!(validate_quantity(999).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a reference to another entity.
///
/// Store-assigned identities start at 1; zero or a negative id cannot point
/// at a stored row.
pub fn validate_reference(field: &str, id: EntityId) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates an inclusive price range used by range queries.
///
/// ## Rules
/// - Both bounds non-negative
/// - `min <= max`
///
/// ## Example
/// ```rust
/// use orderdesk_core::money::Money;
/// use orderdesk_core::validation::validate_price_range;
///
/// assert!(validate_price_range(Money::from_major(10), Money::from_major(50)).is_ok());
/// assert!(validate_price_range(Money::from_major(50), Money::from_major(10)).is_err());
/// ```
pub fn validate_price_range(min: Money, max: Money) -> ValidationResult<()> {
    if min.is_negative() || max.is_negative() || min > max {
        return Err(ValidationError::InvalidRange {
            field: "price".to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
