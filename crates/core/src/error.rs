//! Core error types.
//!
//! Every public operation of the core fails with a [`CoreError`]. Each
//! variant carries an actionable message plus a machine-readable code, and
//! converts into the shared [`AppError`] for whatever boundary renders it.

use thiserror::Error;

use moobaan_shared::AppError;
use moobaan_shared::types::{BankTransactionId, Money, MoneyError, PayInId, TimeError};

/// Result type alias using `CoreError`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation not permitted from the record's current lifecycle state.
    InvalidState,
    /// A match back-reference already exists on one side.
    AlreadyMatched,
    /// Mutation attempted on an accepted pay-in or a credit note.
    ImmutableRecord,
    /// Credit note larger than the invoice's remaining balance.
    CreditExceedsBalance,
    /// Mutation targets a locked accounting period.
    PeriodLocked,
    /// Referenced entity does not exist.
    NotFound,
    /// An invariant the system should have prevented was observed.
    DataIntegrity,
    /// Malformed input.
    Validation,
    /// Lost a compare-and-set to a concurrent writer.
    Conflict,
    /// Storage collaborator failure.
    Storage,
}

/// Errors raised by core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Operation not permitted from the current lifecycle state.
    #[error("Cannot {action} while {entity} is {status}")]
    InvalidState {
        /// Kind of record, e.g. "pay-in".
        entity: &'static str,
        /// Attempted operation, e.g. "submit".
        action: &'static str,
        /// Current status of the record.
        status: String,
    },

    /// Pay-in or bank transaction already holds a match.
    #[error("Pay-in {pay_in_id} or bank transaction {bank_transaction_id} is already matched")]
    AlreadyMatched {
        /// Pay-in side of the attempted match.
        pay_in_id: PayInId,
        /// Bank transaction side of the attempted match.
        bank_transaction_id: BankTransactionId,
    },

    /// Attempted mutation of an immutable record.
    #[error("{record} is immutable")]
    ImmutableRecord {
        /// Description of the record.
        record: String,
    },

    /// Credit note amount above the invoice's remaining balance.
    #[error("Credit of {requested} exceeds remaining balance of {remaining}")]
    CreditExceedsBalance {
        /// Requested credit amount.
        requested: Money,
        /// Remaining balance before this credit.
        remaining: Money,
    },

    /// Mutation targets a locked accounting period.
    #[error("Period {period} is locked; cannot {context}")]
    PeriodLocked {
        /// Human-readable period label, e.g. "2026-01".
        period: String,
        /// What was attempted.
        context: String,
    },

    /// Referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// An invariant the system should have prevented is observed.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// A second income record was rejected by the storage uniqueness constraint.
    #[error("Income for pay-in {pay_in_id} is already posted")]
    DuplicatePosting {
        /// Pay-in whose income already exists.
        pay_in_id: PayInId,
    },

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record changed underneath the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage collaborator failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Shorthand for a missing record.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a lifecycle violation.
    pub fn invalid_state(entity: &'static str, action: &'static str, status: impl ToString) -> Self {
        Self::InvalidState {
            entity,
            action,
            status: status.to_string(),
        }
    }

    /// Builds a data-integrity error and logs it for operational alerting.
    pub fn integrity(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "data integrity violation");
        Self::DataIntegrity(message)
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::AlreadyMatched { .. } => ErrorKind::AlreadyMatched,
            Self::ImmutableRecord { .. } => ErrorKind::ImmutableRecord,
            Self::CreditExceedsBalance { .. } => ErrorKind::CreditExceedsBalance,
            Self::PeriodLocked { .. } => ErrorKind::PeriodLocked,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DataIntegrity(_) => ErrorKind::DataIntegrity,
            Self::Validation(_) => ErrorKind::Validation,
            Self::DuplicatePosting { .. } | Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::AlreadyMatched { .. } | Self::DuplicatePosting { .. } | Self::Conflict(_) => 409,
            Self::InvalidState { .. }
            | Self::ImmutableRecord { .. }
            | Self::CreditExceedsBalance { .. }
            | Self::PeriodLocked { .. } => 422,
            Self::DataIntegrity(_) | Self::Storage(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::AlreadyMatched { .. } => "ALREADY_MATCHED",
            Self::ImmutableRecord { .. } => "IMMUTABLE_RECORD",
            Self::CreditExceedsBalance { .. } => "CREDIT_EXCEEDS_BALANCE",
            Self::PeriodLocked { .. } => "PERIOD_LOCKED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DataIntegrity(_) => "DATA_INTEGRITY",
            Self::DuplicatePosting { .. } => "DUPLICATE_POSTING",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<MoneyError> for CoreError {
    fn from(err: MoneyError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<TimeError> for CoreError {
    fn from(err: TimeError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let code = err.error_code();
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::InvalidState
            | ErrorKind::ImmutableRecord
            | ErrorKind::CreditExceedsBalance
            | ErrorKind::PeriodLocked => Self::BusinessRule { code, message },
            ErrorKind::AlreadyMatched | ErrorKind::Conflict => Self::Conflict { code, message },
            ErrorKind::Storage => Self::Database(message),
            ErrorKind::DataIntegrity => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invalid_state_message() {
        let err = CoreError::invalid_state("pay-in", "submit", "MATCHED");
        assert_eq!(err.to_string(), "Cannot submit while pay-in is MATCHED");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_period_locked_names_period() {
        let err = CoreError::PeriodLocked {
            period: "2026-01".into(),
            context: "post income".into(),
        };
        assert_eq!(err.to_string(), "Period 2026-01 is locked; cannot post income");
        assert_eq!(err.error_code(), "PERIOD_LOCKED");
    }

    #[test]
    fn test_credit_exceeds_names_remaining_balance() {
        let err = CoreError::CreditExceedsBalance {
            requested: Money::new(dec!(1600)),
            remaining: Money::new(dec!(1500)),
        };
        assert_eq!(
            err.to_string(),
            "Credit of 1600.00 exceeds remaining balance of 1500.00"
        );
    }

    #[test]
    fn test_already_matched_is_conflict() {
        let err = CoreError::AlreadyMatched {
            pay_in_id: PayInId::new(),
            bank_transaction_id: BankTransactionId::new(),
        };
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.kind(), ErrorKind::AlreadyMatched);
    }

    #[test]
    fn test_duplicate_posting_classified_as_conflict() {
        let err = CoreError::DuplicatePosting {
            pay_in_id: PayInId::new(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.error_code(), "DUPLICATE_POSTING");
    }

    #[test]
    fn test_integrity_is_internal() {
        let err = CoreError::integrity("two income rows for one pay-in");
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_money_error_becomes_validation() {
        let err: CoreError = MoneyError::NotPositive(dec!(0)).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_conversion_to_app_error() {
        let app: AppError = CoreError::PeriodLocked {
            period: "2026-01".into(),
            context: "accept pay-in".into(),
        }
        .into();
        assert_eq!(app.status_code(), 422);
        assert_eq!(app.error_code(), "PERIOD_LOCKED");

        let app: AppError = CoreError::not_found("invoice", "abc").into();
        assert_eq!(app.status_code(), 404);
        assert_eq!(app.to_string(), "Not found: invoice abc not found");

        let app: AppError = CoreError::DataIntegrity("x".into()).into();
        assert_eq!(app.error_code(), "INTERNAL_ERROR");
    }
}
