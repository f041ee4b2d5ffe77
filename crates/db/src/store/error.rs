//! Translation of database errors into core errors.

use sea_orm::{DbErr, SqlErr};

use moobaan_core::CoreError;

const PERIOD_LOCKED_MARKER: &str = "PERIOD_LOCKED: ";
const IMMUTABLE_MARKER: &str = "IMMUTABLE_RECORD: ";

/// Unique constraint linking a pay-in to its bank transaction.
pub(super) const PAY_IN_MATCH_CONSTRAINT: &str = "uq_pay_ins_matched_bank_transaction";
/// Unique constraint linking a bank transaction back to its pay-in.
pub(super) const BANK_MATCH_CONSTRAINT: &str = "uq_bank_transactions_matched_pay_in";
/// One income row per pay-in.
pub(super) const INCOME_PAY_IN_CONSTRAINT: &str = "uq_income_transactions_pay_in";

/// Returns true if `err` is a unique violation of `constraint`.
pub(super) fn violates(err: &DbErr, constraint: &str) -> bool {
    matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(message)) if message.contains(constraint)
    )
}

/// Text following `marker` up to the end of the line.
fn after_marker<'a>(message: &'a str, marker: &str) -> Option<&'a str> {
    let start = message.find(marker)? + marker.len();
    let rest = &message[start..];
    let end = rest.find(['\n', '"']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Maps a database error without call-site context.
pub(crate) fn db_error(err: DbErr) -> CoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => CoreError::Conflict(message),
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => CoreError::NotFound {
            entity: "referenced record",
            id: message,
        },
        _ => {
            let message = err.to_string();
            if let Some(period) = after_marker(&message, PERIOD_LOCKED_MARKER) {
                return CoreError::PeriodLocked {
                    period: period.to_string(),
                    context: "post income".to_string(),
                };
            }
            if let Some(record) = after_marker(&message, IMMUTABLE_MARKER) {
                return CoreError::ImmutableRecord {
                    record: record.to_string(),
                };
            }
            tracing::error!(error = %message, "database error");
            CoreError::Storage(message)
        }
    }
}
