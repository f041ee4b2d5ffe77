//! `SeaORM` entity definitions.
//!
//! One module per table created by the initial migration.

pub mod bank_transactions;
pub mod credit_notes;
pub mod houses;
pub mod income_transactions;
pub mod invoices;
pub mod pay_ins;
pub mod period_snapshots;
pub mod period_unlock_logs;
pub mod resident_memberships;
pub mod sea_orm_active_enums;
