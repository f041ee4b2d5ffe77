//! Core business logic for Moobaan.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage is reached only through the [`store`] traits.
//!
//! # Modules
//!
//! - `payin` - Pay-in lifecycle state machine
//! - `matching` - Bank reconciliation matcher
//! - `ledger` - Income posting
//! - `period` - Period snapshots and the lock guard
//! - `credit` - Invoices and credit notes
//! - `service` - Unit-of-work orchestration of all of the above

pub mod bank;
pub mod clock;
pub mod credit;
pub mod error;
pub mod house;
pub mod ledger;
pub mod matching;
pub mod payin;
pub mod period;
pub mod service;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use service::{AcceptOutcome, BillingService, MatchRunReport, ReconciliationSettings};
