//! Income ledger.
//!
//! Accepting a pay-in posts exactly one immutable income record. The
//! chart of accounts is classification-only; there is no double entry.

pub mod income;
pub mod poster;

#[cfg(test)]
mod poster_props;

pub use income::IncomeTransaction;
pub use poster::LedgerPoster;
