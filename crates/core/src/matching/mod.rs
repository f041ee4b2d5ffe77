//! Bank reconciliation.
//!
//! Proposes one-to-one links between claimed pay-ins and imported bank
//! credits using exact amount equality and a time-proximity tolerance.

pub mod matcher;

#[cfg(test)]
mod matcher_props;

pub use matcher::{DEFAULT_TOLERANCE_SECS, MatchProposal, Matcher};
