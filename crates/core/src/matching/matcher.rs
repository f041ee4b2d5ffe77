//! Greedy automatic matcher.

use std::collections::HashSet;

use chrono::Duration;

use moobaan_shared::types::{BankTransactionId, PayInId};

use crate::bank::BankTransaction;
use crate::payin::PayIn;

/// Default automatic-match tolerance.
pub const DEFAULT_TOLERANCE_SECS: u32 = 60;

/// A proposed link between one pay-in and one bank credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchProposal {
    /// Claim being settled.
    pub pay_in_id: PayInId,
    /// Bank credit settling it.
    pub bank_transaction_id: BankTransactionId,
    /// Absolute distance between claimed and bank instants.
    pub time_difference: Duration,
}

/// Automatic matching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    tolerance: Duration,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TOLERANCE_SECS)
    }
}

impl Matcher {
    /// Creates a matcher with the given inclusive tolerance.
    #[must_use]
    pub const fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Creates a matcher with a tolerance in whole seconds.
    #[must_use]
    pub fn from_secs(secs: u32) -> Self {
        Self::new(Duration::seconds(i64::from(secs)))
    }

    /// The inclusive tolerance window.
    #[must_use]
    pub const fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Returns true if the pair qualifies for an automatic match.
    ///
    /// Both sides must be free, the transaction must be a credit of exactly
    /// the claimed amount, and the instants must lie within the tolerance.
    #[must_use]
    pub fn is_candidate(&self, pay_in: &PayIn, transaction: &BankTransaction) -> bool {
        self.candidate_difference(pay_in, transaction).is_some()
    }

    fn candidate_difference(&self, pay_in: &PayIn, transaction: &BankTransaction) -> Option<Duration> {
        if !pay_in.status.is_matchable() || pay_in.matched_bank_transaction_id.is_some() {
            return None;
        }
        if !transaction.is_match_candidate() || transaction.credit_amount() != Some(pay_in.amount) {
            return None;
        }
        let difference = (transaction.effective_at - pay_in.transfer_at).abs();
        (difference <= self.tolerance).then_some(difference)
    }

    /// Proposes a one-to-one assignment.
    ///
    /// Candidate pairs are consumed in order of (time difference,
    /// transaction id, pay-in id); once either side is used it is skipped.
    /// The result is deterministic for the same inputs regardless of input
    /// order.
    #[must_use]
    pub fn propose(&self, pay_ins: &[PayIn], transactions: &[BankTransaction]) -> Vec<MatchProposal> {
        let mut candidates: Vec<MatchProposal> = pay_ins
            .iter()
            .flat_map(|pay_in| {
                transactions.iter().filter_map(move |txn| {
                    self.candidate_difference(pay_in, txn)
                        .map(|time_difference| MatchProposal {
                            pay_in_id: pay_in.id,
                            bank_transaction_id: txn.id,
                            time_difference,
                        })
                })
            })
            .collect();

        candidates.sort_by_key(|c| (c.time_difference, c.bank_transaction_id, c.pay_in_id));

        let mut used_pay_ins = HashSet::new();
        let mut used_transactions = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| {
                if used_pay_ins.contains(&c.pay_in_id)
                    || used_transactions.contains(&c.bank_transaction_id)
                {
                    return false;
                }
                used_pay_ins.insert(c.pay_in_id);
                used_transactions.insert(c.bank_transaction_id);
                true
            })
            .collect()
    }
}
