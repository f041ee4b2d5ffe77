//! Property-based tests for the automatic matcher.

use std::collections::HashSet;

use chrono::Duration;
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::bank::BankTransaction;
use crate::matching::Matcher;
use crate::payin::service::fixtures::{credit, pay_in};
use crate::payin::{PayIn, PayInStatus};

/// (amount in whole baht from a small set, offset seconds from the claim base)
fn arb_side() -> impl Strategy<Value = (i64, i64)> {
    (1i64..4, -180i64..180)
}

fn build(pay_ins: &[(i64, i64)], txns: &[(i64, i64)]) -> (Vec<PayIn>, Vec<BankTransaction>) {
    let pay_ins: Vec<PayIn> = pay_ins
        .iter()
        .map(|&(amount, offset)| {
            let mut p = pay_in(Decimal::from(amount * 100), PayInStatus::Submitted);
            p.transfer_at += Duration::seconds(offset);
            p
        })
        .collect();
    let base = pay_ins.first().map(|p| p.transfer_at);
    let txns = txns
        .iter()
        .map(|&(amount, offset)| {
            let mut t = credit(Decimal::from(amount * 100));
            if let Some(base) = base {
                t.effective_at = base + Duration::seconds(offset);
            }
            t
        })
        .collect();
    (pay_ins, txns)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// No pay-in and no transaction appears in two proposals.
    #[test]
    fn prop_assignment_is_one_to_one(
        claims in prop::collection::vec(arb_side(), 0..8),
        rows in prop::collection::vec(arb_side(), 0..8),
    ) {
        let (pay_ins, txns) = build(&claims, &rows);
        let proposals = Matcher::default().propose(&pay_ins, &txns);

        let pay_in_ids: HashSet<_> = proposals.iter().map(|p| p.pay_in_id).collect();
        let txn_ids: HashSet<_> = proposals.iter().map(|p| p.bank_transaction_id).collect();
        prop_assert_eq!(pay_in_ids.len(), proposals.len());
        prop_assert_eq!(txn_ids.len(), proposals.len());
    }

    /// Every proposal satisfies the amount and tolerance rules.
    #[test]
    fn prop_proposals_are_candidates(
        claims in prop::collection::vec(arb_side(), 0..8),
        rows in prop::collection::vec(arb_side(), 0..8),
    ) {
        let (pay_ins, txns) = build(&claims, &rows);
        let matcher = Matcher::default();
        for proposal in matcher.propose(&pay_ins, &txns) {
            let p = pay_ins.iter().find(|p| p.id == proposal.pay_in_id).unwrap();
            let t = txns.iter().find(|t| t.id == proposal.bank_transaction_id).unwrap();
            prop_assert!(matcher.is_candidate(p, t));
            prop_assert!(proposal.time_difference <= matcher.tolerance());
        }
    }

    /// The result does not depend on input order.
    #[test]
    fn prop_order_independent(
        claims in prop::collection::vec(arb_side(), 0..6),
        rows in prop::collection::vec(arb_side(), 0..6),
    ) {
        let (pay_ins, txns) = build(&claims, &rows);
        let forward = Matcher::default().propose(&pay_ins, &txns);

        let mut reversed_pay_ins = pay_ins.clone();
        reversed_pay_ins.reverse();
        let mut reversed_txns = txns.clone();
        reversed_txns.reverse();
        let backward = Matcher::default().propose(&reversed_pay_ins, &reversed_txns);

        prop_assert_eq!(forward, backward);
    }

    /// A pay-in with any free candidate is never left out while that candidate is free.
    #[test]
    fn prop_maximal(
        claims in prop::collection::vec(arb_side(), 0..6),
        rows in prop::collection::vec(arb_side(), 0..6),
    ) {
        let (pay_ins, txns) = build(&claims, &rows);
        let matcher = Matcher::default();
        let proposals = matcher.propose(&pay_ins, &txns);
        let used_p: HashSet<_> = proposals.iter().map(|p| p.pay_in_id).collect();
        let used_t: HashSet<_> = proposals.iter().map(|p| p.bank_transaction_id).collect();

        for p in pay_ins.iter().filter(|p| !used_p.contains(&p.id)) {
            for t in txns.iter().filter(|t| !used_t.contains(&t.id)) {
                prop_assert!(!matcher.is_candidate(p, t));
            }
        }
    }
}
