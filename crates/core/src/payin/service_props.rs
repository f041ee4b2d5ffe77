//! Property-based tests for `PayInService`.

use proptest::prelude::*;
use rust_decimal::Decimal;

use moobaan_shared::types::UserId;

use crate::error::CoreError;
use crate::payin::service::fixtures::{credit, now, pay_in};
use crate::payin::service::{Acceptance, PayInService};
use crate::payin::types::PayInStatus;

fn arb_status() -> impl Strategy<Value = PayInStatus> {
    prop_oneof![
        Just(PayInStatus::Draft),
        Just(PayInStatus::Submitted),
        Just(PayInStatus::RejectedNeedsFix),
        Just(PayInStatus::Matched),
        Just(PayInStatus::Accepted),
    ]
}

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_reason() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,60}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every successful operation moves along an allowed edge.
    #[test]
    fn prop_transitions_follow_graph(status in arb_status(), amount in arb_amount(), reason in arb_reason()) {
        let current = pay_in(amount, status);
        let txn = credit(amount);
        let outcomes = [
            PayInService::submit(&current, now()),
            PayInService::reject(&current, &reason, now()),
            PayInService::link(&current, &txn, None, now()),
            PayInService::unlink(&current, now()),
        ];
        for next in outcomes.into_iter().flatten() {
            prop_assert!(PayInService::is_valid_transition(status, next.status));
        }
        if let Ok(Acceptance::Accept(next)) = PayInService::accept(&current, UserId::new(), now()) {
            prop_assert!(PayInService::is_valid_transition(status, next.status));
        }
    }

    /// Accepted pay-ins refuse every mutation.
    #[test]
    fn prop_accepted_is_immutable(amount in arb_amount(), reason in arb_reason()) {
        let accepted = pay_in(amount, PayInStatus::Accepted);
        let refusals = [
            PayInService::submit(&accepted, now()),
            PayInService::reject(&accepted, &reason, now()),
            PayInService::link(&accepted, &credit(amount), None, now()),
            PayInService::unlink(&accepted, now()),
        ];
        for refusal in refusals {
            let is_immutable = matches!(refusal, Err(CoreError::ImmutableRecord { .. }));
            prop_assert!(is_immutable);
        }
        prop_assert_eq!(
            PayInService::accept(&accepted, UserId::new(), now()).unwrap(),
            Acceptance::AlreadyAccepted
        );
    }

    /// The status is MATCHED exactly when a bank link is held.
    #[test]
    fn prop_matched_iff_linked(amount in arb_amount(), reason in arb_reason()) {
        let submitted = pay_in(amount, PayInStatus::Submitted);
        let txn = credit(amount);

        let matched = PayInService::link(&submitted, &txn, None, now()).unwrap();
        prop_assert_eq!(matched.status, PayInStatus::Matched);
        prop_assert_eq!(matched.matched_bank_transaction_id, Some(txn.id));

        let relinked = PayInService::link(&matched, &credit(amount), None, now());
        let is_already_matched = matches!(relinked, Err(CoreError::AlreadyMatched { .. }));
        prop_assert!(is_already_matched);

        let rejected = PayInService::reject(&matched, &reason, now()).unwrap();
        prop_assert_eq!(rejected.matched_bank_transaction_id, None);

        let unmatched = PayInService::unlink(&matched, now()).unwrap();
        prop_assert_eq!(unmatched.matched_bank_transaction_id, None);
        prop_assert_eq!(unmatched.status, PayInStatus::Submitted);
    }

    /// Blank reasons are always refused.
    #[test]
    fn prop_blank_reason_rejected(status in arb_status(), spaces in " {0,5}") {
        let current = pay_in(Decimal::ONE, status);
        let is_validation = matches!(PayInService::reject(&current, &spaces, now()), Err(CoreError::Validation(_)));
        prop_assert!(is_validation);
    }
}
