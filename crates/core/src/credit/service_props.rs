//! Property-based tests for `CreditNoteService`.

use proptest::prelude::*;
use rust_decimal::Decimal;

use moobaan_shared::types::{Money, UserId};

use crate::credit::service::CreditNoteService;
use crate::credit::service::fixtures::{invoice, now, request};
use crate::error::CoreError;

fn arb_cents() -> impl Strategy<Value = i64> {
    1i64..500_000
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Issuing any sequence of requests never credits more than the total.
    #[test]
    fn prop_never_over_credits(total in arb_cents(), requests in prop::collection::vec(arb_cents(), 0..10)) {
        let inv = invoice(Decimal::new(total, 2));
        let mut notes = Vec::new();
        for cents in requests {
            let amount = Decimal::new(cents, 2);
            let remaining = CreditNoteService::remaining_balance(&inv, &notes).unwrap();
            match CreditNoteService::issue(&inv, &notes, request(&inv, amount, false), UserId::new(), now()) {
                Ok(note) => {
                    prop_assert!(note.amount <= remaining);
                    notes.push(note);
                }
                Err(CoreError::CreditExceedsBalance { requested, remaining: reported }) => {
                    prop_assert_eq!(reported, remaining);
                    prop_assert!(requested > remaining);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
        let remaining = CreditNoteService::remaining_balance(&inv, &notes).unwrap();
        prop_assert!(remaining >= Money::ZERO);
        prop_assert_eq!(remaining + notes.iter().map(|n| n.amount).sum::<Money>(), inv.total_amount);
    }

    /// The boundary sits exactly at the remaining balance.
    #[test]
    fn prop_boundary(total in arb_cents(), first in arb_cents()) {
        prop_assume!(first < total);
        let inv = invoice(Decimal::new(total, 2));
        let note = CreditNoteService::issue(&inv, &[], request(&inv, Decimal::new(first, 2), false), UserId::new(), now()).unwrap();
        let prior = [note];
        let remaining = Decimal::new(total - first, 2);

        prop_assert!(CreditNoteService::issue(&inv, &prior, request(&inv, remaining, false), UserId::new(), now()).is_ok());
        let over = remaining + Decimal::new(1, 2);
        let is_exceeds = matches!(
            CreditNoteService::issue(&inv, &prior, request(&inv, over, false), UserId::new(), now()),
            Err(CoreError::CreditExceedsBalance { .. })
        );
        prop_assert!(is_exceeds);
    }
}
