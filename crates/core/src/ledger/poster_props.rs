//! Property-based tests for `LedgerPoster`.

use chrono::Duration;
use proptest::prelude::*;
use rust_decimal::Decimal;

use moobaan_shared::types::{RegionalOffset, UserId};

use crate::ledger::LedgerPoster;
use crate::payin::PayInStatus;
use crate::payin::service::PayInService;
use crate::payin::service::fixtures::{credit, now, pay_in};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The received date is always the regional date of the bank instant.
    #[test]
    fn prop_received_date_is_regional(minutes in -2_000i64..2_000, hours in -12i32..=14) {
        let offset = RegionalOffset::from_hours(hours).unwrap();
        let claim = pay_in(Decimal::ONE_HUNDRED, PayInStatus::Submitted);
        let mut txn = credit(Decimal::ONE_HUNDRED);
        txn.effective_at += Duration::minutes(minutes);
        let matched = PayInService::link(&claim, &txn, None, now()).unwrap();
        txn.matched_pay_in_id = Some(matched.id);

        let date = LedgerPoster::received_date(&matched, Some(&txn), offset).unwrap();
        let expected = (txn.effective_at + Duration::hours(i64::from(hours))).date_naive();
        prop_assert_eq!(date, expected);
    }

    /// Any row count other than one is rejected for an accepted pay-in.
    #[test]
    fn prop_accepted_needs_exactly_one(rows in 0usize..5) {
        let claim = pay_in(Decimal::ONE, PayInStatus::Accepted);
        let income = LedgerPoster::build_income(&claim, claim.claimed.date, UserId::new(), now());
        let incomes = vec![income; rows];
        prop_assert_eq!(LedgerPoster::verify_posted(claim.id, &incomes).is_ok(), rows == 1);
    }
}
