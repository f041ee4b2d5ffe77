//! Scenario tests for `BillingService` over the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use moobaan_shared::types::{Money, UserId};

use super::{BillingService, ReconciliationSettings};
use crate::bank::{BankStatementRow, BankTransaction};
use crate::clock::FixedClock;
use crate::credit::{CreditNoteRequest, NewInvoice};
use crate::error::CoreError;
use crate::house::{House, MembershipRole};
use crate::payin::{ClaimedTransfer, NewPayIn, PayIn, PayInEdit, PayInSource, PayInStatus};
use crate::period::{PeriodService, PeriodStatus, PeriodTotals, YearMonth};
use crate::store::{BillingStore, Fault, InMemoryStore, PeriodAccess, UnitOfWork, WriteKind};

type Service = BillingService<InMemoryStore, FixedClock>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 30, 9, 0, 0).unwrap()
}

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

fn local(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    jan(day).and_hms_opt(h, m, s).unwrap()
}

struct Harness {
    service: Arc<Service>,
    store: InMemoryStore,
    house: House,
    admin: UserId,
}

async fn harness() -> Harness {
    let store = InMemoryStore::new();
    let clock = FixedClock::new(t0());
    let service = Arc::new(BillingService::new(
        store.clone(),
        clock,
        ReconciliationSettings::default(),
    ));
    let house = service.register_house("A-101").await.unwrap();
    Harness {
        service,
        store,
        house,
        admin: UserId::new(),
    }
}

impl Harness {
    /// Admin-created claim for 2026-01-30 at the given local time.
    async fn claim(&self, amount: Decimal, hour: u32, minute: u32) -> PayIn {
        self.service
            .create_pay_in(NewPayIn {
                house_id: self.house.id,
                amount,
                claimed: ClaimedTransfer::new(jan(30), hour, minute),
                source: PayInSource::AdminCreated,
                created_by: self.admin,
                submit_immediately: true,
            })
            .await
            .unwrap()
    }

    async fn credit(&self, amount: Decimal, occurred_at: NaiveDateTime) -> BankTransaction {
        self.service
            .import_bank_transaction(BankStatementRow {
                occurred_at,
                credit: Some(amount),
                debit: None,
                description: "transfer".to_string(),
                bank_reference: None,
            })
            .await
            .unwrap()
    }

    /// Scenario A's records, linked.
    async fn matched_pair(&self) -> (PayIn, BankTransaction) {
        let claim = self.claim(dec!(1000.00), 15, 28).await;
        let txn = self.credit(dec!(1000.00), local(30, 15, 28, 30)).await;
        let report = self.service.run_automatic_match().await.unwrap();
        assert_eq!(report.matched.len(), 1);
        (
            self.service.pay_in(claim.id).await.unwrap(),
            self.service.bank_transaction(txn.id).await.unwrap(),
        )
    }

    async fn income_count(&self, claim: &PayIn) -> usize {
        self.service.incomes_for_pay_in(claim.id).await.unwrap().len()
    }
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_resident_needs_active_membership() {
    let h = harness().await;
    let resident = UserId::new();
    let input = NewPayIn {
        house_id: h.house.id,
        amount: dec!(500),
        claimed: ClaimedTransfer::new(jan(29), 10, 0),
        source: PayInSource::Resident,
        created_by: resident,
        submit_immediately: false,
    };

    let result = h.service.create_pay_in(input.clone()).await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    h.service
        .add_membership(h.house.id, resident, MembershipRole::Owner)
        .await
        .unwrap();
    let draft = h.service.create_pay_in(input).await.unwrap();
    assert_eq!(draft.status, PayInStatus::Draft);

    let submitted = h.service.submit_pay_in(draft.id).await.unwrap();
    assert_eq!(submitted.status, PayInStatus::Submitted);
}

#[tokio::test]
async fn test_unknown_house_not_found() {
    let h = harness().await;
    let result = h
        .service
        .create_pay_in(NewPayIn {
            house_id: moobaan_shared::types::HouseId::new(),
            amount: dec!(1),
            claimed: ClaimedTransfer::new(jan(1), 0, 0),
            source: PayInSource::LineReceived,
            created_by: h.admin,
            submit_immediately: false,
        })
        .await;
    assert!(matches!(result, Err(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_duplicate_house_code_conflicts() {
    let h = harness().await;
    let result = h.service.register_house("A-101").await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_edit_recomputes_transfer_instant() {
    let h = harness().await;
    let claim = h.claim(dec!(100), 15, 28).await;
    let edited = h
        .service
        .edit_pay_in(
            claim.id,
            PayInEdit {
                amount: None,
                claimed: Some(ClaimedTransfer::new(jan(30), 16, 0)),
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.transfer_at, Utc.with_ymd_and_hms(2026, 1, 30, 9, 0, 0).unwrap());
    assert_eq!(edited.claimed.hour, 16);
}

// ============================================================================
// Matching
// ============================================================================

#[tokio::test]
async fn test_scenario_a_automatic_match() {
    let h = harness().await;
    let claim = h.claim(dec!(1000.00), 15, 28).await;
    let txn = h.credit(dec!(1000.00), local(30, 15, 28, 30)).await;
    assert_eq!(txn.effective_at, Utc.with_ymd_and_hms(2026, 1, 30, 8, 28, 30).unwrap());

    let report = h.service.run_automatic_match().await.unwrap();

    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].pay_in_id, claim.id);
    assert_eq!(report.matched[0].bank_transaction_id, txn.id);
    assert!(report.unmatched_pay_ins.is_empty());

    let matched = h.service.pay_in(claim.id).await.unwrap();
    assert_eq!(matched.status, PayInStatus::Matched);
    assert_eq!(matched.matched_bank_transaction_id, Some(txn.id));
    let linked = h.service.bank_transaction(txn.id).await.unwrap();
    assert_eq!(linked.matched_pay_in_id, Some(claim.id));
}

#[tokio::test]
async fn test_scenario_b_outside_tolerance() {
    let h = harness().await;
    let claim = h.claim(dec!(1000.00), 15, 28).await;
    h.credit(dec!(1000.00), local(30, 15, 31, 0)).await;

    let report = h.service.run_automatic_match().await.unwrap();

    assert!(report.matched.is_empty());
    assert_eq!(report.unmatched_pay_ins, vec![claim.id]);
    assert_eq!(
        h.service.pay_in(claim.id).await.unwrap().status,
        PayInStatus::Submitted
    );
}

#[tokio::test]
async fn test_rerun_is_stable() {
    let h = harness().await;
    h.matched_pair().await;
    let report = h.service.run_automatic_match().await.unwrap();
    assert!(report.matched.is_empty());
}

#[tokio::test]
async fn test_match_unmatch_round_trip() {
    let h = harness().await;
    let claim = h.claim(dec!(250), 10, 0).await;
    let txn = h.credit(dec!(250), local(30, 18, 0, 0)).await;

    let matched = h.service.manual_match(claim.id, txn.id, h.admin).await.unwrap();
    assert_eq!(matched.status, PayInStatus::Matched);
    assert_eq!(matched.matched_by, Some(h.admin));
    assert_eq!(matched.matched_at, Some(t0()));
    assert_eq!(h.service.pay_in(claim.id).await.unwrap(), matched);

    let unmatched = h.service.manual_unmatch(txn.id, h.admin).await.unwrap();
    assert_eq!(unmatched.version, claim.version + 2);
    assert_eq!(
        PayIn {
            version: claim.version,
            ..unmatched.clone()
        },
        claim
    );
    assert_eq!(h.service.pay_in(claim.id).await.unwrap(), unmatched);
    assert_eq!(h.service.bank_transaction(txn.id).await.unwrap(), txn);
}

#[tokio::test]
async fn test_manual_match_rejects_taken_transaction() {
    let h = harness().await;
    let (_, txn) = h.matched_pair().await;
    let other = h.claim(dec!(1000.00), 15, 28).await;

    let result = h.service.manual_match(other.id, txn.id, h.admin).await;
    assert!(matches!(result, Err(CoreError::AlreadyMatched { .. })));
}

#[tokio::test]
async fn test_manual_match_rejects_debit() {
    let h = harness().await;
    let claim = h.claim(dec!(50), 9, 0).await;
    let debit = h
        .service
        .import_bank_transaction(BankStatementRow {
            occurred_at: local(30, 9, 0, 0),
            credit: None,
            debit: Some(dec!(50)),
            description: "guard salary".to_string(),
            bank_reference: None,
        })
        .await
        .unwrap();

    let result = h.service.manual_match(claim.id, debit.id, h.admin).await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_manual_unmatch_requires_match() {
    let h = harness().await;
    let txn = h.credit(dec!(10), local(30, 9, 0, 0)).await;
    let result = h.service.manual_unmatch(txn.id, h.admin).await;
    assert!(matches!(result, Err(CoreError::InvalidState { .. })));
}

#[tokio::test]
async fn test_create_pay_in_from_bank_transaction() {
    let h = harness().await;
    let txn = h.credit(dec!(1800), local(28, 20, 15, 42)).await;

    let created = h
        .service
        .create_pay_in_from_bank_transaction(txn.id, h.house.id, h.admin)
        .await
        .unwrap();

    assert_eq!(created.status, PayInStatus::Matched);
    assert_eq!(created.source, PayInSource::AdminCreated);
    assert_eq!(created.amount, Money::new(dec!(1800)));
    assert_eq!(created.claimed, ClaimedTransfer::new(jan(28), 20, 15));
    assert_eq!(created.matched_bank_transaction_id, Some(txn.id));
    assert_eq!(created.matched_by, Some(h.admin));
    assert_eq!(
        h.service.bank_transaction(txn.id).await.unwrap().matched_pay_in_id,
        Some(created.id)
    );

    let again = h
        .service
        .create_pay_in_from_bank_transaction(txn.id, h.house.id, h.admin)
        .await;
    assert!(matches!(again, Err(CoreError::AlreadyMatched { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_matches_have_one_winner() {
    let h = harness().await;
    let txn = h.credit(dec!(400), local(30, 12, 0, 0)).await;
    let mut claims = Vec::new();
    for _ in 0..6 {
        claims.push(h.claim(dec!(400), 12, 0).await);
    }

    let tasks = claims.iter().map(|claim| {
        let service = Arc::clone(&h.service);
        let (pay_in_id, txn_id, admin) = (claim.id, txn.id, h.admin);
        tokio::spawn(async move { service.manual_match(pay_in_id, txn_id, admin).await })
    });
    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(CoreError::AlreadyMatched { .. })));
    }

    let mut uow = h.store.begin().await.unwrap();
    let mut linked = 0;
    for claim in &claims {
        if uow.pay_in(claim.id).await.unwrap().unwrap().matched_bank_transaction_id.is_some() {
            linked += 1;
        }
    }
    assert_eq!(linked, 1);
}

#[tokio::test]
async fn test_automatic_match_leaves_matched_by_empty() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;
    assert_eq!(claim.matched_by, None);
    assert_eq!(claim.matched_at, Some(t0()));
}

fn edit_amount(amount: Decimal) -> PayInEdit {
    PayInEdit {
        amount: Some(amount),
        claimed: None,
    }
}

#[tokio::test]
async fn test_edit_committed_during_match_is_kept() {
    let h = harness().await;
    let claim = h.claim(dec!(1000.00), 15, 28).await;
    let txn = h.credit(dec!(1000.00), local(30, 15, 28, 30)).await;

    let mut matcher = h.store.begin().await.unwrap();
    let read = matcher.pay_in(claim.id).await.unwrap().unwrap();
    let credit = matcher.bank_transaction(txn.id).await.unwrap().unwrap();
    super::matching::link(&mut matcher, &read, &credit, None, t0())
        .await
        .unwrap();

    let edited = h
        .service
        .edit_pay_in(claim.id, edit_amount(dec!(999.00)))
        .await
        .unwrap();

    assert!(matches!(matcher.commit().await, Err(CoreError::Conflict(_))));
    assert_eq!(h.service.pay_in(claim.id).await.unwrap(), edited);
    assert_eq!(edited.amount, Money::new(dec!(999.00)));
    assert_eq!(edited.status, PayInStatus::Submitted);
    assert_eq!(
        h.service.bank_transaction(txn.id).await.unwrap().matched_pay_in_id,
        None
    );

    let report = h.service.run_automatic_match().await.unwrap();
    assert!(report.matched.is_empty());
}

#[tokio::test]
async fn test_stale_link_loses_to_edit_then_relinks() {
    let h = harness().await;
    let claim = h.claim(dec!(300), 9, 0).await;
    let txn = h.credit(dec!(300), local(30, 9, 0, 0)).await;

    let mut matcher = h.store.begin().await.unwrap();
    super::matching::link(&mut matcher, &claim, &txn, Some(h.admin), t0())
        .await
        .unwrap();
    h.service
        .edit_pay_in(claim.id, edit_amount(dec!(310)))
        .await
        .unwrap();
    assert!(matches!(matcher.commit().await, Err(CoreError::Conflict(_))));

    let matched = h.service.manual_match(claim.id, txn.id, h.admin).await.unwrap();
    assert_eq!(matched.amount, Money::new(dec!(310)));
}

// ============================================================================
// Rejection
// ============================================================================

#[tokio::test]
async fn test_scenario_d_reject_matched_releases_transaction() {
    let h = harness().await;
    let (claim, txn) = h.matched_pair().await;

    let rejected = h.service.reject_pay_in(claim.id, "slip unreadable").await.unwrap();

    assert_eq!(rejected.status, PayInStatus::RejectedNeedsFix);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("slip unreadable"));
    assert_eq!(rejected.matched_bank_transaction_id, None);
    let released = h.service.bank_transaction(txn.id).await.unwrap();
    assert_eq!(released.matched_pay_in_id, None);
    assert!(released.is_match_candidate());

    let report = h.service.run_automatic_match().await.unwrap();
    assert_eq!(report.matched.len(), 1);
}

#[tokio::test]
async fn test_reject_is_atomic() {
    let h = harness().await;
    let (claim, txn) = h.matched_pair().await;
    h.store
        .inject(Fault::Write(WriteKind::ReleaseBankTransaction))
        .unwrap();

    let result = h.service.reject_pay_in(claim.id, "wrong house").await;

    assert!(matches!(result, Err(CoreError::Storage(_))));
    assert_eq!(h.service.pay_in(claim.id).await.unwrap(), claim);
    assert_eq!(h.service.bank_transaction(txn.id).await.unwrap(), txn);
}

// ============================================================================
// Acceptance and posting
// ============================================================================

#[tokio::test]
async fn test_accept_posts_one_income() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;

    let outcome = h.service.accept_pay_in(claim.id, h.admin).await.unwrap();

    assert!(outcome.newly_posted);
    assert_eq!(outcome.pay_in.status, PayInStatus::Accepted);
    assert_eq!(outcome.pay_in.accepted_by, Some(h.admin));
    assert_eq!(outcome.pay_in.accepted_at, Some(t0()));
    assert_eq!(outcome.income.amount, Money::new(dec!(1000)));
    assert_eq!(outcome.income.received_on, jan(30));
    assert_eq!(h.income_count(&claim).await, 1);
}

#[tokio::test]
async fn test_accept_is_idempotent() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;

    let first = h.service.accept_pay_in(claim.id, h.admin).await.unwrap();
    let second = h.service.accept_pay_in(claim.id, UserId::new()).await.unwrap();

    assert!(!second.newly_posted);
    assert_eq!(second.income, first.income);
    assert_eq!(second.pay_in, first.pay_in);
    assert_eq!(h.income_count(&claim).await, 1);
}

#[tokio::test]
async fn test_admin_override_uses_claimed_date() {
    let h = harness().await;
    let claim = h.claim(dec!(75), 23, 50).await;

    let outcome = h.service.accept_pay_in(claim.id, h.admin).await.unwrap();

    assert_eq!(outcome.income.received_on, jan(30));
    assert_eq!(outcome.pay_in.matched_bank_transaction_id, None);
}

#[tokio::test]
async fn test_accepted_pay_in_is_immutable() {
    let h = harness().await;
    let (claim, txn) = h.matched_pair().await;
    h.service.accept_pay_in(claim.id, h.admin).await.unwrap();

    assert!(matches!(
        h.service.reject_pay_in(claim.id, "late").await,
        Err(CoreError::ImmutableRecord { .. })
    ));
    assert!(matches!(
        h.service.edit_pay_in(claim.id, PayInEdit::default()).await,
        Err(CoreError::ImmutableRecord { .. })
    ));
    assert!(matches!(
        h.service.manual_unmatch(txn.id, h.admin).await,
        Err(CoreError::ImmutableRecord { .. })
    ));
}

#[tokio::test]
async fn test_accept_draft_fails() {
    let h = harness().await;
    let resident = UserId::new();
    h.service
        .add_membership(h.house.id, resident, MembershipRole::Family)
        .await
        .unwrap();
    let draft = h
        .service
        .create_pay_in(NewPayIn {
            house_id: h.house.id,
            amount: dec!(10),
            claimed: ClaimedTransfer::new(jan(30), 8, 0),
            source: PayInSource::Resident,
            created_by: resident,
            submit_immediately: false,
        })
        .await
        .unwrap();

    let result = h.service.accept_pay_in(draft.id, h.admin).await;
    assert!(matches!(result, Err(CoreError::InvalidState { .. })));
}

#[tokio::test]
async fn test_scenario_c_locked_period_blocks_acceptance() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;
    h.service.lock_period(2026, 1, h.admin).await.unwrap();

    let result = h.service.accept_pay_in(claim.id, h.admin).await;

    assert_eq!(
        result.unwrap_err(),
        CoreError::PeriodLocked {
            period: "2026-01".to_string(),
            context: "post income".to_string(),
        }
    );
    assert_eq!(h.income_count(&claim).await, 0);
    assert_eq!(
        h.service.pay_in(claim.id).await.unwrap().status,
        PayInStatus::Matched
    );
}

#[rstest::rstest]
#[case(Fault::Write(WriteKind::InsertIncome))]
#[case(Fault::Write(WriteKind::UpdatePayIn))]
#[case(Fault::Commit)]
#[tokio::test]
async fn test_accept_is_atomic_under_failure(#[case] fault: Fault) {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;
    h.store.inject(fault).unwrap();

    let result = h.service.accept_pay_in(claim.id, h.admin).await;

    assert!(matches!(result, Err(CoreError::Storage(_))));
    assert_eq!(h.income_count(&claim).await, 0);
    assert_eq!(h.service.pay_in(claim.id).await.unwrap(), claim);

    let retried = h.service.accept_pay_in(claim.id, h.admin).await.unwrap();
    assert!(retried.newly_posted);
    assert_eq!(h.income_count(&claim).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_post_once() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;

    let tasks = (0..8).map(|_| {
        let service = Arc::clone(&h.service);
        let (id, admin) = (claim.id, h.admin);
        tokio::spawn(async move { service.accept_pay_in(id, admin).await })
    });
    let outcomes: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.newly_posted).count(), 1);
    let income_id = outcomes[0].income.id;
    assert!(outcomes.iter().all(|o| o.income.id == income_id));
    assert_eq!(h.income_count(&claim).await, 1);
}

#[tokio::test]
async fn test_stray_income_is_integrity_error() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;

    let mut uow = h.store.begin().await.unwrap();
    let stray = crate::ledger::LedgerPoster::build_income(&claim, jan(30), h.admin, t0());
    uow.insert_income(&stray).await.unwrap();
    uow.commit().await.unwrap();

    let result = h.service.accept_pay_in(claim.id, h.admin).await;
    assert!(matches!(result, Err(CoreError::DataIntegrity(_))));
}

#[tokio::test]
async fn test_edit_committed_during_accept_is_kept() {
    let h = harness().await;
    let claim = h.claim(dec!(1000.00), 15, 28).await;

    let mut acceptor = h.store.begin().await.unwrap();
    let staged = h
        .service
        .stage_accept(&mut acceptor, claim.id, h.admin)
        .await
        .unwrap();
    assert_eq!(staged.income.amount, Money::new(dec!(1000.00)));

    h.service
        .edit_pay_in(claim.id, edit_amount(dec!(999.00)))
        .await
        .unwrap();

    assert!(matches!(acceptor.commit().await, Err(CoreError::Conflict(_))));
    assert_eq!(h.income_count(&claim).await, 0);

    let outcome = h.service.accept_pay_in(claim.id, h.admin).await.unwrap();
    assert_eq!(outcome.income.amount, Money::new(dec!(999.00)));
    assert_eq!(outcome.pay_in.amount, Money::new(dec!(999.00)));
}

#[tokio::test]
async fn test_lock_committed_during_accept_refuses_posting() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;

    let mut acceptor = h.store.begin().await.unwrap();
    h.service
        .stage_accept(&mut acceptor, claim.id, h.admin)
        .await
        .unwrap();

    let snapshot = h.service.lock_period(2026, 1, h.admin).await.unwrap();
    assert_eq!(snapshot.income_total, Money::ZERO);

    assert_eq!(
        acceptor.commit().await.unwrap_err(),
        CoreError::PeriodLocked {
            period: "2026-01".to_string(),
            context: "post into period".to_string(),
        }
    );
    assert_eq!(h.income_count(&claim).await, 0);
    assert_eq!(
        h.service.pay_in(claim.id).await.unwrap().status,
        PayInStatus::Matched
    );
}

#[tokio::test]
async fn test_lock_racing_committed_accept_conflicts() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;

    let mut locker = h.store.begin().await.unwrap();
    let period = YearMonth::new(2026, 1).unwrap();
    locker.hold_period(period, PeriodAccess::Lock).await.unwrap();
    let snapshot = PeriodService::lock(None, period, PeriodTotals::default(), h.admin, t0()).unwrap();
    locker.save_period_snapshot(&snapshot, None).await.unwrap();

    h.service.accept_pay_in(claim.id, h.admin).await.unwrap();

    assert!(matches!(locker.commit().await, Err(CoreError::Conflict(_))));
    let relocked = h.service.lock_period(2026, 1, h.admin).await.unwrap();
    assert_eq!(relocked.income_total, Money::new(dec!(1000.00)));
}

// ============================================================================
// Periods
// ============================================================================

#[tokio::test]
async fn test_lock_captures_totals() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;
    h.service.accept_pay_in(claim.id, h.admin).await.unwrap();

    let snapshot = h.service.lock_period(2026, 1, h.admin).await.unwrap();

    assert_eq!(snapshot.status, PeriodStatus::Locked);
    assert_eq!(snapshot.income_total, Money::new(dec!(1000)));
    assert_eq!(snapshot.credit_note_total, Money::ZERO);
    assert!(h.service.is_period_locked(jan(1)).await.unwrap());
    assert!(!h.service.is_period_locked(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()).await.unwrap());

    let again = h.service.lock_period(2026, 1, h.admin).await;
    assert!(matches!(again, Err(CoreError::InvalidState { .. })));
    assert!(matches!(
        h.service.lock_period(2026, 13, h.admin).await,
        Err(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unlock_is_audited_and_reopens() {
    let h = harness().await;
    let (claim, _) = h.matched_pair().await;
    let snapshot = h.service.lock_period(2026, 1, h.admin).await.unwrap();

    assert!(matches!(
        h.service.unlock_period(snapshot.id, " ", h.admin).await,
        Err(CoreError::Validation(_))
    ));

    let (unlocked, log) = h
        .service
        .unlock_period(snapshot.id, "late bank statement", h.admin)
        .await
        .unwrap();
    assert_eq!(unlocked.status, PeriodStatus::Draft);
    assert_eq!(log.previous_status, PeriodStatus::Locked);
    assert_eq!(log.unlocked_by, h.admin);
    assert_eq!(h.service.unlock_history(snapshot.id).await.unwrap(), vec![log]);

    assert!(matches!(
        h.service.unlock_period(snapshot.id, "again", h.admin).await,
        Err(CoreError::InvalidState { .. })
    ));

    h.service.accept_pay_in(claim.id, h.admin).await.unwrap();
    let relocked = h.service.lock_period(2026, 1, h.admin).await.unwrap();
    assert_eq!(relocked.id, snapshot.id);
    assert_eq!(relocked.income_total, Money::new(dec!(1000)));
}

#[tokio::test]
async fn test_assert_period_open_for_collaborators() {
    let h = harness().await;
    h.service.lock_period(2025, 12, h.admin).await.unwrap();

    let err = h
        .service
        .assert_period_open(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(), "record expense")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Period 2025-12 is locked; cannot record expense");
    assert!(h.service.assert_period_open(jan(1), "record expense").await.is_ok());
}

// ============================================================================
// Invoices and credit notes
// ============================================================================

fn invoice_input(h: &Harness, total: Decimal, issued_on: NaiveDate) -> NewInvoice {
    NewInvoice {
        house_id: h.house.id,
        total_amount: total,
        issued_on,
        due_on: issued_on + chrono::Duration::days(30),
    }
}

fn credit_request(invoice_id: moobaan_shared::types::InvoiceId, amount: Decimal) -> CreditNoteRequest {
    CreditNoteRequest {
        invoice_id,
        amount,
        reason: "common fee discount".to_string(),
        is_full_credit: false,
    }
}

#[tokio::test]
async fn test_scenario_e_credit_notes() {
    let h = harness().await;
    let invoice = h
        .service
        .create_invoice(invoice_input(&h, dec!(2000.00), jan(5)))
        .await
        .unwrap();

    h.service
        .issue_credit_note(credit_request(invoice.id, dec!(500.00)), h.admin)
        .await
        .unwrap();
    assert_eq!(
        h.service.outstanding_balance(invoice.id).await.unwrap(),
        Money::new(dec!(1500.00))
    );

    let err = h
        .service
        .issue_credit_note(credit_request(invoice.id, dec!(1600.00)), h.admin)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::CreditExceedsBalance {
            requested: Money::new(dec!(1600.00)),
            remaining: Money::new(dec!(1500.00)),
        }
    );
    assert_eq!(
        h.service.outstanding_balance(invoice.id).await.unwrap(),
        Money::new(dec!(1500.00))
    );
}

#[tokio::test]
async fn test_invoice_in_locked_period_refused() {
    let h = harness().await;
    h.service.lock_period(2025, 12, h.admin).await.unwrap();

    let result = h
        .service
        .create_invoice(invoice_input(&h, dec!(100), NaiveDate::from_ymd_opt(2025, 12, 20).unwrap()))
        .await;
    assert!(matches!(result, Err(CoreError::PeriodLocked { .. })));
}

#[tokio::test]
async fn test_credit_note_in_locked_month_refused() {
    let h = harness().await;
    let invoice = h
        .service
        .create_invoice(invoice_input(&h, dec!(100), jan(2)))
        .await
        .unwrap();
    h.service.lock_period(2026, 1, h.admin).await.unwrap();

    let result = h
        .service
        .issue_credit_note(credit_request(invoice.id, dec!(10)), h.admin)
        .await;
    assert!(matches!(result, Err(CoreError::PeriodLocked { .. })));
}

#[tokio::test]
async fn test_lock_counts_credit_notes_in_regional_month() {
    let h = harness().await;
    let invoice = h
        .service
        .create_invoice(invoice_input(&h, dec!(900), jan(3)))
        .await
        .unwrap();
    h.service
        .issue_credit_note(credit_request(invoice.id, dec!(120)), h.admin)
        .await
        .unwrap();

    let snapshot = h.service.lock_period(2026, 1, h.admin).await.unwrap();
    assert_eq!(snapshot.credit_note_total, Money::new(dec!(120)));
}

#[tokio::test]
async fn test_missing_invoice_not_found() {
    let h = harness().await;
    let result = h
        .service
        .outstanding_balance(moobaan_shared::types::InvoiceId::new())
        .await;
    assert!(matches!(result, Err(CoreError::NotFound { .. })));
}
