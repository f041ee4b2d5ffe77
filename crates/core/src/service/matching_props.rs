//! Property-based tests for match links under random operation sequences.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use moobaan_shared::types::UserId;

use super::{BillingService, ReconciliationSettings};
use crate::bank::{BankStatementRow, BankTransaction};
use crate::clock::FixedClock;
use crate::error::CoreError;
use crate::payin::{ClaimedTransfer, NewPayIn, PayIn, PayInSource, PayInStatus};
use crate::store::{BillingStore, InMemoryStore, UnitOfWork};

const PAY_INS: usize = 4;
const CREDITS: usize = 4;

/// (amount, local hour, local minute) of each claim.
const CLAIMS: [(i64, u32, u32); PAY_INS] = [(100, 10, 0), (100, 10, 0), (200, 11, 0), (300, 12, 0)];

/// (amount, local hour, minute, second) of each credit.
const STATEMENT: [(i64, u32, u32, u32); CREDITS] =
    [(100, 10, 0, 30), (100, 10, 0, 10), (200, 11, 0, 59), (300, 15, 0, 0)];

#[derive(Debug, Clone)]
enum Op {
    ManualMatch(usize, usize),
    ManualUnmatch(usize),
    Reject(usize),
    Resubmit(usize),
    Accept(usize),
    AutoMatch,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PAY_INS, 0..CREDITS).prop_map(|(p, t)| Op::ManualMatch(p, t)),
        (0..CREDITS).prop_map(Op::ManualUnmatch),
        (0..PAY_INS).prop_map(Op::Reject),
        (0..PAY_INS).prop_map(Op::Resubmit),
        (0..PAY_INS).prop_map(Op::Accept),
        Just(Op::AutoMatch),
    ]
}

struct World {
    service: BillingService<InMemoryStore, FixedClock>,
    pay_ins: Vec<PayIn>,
    credits: Vec<BankTransaction>,
    admin: UserId,
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
}

async fn world() -> World {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 30, 9, 0, 0).unwrap());
    let service = BillingService::new(InMemoryStore::new(), clock, ReconciliationSettings::default());
    let admin = UserId::new();
    let house = service.register_house("B-7").await.unwrap();

    let mut pay_ins = Vec::new();
    for (amount, hour, minute) in CLAIMS {
        let claim = service
            .create_pay_in(NewPayIn {
                house_id: house.id,
                amount: Decimal::from(amount),
                claimed: ClaimedTransfer::new(day(), hour, minute),
                source: PayInSource::AdminCreated,
                created_by: admin,
                submit_immediately: true,
            })
            .await
            .unwrap();
        pay_ins.push(claim);
    }

    let mut credits = Vec::new();
    for (amount, hour, minute, second) in STATEMENT {
        let txn = service
            .import_bank_transaction(BankStatementRow {
                occurred_at: day().and_hms_opt(hour, minute, second).unwrap(),
                credit: Some(Decimal::from(amount)),
                debit: None,
                description: "transfer".to_string(),
                bank_reference: None,
            })
            .await
            .unwrap();
        credits.push(txn);
    }

    World {
        service,
        pay_ins,
        credits,
        admin,
    }
}

impl World {
    async fn apply(&self, op: &Op) -> Result<(), CoreError> {
        let service = &self.service;
        match *op {
            Op::ManualMatch(p, t) => service
                .manual_match(self.pay_ins[p].id, self.credits[t].id, self.admin)
                .await
                .map(drop),
            Op::ManualUnmatch(t) => service.manual_unmatch(self.credits[t].id, self.admin).await.map(drop),
            Op::Reject(p) => service.reject_pay_in(self.pay_ins[p].id, "amount off").await.map(drop),
            Op::Resubmit(p) => service.submit_pay_in(self.pay_ins[p].id).await.map(drop),
            Op::Accept(p) => service.accept_pay_in(self.pay_ins[p].id, self.admin).await.map(drop),
            Op::AutoMatch => service.run_automatic_match().await.map(drop),
        }
    }

    /// Returns a description of the first broken link invariant.
    async fn broken_link(&self) -> Option<String> {
        let mut uow = self.service.store().begin().await.unwrap();
        let mut pay_ins = HashMap::new();
        for claim in &self.pay_ins {
            pay_ins.insert(claim.id, uow.pay_in(claim.id).await.unwrap().unwrap());
        }
        let mut credits = HashMap::new();
        for txn in &self.credits {
            credits.insert(txn.id, uow.bank_transaction(txn.id).await.unwrap().unwrap());
        }

        for pay_in in pay_ins.values() {
            match pay_in.matched_bank_transaction_id {
                Some(txn_id) => {
                    if credits[&txn_id].matched_pay_in_id != Some(pay_in.id) {
                        return Some(format!("pay-in {} links {txn_id}, which does not link back", pay_in.id));
                    }
                    if !matches!(pay_in.status, PayInStatus::Matched | PayInStatus::Accepted) {
                        return Some(format!("pay-in {} is linked while {}", pay_in.id, pay_in.status));
                    }
                }
                None if pay_in.status == PayInStatus::Matched => {
                    return Some(format!("pay-in {} is MATCHED without a link", pay_in.id));
                }
                None => {}
            }
        }
        for txn in credits.values() {
            if let Some(pay_in_id) = txn.matched_pay_in_id {
                if pay_ins[&pay_in_id].matched_bank_transaction_id != Some(txn.id) {
                    return Some(format!("transaction {} links {pay_in_id}, which does not link back", txn.id));
                }
            }
        }
        None
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any sequence of operations keeps links one-to-one and symmetric, and
    /// failures are always ordinary refusals.
    #[test]
    fn prop_links_stay_one_to_one(ops in prop::collection::vec(arb_op(), 1..40)) {
        let rt = runtime();
        let failure = rt.block_on(async {
            let world = world().await;
            for (step, op) in ops.iter().enumerate() {
                if let Err(err) = world.apply(op).await {
                    if matches!(err, CoreError::DataIntegrity(_) | CoreError::Storage(_)) {
                        return Some(format!("step {step} {op:?} failed internally: {err}"));
                    }
                }
                if let Some(broken) = world.broken_link().await {
                    return Some(format!("after step {step} {op:?}: {broken}"));
                }
            }
            None
        });
        prop_assert_eq!(failure, None);
    }

    /// A transaction is never linked by two pay-ins.
    #[test]
    fn prop_no_double_link(ops in prop::collection::vec(arb_op(), 1..40)) {
        let rt = runtime();
        let holders = rt.block_on(async {
            let world = world().await;
            for op in &ops {
                let _ = world.apply(op).await;
            }
            let mut uow = world.service.store().begin().await.unwrap();
            let mut holders: HashMap<_, usize> = HashMap::new();
            for claim in &world.pay_ins {
                let stored = uow.pay_in(claim.id).await.unwrap().unwrap();
                if let Some(txn_id) = stored.matched_bank_transaction_id {
                    *holders.entry(txn_id).or_default() += 1;
                }
            }
            holders.into_values().max().unwrap_or(0)
        });
        prop_assert!(holders <= 1);
    }
}
