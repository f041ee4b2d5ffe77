//! Accounting period snapshots and the lock guard.

pub mod guard;
pub mod types;

pub use guard::{PeriodLockGuard, PeriodService, PeriodTotals};
pub use types::{PeriodSnapshot, PeriodStatus, PeriodUnlockLog, YearMonth};
