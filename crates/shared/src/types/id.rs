//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `HouseId` where a `PayInId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
///
/// IDs are ordered by their inner UUID. Because new IDs are UUID v7 the
/// ordering follows creation time, which the matcher relies on for
/// lowest-id tie breaking.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user (resident or admin).");
typed_id!(HouseId, "Unique identifier for a house.");
typed_id!(MembershipId, "Unique identifier for a resident membership.");
typed_id!(PayInId, "Unique identifier for a pay-in claim.");
typed_id!(
    BankTransactionId,
    "Unique identifier for an imported bank statement row."
);
typed_id!(
    IncomeTransactionId,
    "Unique identifier for a posted income record."
);
typed_id!(InvoiceId, "Unique identifier for an invoice.");
typed_id!(CreditNoteId, "Unique identifier for a credit note.");
typed_id!(PeriodSnapshotId, "Unique identifier for a period snapshot.");
typed_id!(UnlockLogId, "Unique identifier for a period unlock log entry.");
