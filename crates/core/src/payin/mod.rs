//! Pay-in lifecycle management.
//!
//! A pay-in is a resident's claim to have transferred money to the village
//! account. This module implements the claim's state machine:
//!
//! - `types` - PayIn record, status and source
//! - `service` - Pure state transitions over `PayIn` values

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::{Acceptance, PayInService};
pub use types::{ClaimedTransfer, NewPayIn, PayIn, PayInEdit, PayInSource, PayInStatus};
