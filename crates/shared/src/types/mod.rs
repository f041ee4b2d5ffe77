//! Common types used across the application.

pub mod id;
pub mod money;
pub mod time;

pub use id::*;
pub use money::{Money, MoneyError};
pub use time::{RegionalOffset, TimeError};
