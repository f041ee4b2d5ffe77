//! Invoices and the append-only credit note ledger.

pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use service::CreditNoteService;
pub use types::{CreditNote, CreditNoteRequest, Invoice, NewInvoice};
