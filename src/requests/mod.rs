//! Student Requests
//!
//! Teachers propose adding or removing students; admins approve or reject.

pub mod api;
pub mod ledger;
pub mod models;
pub mod workflow;

pub use ledger::RequestLedger;
pub use workflow::ApprovalWorkflow;
