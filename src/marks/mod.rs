//! Marks
//!
//! Exam results per student and their CSV report.

pub mod api;
pub mod models;
pub mod store;

pub use store::MarksStore;
