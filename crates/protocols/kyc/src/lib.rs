//! KYC identity submissions
//!
//! Captures the wizard's final identity submission and the admin review
//! that approves or rejects it. Submissions live in a client-local JSON
//! store keyed by submission id and are never deleted.

pub mod store;
pub mod types;

pub use store::KycStore;
pub use types::*;
