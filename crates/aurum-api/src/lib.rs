//! Aurum-api: HTTP API layer for Aurum
//!
//! Exposes the loan flow, wallet session, and KYC surfaces to the frontend.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{ApiStateError, AppState, FlowHandle};
