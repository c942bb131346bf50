//! HTTP adapters - REST API implementations.

pub mod deal;
pub mod middleware;

pub use deal::{deal_router, DealAppState};
