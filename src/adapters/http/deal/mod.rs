//! Deal REST API.

mod dto;
mod handlers;
mod routes;

pub use dto::*;
pub use handlers::{ApiError, DealAppState};
pub use routes::{deal_router, deal_routes};
