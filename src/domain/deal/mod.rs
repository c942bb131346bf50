//! Deal aggregate - the root of one negotiated engagement.

mod aggregate;
mod status;

pub use aggregate::{Deal, DealRole};
pub use status::DealStatus;
