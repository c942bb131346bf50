//! Authentication adapters.

mod jwt;

pub use jwt::{JwtAuthProvider, JwtClaims};
