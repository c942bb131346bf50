//! AuthProvider port - resolves bearer credentials to a user id.
//!
//! Only the HTTP boundary uses this; domain guards work off the deal's
//! own party records, never off tokens.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// Port for verifying caller identity.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verifies a bearer token and returns the acting user id.
    ///
    /// # Errors
    ///
    /// - `NotAuthorized` for missing, malformed or expired credentials
    async fn verify(&self, token: &str) -> Result<UserId, DomainError>;
}
