//! Authentication configuration.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// JWT verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the identity service.
    pub jwt_secret: SecretString,
}

impl AuthConfig {
    /// Validate authentication configuration.
    ///
    /// Production requires a non-trivial secret; development tolerates
    /// short local secrets.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"));
        }
        if *environment == Environment::Production && secret.len() < 32 {
            return Err(ValidationError::invalid(
                "AUTH_JWT_SECRET",
                "must be at least 32 bytes in production",
            ));
        }
        Ok(())
    }
}
