//! Application configuration.
//!
//! Loaded from environment variables (optionally via a `.env` file)
//! using double-underscore nesting, e.g. `SERVER__PORT=8080`,
//! `DATABASE__URL=postgres://...`, `AUTH__JWT_SECRET=...`,
//! `ESCROW__COMMISSION_PERCENT=10`.

mod auth;
mod database;
mod error;
mod escrow;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use escrow::EscrowConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub escrow: EscrowConfig,
}

impl AppConfig {
    /// Loads configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.escrow.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/dealdesk".to_string(),
                max_connections: 5,
                connect_timeout_secs: 5,
            },
            auth: AuthConfig {
                jwt_secret: SecretString::new("local-dev-secret".to_string()),
            },
            escrow: EscrowConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validation_surfaces_section_errors() {
        let mut config = valid_config();
        config.escrow.commission_percent = 200;
        assert!(config.validate().is_err());
    }
}
