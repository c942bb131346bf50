//! JWT bearer token verification (HS256).
//!
//! Resolves the acting user id from a signed bearer token. Roles
//! relative to a deal are never encoded in the token; the aggregate
//! decides who is the advertiser and who is the creator.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::AuthProvider;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiry as Unix seconds.
    pub exp: usize,
}

/// HS256 token verifier.
pub struct JwtAuthProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    /// Creates a verifier from the shared signing secret.
    pub fn new(secret: &SecretString) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn verify(&self, token: &str) -> Result<UserId, DomainError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| {
                DomainError::not_authorized("Invalid or expired access token")
                    .with_detail("reason", err.to_string())
            })?;
        UserId::new(data.claims.sub).map_err(|_| {
            DomainError::not_authorized("Access token carries an empty subject")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn secret() -> SecretString {
        SecretString::new("test-signing-secret".to_string())
    }

    fn token_for(sub: &str, exp_offset_secs: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        let claims = JwtClaims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-signing-secret".as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn verify_accepts_a_valid_token() {
        let provider = JwtAuthProvider::new(&secret());
        let user = provider.verify(&token_for("adv-1", 3600)).await.unwrap();
        assert_eq!(user.as_str(), "adv-1");
    }

    #[tokio::test]
    async fn verify_rejects_an_expired_token() {
        let provider = JwtAuthProvider::new(&secret());
        let err = provider.verify(&token_for("adv-1", -3600)).await.unwrap_err();
        assert_eq!(err.code, crate::domain::foundation::ErrorCode::NotAuthorized);
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let provider = JwtAuthProvider::new(&secret());
        assert!(provider.verify("not-a-token").await.is_err());
    }
}
