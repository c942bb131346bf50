//! Bearer authentication middleware.
//!
//! Verifies the Authorization header through the AuthProvider port and
//! injects the resolved `UserId` into request extensions. Handlers read
//! it via `Extension<UserId>`; whether that user is a party to the deal
//! is decided by the aggregate, not here.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;

use crate::adapters::http::deal::{ApiError, DealAppState};
use crate::domain::foundation::DomainError;

/// Extracts and verifies the bearer token, rejecting the request when
/// it is missing or invalid.
pub async fn require_auth(
    State(state): State<DealAppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::from(DomainError::not_authorized("Missing bearer token"))
        })?;

    let user = state.auth.verify(token).await.map_err(ApiError::from)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
