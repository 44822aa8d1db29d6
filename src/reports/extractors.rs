use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use ring::hmac;

use crate::state::AppState;

/// Guards operator endpoints with `Authorization: Bearer <ADMIN_TOKEN>`.
/// Without a configured token the endpoints do not exist.
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err((StatusCode::NOT_FOUND, "not found".into()));
        };

        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".into()))?;

        if !token_matches(token.trim(), expected) {
            return Err((StatusCode::UNAUTHORIZED, "invalid token".into()));
        }
        Ok(AdminAuth)
    }
}

/// Compares HMACs keyed by the expected token, so timing does not leak the token.
fn token_matches(provided: &str, expected: &str) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, expected.as_bytes());
    let tag = hmac::sign(&key, expected.as_bytes());
    hmac::verify(&key, provided.as_bytes(), tag.as_ref()).is_ok()
}
