//! Operator authentication.
//!
//! The full role model (zone admins, referees) lives in the surrounding
//! platform; this API only needs to know that the caller is an authorized
//! operator. Callers present the shared operator key as a bearer token and
//! may identify themselves with an `X-Operator-Id` header, which becomes
//! the batch's `sent_by`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use fairway_common::error::AppError;

use crate::state::AppState;

/// Fallback operator identity when no `X-Operator-Id` header is present.
const DEFAULT_OPERATOR: &str = "api";

/// Authenticated operator extracted from the request headers.
#[derive(Debug, Clone)]
pub struct AuthOperator {
    pub operator: String,
}

impl FromRequestParts<AppState> for AuthOperator {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let expected = state.config.operator_api_key.clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let operator = parts
            .headers
            .get("x-operator-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| DEFAULT_OPERATOR.to_string());

        async move {
            if let Some(auth) = auth_header
                && let Some(token) = auth.strip_prefix("Bearer ")
                && token == expected
            {
                return Ok(AuthOperator { operator });
            }

            Err(AppError::Forbidden(
                "Missing or invalid operator key. Use 'Authorization: Bearer <key>'".to_string(),
            ))
        }
    }
}
