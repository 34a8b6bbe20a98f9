// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token guard for the admin surface.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::state::GatewayState;

/// Byte-length and content of the admin token must never be recoverable by
/// timing the comparison, so every byte pair is XORed regardless of an
/// early mismatch.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate the Bearer token guarding `/v1/revocations`. `expected == None`
/// means no admin token was configured, which disables the check rather
/// than rejecting every request.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), GatewayError> {
    let expected = match expected {
        Some(tok) => tok,
        None => return Ok(()),
    };

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(GatewayError::Unauthorized)?;
    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(GatewayError::Unauthorized)
    }
}

/// Axum middleware guarding `/v1/revocations`; every other route is either
/// self-authenticating (credential envelope, capability token) or public
/// (`/v1/jwks`).
pub async fn admin_auth_layer(
    state: State<Arc<GatewayState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(code) = validate_bearer(req.headers(), state.config.admin_token.as_deref()) {
        return code.to_http_response("unauthorized").into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn no_expected_token_always_passes() {
        let headers = HeaderMap::new();
        assert!(validate_bearer(&headers, None).is_ok());
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        assert_eq!(validate_bearer(&headers, Some("secret")), Err(GatewayError::Unauthorized));
    }

    #[test]
    fn matching_bearer_token_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert!(validate_bearer(&headers, Some("secret")).is_ok());
    }

    #[test]
    fn mismatched_bearer_token_fails() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert_eq!(validate_bearer(&headers, Some("secret")), Err(GatewayError::Unauthorized));
    }
}
