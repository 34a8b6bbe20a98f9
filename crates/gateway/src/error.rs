// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the Gateway HTTP surface (§4.8, §6, §7).
///
/// Credential/DID/policy failures (§4.1–§4.3) map to 400/403; token
/// issuance and registry failures (§4.4–§4.6) map to 500; oversized audit
/// payloads map to 413.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayError {
    Unauthorized,
    BadRequest,
    Denied,
    SessionNotFound,
    NothingRevoked,
    PayloadTooLarge,
    Internal,
}

impl GatewayError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::Denied => 403,
            Self::SessionNotFound => 404,
            Self::NothingRevoked => 404,
            Self::PayloadTooLarge => 413,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Denied => "DENIED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::NothingRevoked => "NOTHING_REVOKED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            code: self.as_str().to_owned(),
            message: message.into(),
        }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.to_error_body(message),
        };
        (status, Json(body))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Classify a credential-verification failure for the HTTP response.
pub fn classify_credential_error(err: &teleop_crypto::CryptoError) -> GatewayError {
    use teleop_crypto::CryptoError::*;
    match err {
        Expired | NotYetValid => GatewayError::Denied,
        UntrustedIssuer(_) | SignatureInvalid => GatewayError::Denied,
        _ => GatewayError::BadRequest,
    }
}
