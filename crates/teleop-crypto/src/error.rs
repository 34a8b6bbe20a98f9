// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors for credential verification, DID resolution and capability
//! tokens (§4.1, §4.2, §4.4, §7).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("credential envelope is malformed")]
    InvalidEnvelope,
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("issuer {0:?} is not trusted")]
    UntrustedIssuer(String),
    #[error("failed to resolve issuer key: {0}")]
    IssuerResolutionFailed(String),
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("credential or token has expired")]
    Expired,
    #[error("credential is not yet valid")]
    NotYetValid,
    #[error("credential is missing a required claim: {0}")]
    MissingCredentialClaim(String),

    #[error("DID {0:?} is malformed")]
    InvalidDid(String),
    #[error("DID method {0:?} is not supported")]
    UnsupportedMethod(String),
    #[error("DID multibase payload is malformed")]
    InvalidMultibase,
    #[error("DID key type is not supported")]
    UnsupportedKeyType,
    #[error("DID public key bytes are invalid")]
    InvalidPublicKey,
}

impl CryptoError {
    /// HTTP-status-adjacent classification used by the Gateway's HTTP
    /// surface to map a verification failure to 400 vs 403 (§7).
    pub fn is_temporal(&self) -> bool {
        matches!(self, CryptoError::Expired | CryptoError::NotYetValid)
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
