// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DID resolution, verifiable-credential verification and capability
//! tokens (§4.1, §4.2, §4.4).

pub mod credential;
pub mod did;
pub mod error;
pub mod token;

pub use credential::{CredentialAttributes, CredentialVerifier, TrustedIssuerSet, VerifiedCredential};
pub use did::{resolve_did_key, DidCache, DidDocument};
pub use error::{CryptoError, CryptoResult};
pub use token::{CapabilityToken, JwksDocument, Jwk, KeyManager};
