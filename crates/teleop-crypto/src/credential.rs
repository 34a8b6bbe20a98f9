// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verifiable credential envelope and verifier (§3, §4.1).

use std::collections::BTreeMap;
use std::collections::HashSet;

use ed25519_dalek::{Signature as EdSignature, Verifier as EdVerifier, VerifyingKey as EdVerifyingKey};
use p256::ecdsa::signature::Verifier as EcdsaVerifier;
use p256::ecdsa::{Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::did::DidCache;
use crate::error::{CryptoError, CryptoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialAlgorithm {
    Ed25519,
    EcdsaP256,
}

impl CredentialAlgorithm {
    pub fn parse(raw: &str) -> CryptoResult<Self> {
        match raw {
            "ed25519" => Ok(CredentialAlgorithm::Ed25519),
            "ecdsa-p256" => Ok(CredentialAlgorithm::EcdsaP256),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialHeader {
    /// Raw algorithm tag as carried on the wire; validated via
    /// [`CredentialAlgorithm::parse`] rather than at deserialization time so
    /// an unsupported algorithm surfaces as a typed `UnsupportedAlgorithm`
    /// instead of a generic parse failure.
    pub alg: String,
}

/// The claims carried by a credential, before signature verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub iss: String,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Additional attributes beyond `id`/`role`, flattened into the claim
    /// set the policy evaluator sees (§4.1 step 6).
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    pub header: CredentialHeader,
    pub payload: CredentialPayload,
    /// Raw signature bytes over the canonical serialization of `payload`.
    pub signature: Vec<u8>,
}

impl CredentialEnvelope {
    /// The bytes the issuer signed over: the canonical JSON serialization
    /// of the payload. Deterministic because `CredentialPayload`'s field
    /// order is fixed by its struct declaration.
    pub fn signing_data(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(&self.payload).map_err(|_| CryptoError::InvalidEnvelope)
    }

    /// Decode a raw envelope without verifying it (§4.1 step 1). A
    /// structurally-valid envelope with a missing `sub` claim is reported
    /// as `MissingCredentialClaim` rather than the generic `InvalidEnvelope`.
    pub fn from_json(raw: &[u8]) -> CryptoResult<Self> {
        let value: Value = serde_json::from_slice(raw).map_err(|_| CryptoError::InvalidEnvelope)?;
        let payload_has_sub = value
            .get("payload")
            .and_then(|p| p.get("sub"))
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !payload_has_sub {
            return Err(CryptoError::MissingCredentialClaim("sub".to_string()));
        }
        serde_json::from_value(value).map_err(|_| CryptoError::InvalidEnvelope)
    }
}

/// Extracted, policy-ready attributes for an already-verified credential.
#[derive(Debug, Clone)]
pub struct CredentialAttributes {
    pub issuer: String,
    pub subject: String,
    pub role: Option<String>,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct VerifiedCredential {
    pub issued_at: i64,
    pub expires_at: Option<i64>,
}

/// Mutable set of trusted issuer DIDs. Reads are frequent (every credential
/// verification); writes are rare (operator onboarding/offboarding).
#[derive(Default)]
pub struct TrustedIssuerSet {
    issuers: RwLock<HashSet<String>>,
}

impl TrustedIssuerSet {
    pub fn new() -> Self {
        TrustedIssuerSet::default()
    }

    pub fn add(&self, issuer: impl Into<String>) {
        self.issuers.write().insert(issuer.into());
    }

    pub fn remove(&self, issuer: &str) -> bool {
        self.issuers.write().remove(issuer)
    }

    pub fn is_trusted(&self, issuer: &str) -> bool {
        self.issuers.read().contains(issuer)
    }

    pub fn list(&self) -> Vec<String> {
        self.issuers.read().iter().cloned().collect()
    }
}

/// Default clock-skew tolerance applied to `nbf`/`exp` comparisons (§3).
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 60;

pub struct CredentialVerifier<'a> {
    pub trusted_issuers: &'a TrustedIssuerSet,
    pub clock_skew_secs: i64,
}

impl<'a> CredentialVerifier<'a> {
    pub fn new(trusted_issuers: &'a TrustedIssuerSet) -> Self {
        CredentialVerifier {
            trusted_issuers,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }

    pub fn with_skew(mut self, skew_secs: i64) -> Self {
        self.clock_skew_secs = skew_secs;
        self
    }

    /// Full verification per §4.1: trust, signature, validity window.
    pub fn verify(
        &self,
        envelope: &CredentialEnvelope,
        did_cache: &mut DidCache,
        now_unix: i64,
    ) -> CryptoResult<(CredentialAttributes, VerifiedCredential)> {
        if !self.trusted_issuers.is_trusted(&envelope.payload.iss) {
            return Err(CryptoError::UntrustedIssuer(envelope.payload.iss.clone()));
        }

        let document = did_cache
            .resolve(&envelope.payload.iss)
            .map_err(|e| CryptoError::IssuerResolutionFailed(e.to_string()))?;

        let signing_data = envelope.signing_data()?;
        let algorithm = CredentialAlgorithm::parse(&envelope.header.alg)?;
        match algorithm {
            CredentialAlgorithm::Ed25519 => {
                let key_bytes: [u8; 32] = document
                    .public_key
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let verifying_key =
                    EdVerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
                let sig_bytes: [u8; 64] = envelope
                    .signature
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                let signature = EdSignature::from_bytes(&sig_bytes);
                verifying_key
                    .verify(&signing_data, &signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
            }
            CredentialAlgorithm::EcdsaP256 => {
                let verifying_key = EcdsaVerifyingKey::from_sec1_bytes(&document.public_key)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let signature = EcdsaSignature::from_slice(&envelope.signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                verifying_key
                    .verify(&signing_data, &signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
            }
        }

        let skew = self.clock_skew_secs;
        if let Some(nbf) = envelope.payload.nbf {
            if now_unix < nbf - skew {
                return Err(CryptoError::NotYetValid);
            }
        }
        if let Some(exp) = envelope.payload.exp {
            if now_unix > exp + skew {
                return Err(CryptoError::Expired);
            }
        }

        let attributes = self.extract(envelope);
        Ok((
            attributes,
            VerifiedCredential {
                issued_at: envelope.payload.iat,
                expires_at: envelope.payload.exp,
            },
        ))
    }

    /// Extract attributes without verifying the signature — for debug
    /// tooling and the downstream step that has already verified (§4.1).
    pub fn extract(&self, envelope: &CredentialEnvelope) -> CredentialAttributes {
        CredentialAttributes {
            issuer: envelope.payload.iss.clone(),
            subject: envelope.payload.sub.clone(),
            role: envelope.payload.role.clone(),
            attributes: envelope.payload.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand_core::OsRng;

    fn signed_envelope(iss_signing_key: &SigningKey, did: &str, exp: Option<i64>, nbf: Option<i64>) -> CredentialEnvelope {
        let payload = CredentialPayload {
            iss: did.to_string(),
            sub: "operator-1".to_string(),
            role: Some("operator".to_string()),
            iat: 1_700_000_000,
            exp,
            nbf,
            attributes: BTreeMap::new(),
        };
        let signing_data = serde_json::to_vec(&payload).unwrap();
        let signature = iss_signing_key.sign(&signing_data);
        CredentialEnvelope {
            header: CredentialHeader {
                alg: "ed25519".to_string(),
            },
            payload,
            signature: signature.to_bytes().to_vec(),
        }
    }

    fn did_for(signing_key: &SigningKey) -> String {
        let verifying = signing_key.verifying_key();
        let mut bytes = vec![0xed_u8];
        bytes.extend_from_slice(verifying.as_bytes());
        format!("did:key:z{}", bs58::encode(bytes).into_string())
    }

    #[test]
    fn verifies_valid_ed25519_credential() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        issuers.add(did.clone());
        let envelope = signed_envelope(&signing_key, &did, Some(1_700_003_600), None);

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers);
        let (attrs, _verified) = verifier.verify(&envelope, &mut cache, 1_700_000_100).unwrap();
        assert_eq!(attrs.subject, "operator-1");
        assert_eq!(attrs.role.as_deref(), Some("operator"));
    }

    #[test]
    fn rejects_untrusted_issuer() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        let envelope = signed_envelope(&signing_key, &did, None, None);

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers);
        assert!(matches!(
            verifier.verify(&envelope, &mut cache, 1_700_000_100),
            Err(CryptoError::UntrustedIssuer(_))
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        issuers.add(did.clone());
        let mut envelope = signed_envelope(&signing_key, &did, None, None);
        envelope.payload.sub = "operator-2".to_string();

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers);
        assert!(matches!(
            verifier.verify(&envelope, &mut cache, 1_700_000_100),
            Err(CryptoError::SignatureInvalid)
        ));
    }

    #[test]
    fn rejects_expired_credential_at_exact_boundary_with_zero_skew() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        issuers.add(did.clone());
        let envelope = signed_envelope(&signing_key, &did, Some(1_700_000_000), None);

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers).with_skew(0);
        assert!(matches!(
            verifier.verify(&envelope, &mut cache, 1_700_000_000),
            Err(CryptoError::Expired)
        ));
    }

    #[test]
    fn accepts_credential_within_half_skew_past_expiry() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        issuers.add(did.clone());
        let envelope = signed_envelope(&signing_key, &did, Some(1_700_000_000), None);

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers).with_skew(60);
        assert!(verifier.verify(&envelope, &mut cache, 1_700_000_030).is_ok());
    }

    #[test]
    fn from_json_rejects_missing_subject_claim() {
        let raw = br#"{"header":{"alg":"ed25519"},"payload":{"iss":"did:key:z1","iat":1},"signature":[]}"#;
        assert!(matches!(
            CredentialEnvelope::from_json(raw),
            Err(CryptoError::MissingCredentialClaim(_))
        ));
    }

    #[test]
    fn from_json_rejects_malformed_json() {
        assert!(matches!(
            CredentialEnvelope::from_json(b"not json"),
            Err(CryptoError::InvalidEnvelope)
        ));
    }

    #[test]
    fn rejects_unsupported_algorithm() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        issuers.add(did.clone());
        let mut envelope = signed_envelope(&signing_key, &did, None, None);
        envelope.header.alg = "hmac-sha256".to_string();

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers);
        assert!(matches!(
            verifier.verify(&envelope, &mut cache, 1_700_000_100),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn rejects_not_yet_valid_credential() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_for(&signing_key);
        let issuers = TrustedIssuerSet::new();
        issuers.add(did.clone());
        let envelope = signed_envelope(&signing_key, &did, None, Some(1_700_000_000));

        let mut cache = DidCache::with_defaults();
        let verifier = CredentialVerifier::new(&issuers).with_skew(10);
        assert!(matches!(
            verifier.verify(&envelope, &mut cache, 1_699_999_900),
            Err(CryptoError::NotYetValid)
        ));
    }
}
