// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability token codec and key manager (§3, §4.4, §6).
//!
//! The wire format is a compact JWT-shaped envelope: base64url(header) `.`
//! base64url(payload) `.` base64url(signature), header
//! `{alg: EdDSA, typ: JWT, kid}`, payload
//! `{sub, aud, sid, scope[], iat, exp, jti, nonce}`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CryptoError, CryptoResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub sub: String,
    pub aud: String,
    pub sid: String,
    pub scope: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub nonce: String,
}

#[derive(Debug, Clone)]
pub struct CapabilityToken {
    pub header: TokenHeader,
    pub payload: TokenPayload,
    pub signature: Vec<u8>,
}

const DEFAULT_CLOCK_SKEW_SECS: i64 = 30;

impl CapabilityToken {
    fn signing_input(header: &TokenHeader, payload: &TokenPayload) -> CryptoResult<String> {
        let header_json = serde_json::to_vec(header).map_err(|_| CryptoError::InvalidEnvelope)?;
        let payload_json = serde_json::to_vec(payload).map_err(|_| CryptoError::InvalidEnvelope)?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(payload_json)
        ))
    }

    /// Render the compact three-segment wire form.
    pub fn encode(&self) -> CryptoResult<String> {
        let input = Self::signing_input(&self.header, &self.payload)?;
        Ok(format!("{}.{}", input, URL_SAFE_NO_PAD.encode(&self.signature)))
    }

    /// Parse a compact token string without verifying its signature.
    pub fn decode(raw: &str) -> CryptoResult<Self> {
        let mut parts = raw.split('.');
        let header_b64 = parts.next().ok_or(CryptoError::InvalidEnvelope)?;
        let payload_b64 = parts.next().ok_or(CryptoError::InvalidEnvelope)?;
        let sig_b64 = parts.next().ok_or(CryptoError::InvalidEnvelope)?;
        if parts.next().is_some() {
            return Err(CryptoError::InvalidEnvelope);
        }

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| CryptoError::InvalidEnvelope)?;
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| CryptoError::InvalidEnvelope)?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| CryptoError::InvalidEnvelope)?;

        let header: TokenHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| CryptoError::InvalidEnvelope)?;
        let payload: TokenPayload =
            serde_json::from_slice(&payload_bytes).map_err(|_| CryptoError::InvalidEnvelope)?;

        Ok(CapabilityToken {
            header,
            payload,
            signature,
        })
    }

    /// Verify the signature against a known verifying key (looked up by
    /// `header.kid` by the caller via the key manager / JWKS).
    pub fn verify_signature(&self, verifying_key: &VerifyingKey) -> CryptoResult<()> {
        let input = Self::signing_input(&self.header, &self.payload)?;
        let sig_bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::SignatureInvalid)?;
        let signature = Signature::from_bytes(&sig_bytes);
        verifying_key
            .verify(input.as_bytes(), &signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }

    pub fn is_expired_with_skew(&self, now_unix: i64, skew_secs: i64) -> bool {
        now_unix > self.payload.exp + skew_secs
    }

    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.is_expired_with_skew(now_unix, DEFAULT_CLOCK_SKEW_SECS)
    }

    /// Validate signature, audience, session binding and expiry together.
    pub fn validate(
        &self,
        verifying_key: &VerifyingKey,
        expected_audience: &str,
        expected_session: &str,
        now_unix: i64,
        skew_secs: i64,
    ) -> CryptoResult<()> {
        self.verify_signature(verifying_key)?;
        if self.payload.aud != expected_audience {
            return Err(CryptoError::InvalidEnvelope);
        }
        if self.payload.sid != expected_session {
            return Err(CryptoError::InvalidEnvelope);
        }
        if self.is_expired_with_skew(now_unix, skew_secs) {
            return Err(CryptoError::Expired);
        }
        Ok(())
    }
}

/// Holds the Gateway's one active signing key and mints tokens.
pub struct KeyManager {
    signing_key: SigningKey,
    kid: String,
}

impl KeyManager {
    /// Development bootstrap: an ephemeral key generated at process start.
    /// Production loads a key from secure storage (out of scope, §4.4).
    pub fn generate_ephemeral() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        KeyManager {
            signing_key,
            kid: Uuid::new_v4().to_string(),
        }
    }

    pub fn from_signing_key(signing_key: SigningKey, kid: String) -> Self {
        KeyManager { signing_key, kid }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_jwk(&self) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: URL_SAFE_NO_PAD.encode(self.verifying_key().as_bytes()),
            alg: "EdDSA".to_string(),
            key_use: "sig".to_string(),
            kid: self.kid.clone(),
        }
    }

    /// Mint a capability token per §4.4's `Generate` contract.
    pub fn generate(
        &self,
        operator: &str,
        robot: &str,
        session: &str,
        allowed_actions: Vec<String>,
        now_unix: i64,
        ttl_seconds: i64,
    ) -> CryptoResult<(CapabilityToken, i64, String)> {
        let jti = Uuid::new_v4().to_string();
        let header = TokenHeader {
            alg: "EdDSA".to_string(),
            typ: "JWT".to_string(),
            kid: self.kid.clone(),
        };
        let exp = now_unix + ttl_seconds;
        let payload = TokenPayload {
            sub: operator.to_string(),
            aud: robot.to_string(),
            sid: session.to_string(),
            scope: allowed_actions,
            iat: now_unix,
            exp,
            jti: jti.clone(),
            nonce: random_nonce(),
        };
        let signing_input = CapabilityToken::signing_input(&header, &payload)?;
        let signature = self.signing_key.sign(signing_input.as_bytes());
        Ok((
            CapabilityToken {
                header,
                payload,
                signature: signature.to_bytes().to_vec(),
            },
            exp,
            jti,
        ))
    }
}

fn random_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A single published verification key, JWK-shaped (RFC 7517 `OKP`/Ed25519).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

impl JwksDocument {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

pub fn jwk_to_verifying_key(jwk: &Jwk) -> CryptoResult<VerifyingKey> {
    if jwk.kty != "OKP" || jwk.crv != "Ed25519" {
        return Err(CryptoError::UnsupportedKeyType);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(&jwk.x)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let key_bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::InvalidPublicKey)
}
