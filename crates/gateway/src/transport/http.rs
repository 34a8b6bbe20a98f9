// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the Gateway's thin surface (§4.8).

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teleop_crypto::credential::CredentialEnvelope;
use teleop_crypto::CredentialVerifier;
use teleop_policy::{evaluate, Decision, EvaluationContext};
use teleop_proto::{AuditEvent, AuditEventType};

use crate::error::{classify_credential_error, GatewayError};
use crate::registry::RegistryEntry;
use crate::state::GatewayState;

// -- Request/response types --------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub robot_id: String,
    pub operator_id: String,
    pub credential: serde_json::Value,
    #[serde(default)]
    pub requested_scope: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IceServer {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub token: String,
    pub signaling_url: String,
    pub ice_servers: Vec<IceServer>,
    pub expires_at: DateTime<Utc>,
    pub effective_scope: Vec<String>,
    pub policy_id: String,
    pub policy_version: u64,
}

#[derive(Debug, Deserialize)]
pub struct RevocationRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub operator_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevocationResponse {
    pub revocation_id: String,
    pub affected_sessions: Vec<String>,
    pub revoked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AuditAcceptedResponse {
    pub accepted: bool,
}

// -- Handlers -----------------------------------------------------------------

/// `POST /v1/sessions` (§4.8): verify credential, evaluate policy, mint and
/// register a capability token on allow.
pub async fn create_session(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<SessionRequest>,
) -> impl IntoResponse {
    let now = Utc::now();

    state.audit.publish(
        AuditEvent::new(AuditEventType::SessionRequested, "", req.robot_id.clone())
            .with_operator(req.operator_id.clone()),
    );

    let credential_bytes = match serde_json::to_vec(&req.credential) {
        Ok(bytes) => bytes,
        Err(_) => return GatewayError::BadRequest.to_http_response("malformed credential").into_response(),
    };
    let envelope = match CredentialEnvelope::from_json(&credential_bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            deny_audit(&state, &req, "credential decode failed");
            return classify_credential_error(&e)
                .to_http_response(format!("credential invalid: {e}"))
                .into_response();
        }
    };

    let verifier = CredentialVerifier::new(&state.trusted_issuers).with_skew(state.config.clock_skew_secs);
    let (attributes, _verified) = {
        let mut did_cache = state.did_cache.lock();
        match verifier.verify(&envelope, &mut did_cache, now.timestamp()) {
            Ok(pair) => pair,
            Err(e) => {
                deny_audit(&state, &req, "credential verification failed");
                return classify_credential_error(&e)
                    .to_http_response(format!("credential verification failed: {e}"))
                    .into_response();
            }
        }
    };

    let Some(policy) = state.policy_store.get(&req.robot_id) else {
        deny_audit(&state, &req, "no policy registered for robot");
        return GatewayError::Denied.to_http_response("no policy registered for robot").into_response();
    };

    let mut ctx = EvaluationContext::new()
        .with("time", now.timestamp())
        .with("resource", req.robot_id.clone())
        .with("action", serde_json::to_value(&req.requested_scope).unwrap_or_default())
        .with("issuer", attributes.issuer.clone())
        .with("subject", attributes.subject.clone());
    if let Some(role) = &attributes.role {
        ctx.insert("role", role.clone());
    }
    ctx.insert("credential", serde_json::to_value(&attributes.attributes).unwrap_or_default());

    let result = evaluate(&policy, &ctx, &req.requested_scope);
    if result.decision != Decision::Allow {
        let reason = result.reason.clone().unwrap_or_else(|| "denied by policy".to_string());
        state.audit.publish(
            AuditEvent::new(AuditEventType::SessionDenied, "", req.robot_id.clone())
                .with_operator(req.operator_id.clone())
                .with_policy_hash(policy.content_hash.clone())
                .with_metadata("reason", serde_json::json!(reason)),
        );
        return GatewayError::Denied.to_http_response(reason).into_response();
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let (token, exp, jti) = match state.key_manager.generate(
        &req.operator_id,
        &req.robot_id,
        &session_id,
        result.allowed_actions.clone(),
        now.timestamp(),
        state.config.token_ttl_secs,
    ) {
        Ok(minted) => minted,
        Err(_) => return GatewayError::Internal.to_http_response("token issuance failed").into_response(),
    };

    let encoded = match token.encode() {
        Ok(encoded) => encoded,
        Err(_) => return GatewayError::Internal.to_http_response("token encoding failed").into_response(),
    };

    let expires_at = DateTime::from_timestamp(exp, 0).unwrap_or(now);
    state.registry.register(RegistryEntry {
        token_id: jti,
        session_id: session_id.clone(),
        operator_id: req.operator_id.clone(),
        robot_id: req.robot_id.clone(),
        expires_at,
    });

    state.audit.publish(
        AuditEvent::new(AuditEventType::SessionGranted, session_id.clone(), req.robot_id.clone())
            .with_operator(req.operator_id.clone())
            .with_policy_hash(policy.content_hash.clone())
            .with_metadata("effective_scope", serde_json::json!(result.allowed_actions)),
    );

    let ice_servers = ice_servers(&state);
    Json(SessionResponse {
        session_id: session_id.clone(),
        token: encoded,
        signaling_url: format!("ws://{}:{}/v1/signal?session_id={session_id}", state.config.host, state.config.port),
        ice_servers,
        expires_at,
        effective_scope: result.allowed_actions,
        policy_id: policy.id,
        policy_version: policy.version,
    })
    .into_response()
}

fn deny_audit(state: &GatewayState, req: &SessionRequest, reason: &str) {
    state.audit.publish(
        AuditEvent::new(AuditEventType::SessionDenied, "", req.robot_id.clone())
            .with_operator(req.operator_id.clone())
            .with_metadata("reason", serde_json::json!(reason)),
    );
}

fn ice_servers(state: &GatewayState) -> Vec<IceServer> {
    let mut servers = Vec::new();
    if !state.config.stun_servers.is_empty() {
        servers.push(IceServer { urls: state.config.stun_servers.clone() });
    }
    if !state.config.turn_servers.is_empty() {
        servers.push(IceServer { urls: state.config.turn_servers.clone() });
    }
    servers
}

/// `POST /v1/revocations` (§4.8, §4.5): revoke by session or by operator.
/// An idempotent no-op (404) when nothing matched (§9 open question).
pub async fn create_revocation(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RevocationRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let affected = match (&req.session_id, &req.operator_id) {
        (Some(session_id), _) => {
            if state.revoke_session(session_id, req.reason.clone()) == 0 {
                Vec::new()
            } else {
                vec![session_id.clone()]
            }
        }
        (None, Some(operator_id)) => state.revoke_operator(operator_id, req.reason.clone()),
        (None, None) => {
            return GatewayError::BadRequest
                .to_http_response("one of session_id or operator_id is required")
                .into_response()
        }
    };

    if affected.is_empty() {
        return GatewayError::NothingRevoked.to_http_response("nothing matched the revocation request").into_response();
    }

    for session_id in &affected {
        state.audit.publish(
            AuditEvent::new(AuditEventType::SessionRevoked, session_id.clone(), "")
                .with_metadata("reason", serde_json::json!(req.reason.clone().unwrap_or_default())),
        );
    }

    Json(RevocationResponse {
        revocation_id: uuid::Uuid::new_v4().to_string(),
        affected_sessions: affected,
        revoked_at: now,
    })
    .into_response()
}

/// `POST /v1/audit` (§4.8, §6): ingest an out-of-band audit event (e.g.
/// from the Robot Agent). Oversized metadata is rejected, not truncated.
pub async fn ingest_audit(
    State(state): State<Arc<GatewayState>>,
    Json(event): Json<AuditEvent>,
) -> impl IntoResponse {
    if event.exceeds_metadata_bound() {
        return GatewayError::PayloadTooLarge.to_http_response("audit event exceeds metadata bound").into_response();
    }
    state.audit.publish(event);
    Json(AuditAcceptedResponse { accepted: true }).into_response()
}

/// `GET /v1/jwks` (§4.8, §6): the Gateway's current verification key set.
pub async fn jwks(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let document = teleop_crypto::JwksDocument { keys: vec![state.key_manager.public_jwk()] };
    (
        [(header::CONTENT_TYPE, "application/jwk-set+json")],
        Json(document),
    )
        .into_response()
}
