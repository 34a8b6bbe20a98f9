// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Gateway process.
#[derive(Debug, Clone, clap::Parser)]
pub struct GatewayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8443, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Path to the append-only revocation persistence file.
    #[arg(long, default_value = "revocations.json", env = "GATEWAY_REVOCATION_FILE")]
    pub revocation_file: PathBuf,

    /// Revocation cache capacity before oldest-10% eviction (§4.5).
    #[arg(long, default_value_t = 100_000, env = "GATEWAY_REVOCATION_CACHE_SIZE")]
    pub revocation_cache_size: usize,

    /// Revocation cache cleanup interval in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "GATEWAY_REVOCATION_CLEANUP_MS")]
    pub revocation_cleanup_ms: u64,

    /// Near-expiry monitor scan interval in milliseconds (§4.6).
    #[arg(long, default_value_t = 10_000, env = "GATEWAY_NEAR_EXPIRY_SCAN_MS")]
    pub near_expiry_scan_ms: u64,

    /// Near-expiry warning threshold in milliseconds (§4.6).
    #[arg(long, default_value_t = 60_000, env = "GATEWAY_NEAR_EXPIRY_WARN_MS")]
    pub near_expiry_warn_ms: u64,

    /// Default capability token TTL in seconds.
    #[arg(long, default_value_t = 300, env = "GATEWAY_TOKEN_TTL_SECS")]
    pub token_ttl_secs: i64,

    /// Clock skew tolerance applied to credential and token validity
    /// windows, in seconds (§3).
    #[arg(long, default_value_t = 60, env = "GATEWAY_CLOCK_SKEW_SECS")]
    pub clock_skew_secs: i64,

    /// Policy store capacity (§4.3).
    #[arg(long, default_value_t = 10_000, env = "GATEWAY_POLICY_STORE_CAP")]
    pub policy_store_capacity: usize,

    /// Audit queue bound; events beyond this are dropped, not blocked on
    /// (§4.14).
    #[arg(long, default_value_t = 1024, env = "GATEWAY_AUDIT_QUEUE_CAPACITY")]
    pub audit_queue_capacity: usize,

    /// Audit ledger transport URL. Writes go directly here; the Gateway
    /// never makes a loopback HTTP call to its own ingest endpoint (§4.14).
    #[arg(long, env = "GATEWAY_AUDIT_LEDGER_URL")]
    pub audit_ledger_url: Option<String>,

    /// STUN servers advertised to operators in the session response.
    #[arg(long, env = "GATEWAY_STUN_SERVERS", value_delimiter = ',')]
    pub stun_servers: Vec<String>,

    /// TURN servers advertised to operators in the session response.
    #[arg(long, env = "GATEWAY_TURN_SERVERS", value_delimiter = ',')]
    pub turn_servers: Vec<String>,

    /// Bearer token required on the admin surface (`/v1/revocations`). No
    /// token disables auth on that route, matching local/dev deployments.
    #[arg(long, env = "GATEWAY_ADMIN_TOKEN")]
    pub admin_token: Option<String>,
}

impl GatewayConfig {
    pub fn revocation_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.revocation_cleanup_ms)
    }

    pub fn near_expiry_scan_interval(&self) -> Duration {
        Duration::from_millis(self.near_expiry_scan_ms)
    }

    pub fn near_expiry_warn_threshold(&self) -> Duration {
        Duration::from_millis(self.near_expiry_warn_ms)
    }
}
