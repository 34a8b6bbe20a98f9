// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

/// Robot-side runtime configuration (§6).
#[derive(Debug, Parser)]
#[command(name = "robot-agent", version, about)]
pub struct RobotAgentConfig {
    /// This robot's identity, matched against a capability token's `aud`.
    #[arg(long, env = "ROBOT_ID")]
    pub robot_id: String,

    /// Session this process instance serves; assigned by whatever
    /// orchestrator launches the agent for an accepted session request.
    #[arg(long, env = "SESSION_ID")]
    pub session_id: String,

    /// Gateway signaling endpoint (`wss://.../v1/signal`).
    #[arg(long, env = "GATEWAY_WS_URL")]
    pub gateway_ws_url: String,

    /// Gateway JWKS endpoint, polled by the JWKS fetcher.
    #[arg(long, env = "GATEWAY_JWKS_URL")]
    pub gateway_jwks_url: String,

    /// Gateway HTTP base URL for audit ingest. Defaults from the WS URL by
    /// swapping `ws`/`wss` for `http`/`https`.
    #[arg(long, env = "GATEWAY_HTTP_URL")]
    pub gateway_http_url: Option<String>,

    /// Camera device path for the video capture pipeline (out of scope,
    /// carried through for the capture subprocess to consume).
    #[arg(long, env = "CAMERA_DEVICE")]
    pub camera_device: Option<String>,

    /// Video codec name (e.g. `h264`, `vp8`).
    #[arg(long, env = "VIDEO_CODEC")]
    pub video_codec: Option<String>,

    /// Video bitrate in bits per second.
    #[arg(long, env = "VIDEO_BITRATE")]
    pub video_bitrate: Option<u32>,

    /// Video capture frame rate.
    #[arg(long, env = "VIDEO_FPS")]
    pub video_fps: Option<u32>,

    /// Milliseconds of datachannel silence on an active session before the
    /// safety monitor treats it as control loss.
    #[arg(long, env = "CONTROL_LOSS_TIMEOUT_MS", default_value = "500")]
    pub control_loss_timeout_ms: u64,

    /// Drive-channel token bucket rate (commands/sec); also its capacity.
    #[arg(long, env = "RATE_LIMIT_DRIVE_HZ", default_value = "50")]
    pub rate_limit_drive_hz: u32,

    /// KVM-channel token bucket rate (commands/sec); also its capacity.
    #[arg(long, env = "RATE_LIMIT_KVM_HZ", default_value = "100")]
    pub rate_limit_kvm_hz: u32,

    /// Invalid commands inside the sliding 30s window before the safety
    /// monitor latches `InvalidCmds`.
    #[arg(long, env = "INVALID_CMD_THRESHOLD", default_value = "10")]
    pub invalid_cmd_threshold: u32,

    /// Comma-separated STUN server URLs, passed through to the transport.
    #[arg(long, env = "STUN_SERVERS", value_delimiter = ',')]
    pub stun_servers: Vec<String>,

    /// Comma-separated TURN server URLs, passed through to the transport.
    #[arg(long, env = "TURN_SERVERS", value_delimiter = ',')]
    pub turn_servers: Vec<String>,

    /// Log format (json or text).
    #[arg(long, env = "ROBOT_AGENT_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "ROBOT_AGENT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl RobotAgentConfig {
    /// Resolve the Gateway's HTTP base URL, defaulting from the WS URL by
    /// swapping scheme when not set explicitly.
    pub fn gateway_http_url(&self) -> String {
        match &self.gateway_http_url {
            Some(url) => url.clone(),
            None => {
                if let Some(rest) = self.gateway_ws_url.strip_prefix("wss://") {
                    format!("https://{rest}")
                } else if let Some(rest) = self.gateway_ws_url.strip_prefix("ws://") {
                    format!("http://{rest}")
                } else {
                    self.gateway_ws_url.clone()
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
