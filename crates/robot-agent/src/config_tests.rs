// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::RobotAgentConfig;

fn parse(args: &[&str]) -> RobotAgentConfig {
    RobotAgentConfig::parse_from(args)
}

fn base_args() -> Vec<&'static str> {
    vec![
        "robot-agent",
        "--robot-id",
        "robot-1",
        "--session-id",
        "sess-1",
        "--gateway-ws-url",
        "wss://gateway.example.com/v1/signal",
        "--gateway-jwks-url",
        "https://gateway.example.com/v1/jwks",
    ]
}

#[test]
fn defaults_are_correct() {
    let config = parse(&base_args());
    assert_eq!(config.control_loss_timeout_ms, 500);
    assert_eq!(config.rate_limit_drive_hz, 50);
    assert_eq!(config.rate_limit_kvm_hz, 100);
    assert_eq!(config.invalid_cmd_threshold, 10);
    assert!(config.stun_servers.is_empty());
    assert!(config.turn_servers.is_empty());
    assert_eq!(config.log_format, "json");
    assert_eq!(config.log_level, "info");
}

#[test]
fn http_url_defaults_by_swapping_wss_scheme() {
    let config = parse(&base_args());
    assert_eq!(config.gateway_http_url(), "https://gateway.example.com/v1/signal");
}

#[test]
fn http_url_defaults_by_swapping_plain_ws_scheme() {
    let mut args = base_args();
    let ws_url_value = args.iter().position(|a| *a == "wss://gateway.example.com/v1/signal").unwrap();
    args[ws_url_value] = "ws://gateway.local:8443/v1/signal";
    let config = parse(&args);
    assert_eq!(config.gateway_http_url(), "http://gateway.local:8443/v1/signal");
}

#[test]
fn http_url_explicit_override_wins() {
    let mut args = base_args();
    args.extend(["--gateway-http-url", "https://override.example.com"]);
    let config = parse(&args);
    assert_eq!(config.gateway_http_url(), "https://override.example.com");
}

#[test]
fn stun_and_turn_servers_split_on_commas() {
    let mut args = base_args();
    args.extend(["--stun-servers", "stun:a.example.com:3478,stun:b.example.com:3478"]);
    let config = parse(&args);
    assert_eq!(
        config.stun_servers,
        vec!["stun:a.example.com:3478".to_string(), "stun:b.example.com:3478".to_string()]
    );
}
