// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scopes and action strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three scopes a capability token can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[serde(rename = "teleop:view")]
    View,
    #[serde(rename = "teleop:control")]
    Control,
    #[serde(rename = "teleop:estop")]
    Estop,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::View => "teleop:view",
            Scope::Control => "teleop:control",
            Scope::Estop => "teleop:estop",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teleop:view" => Ok(Scope::View),
            "teleop:control" => Ok(Scope::Control),
            "teleop:estop" => Ok(Scope::Estop),
            _ => Err(ScopeParseError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScopeParseError {
    #[error("unknown scope {0:?}")]
    Unknown(String),
}

/// A validated `namespace:verb` action string, e.g. `teleop:control`.
///
/// Validation follows `^[a-z][a-z0-9_-]*:[a-z][a-z0-9_-]*$` — lower-case,
/// each half starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    pub fn parse(raw: &str) -> Result<Self, ActionParseError> {
        let (namespace, verb) = raw
            .split_once(':')
            .ok_or_else(|| ActionParseError::MissingSeparator(raw.to_string()))?;
        if !is_valid_segment(namespace) || !is_valid_segment(verb) {
            return Err(ActionParseError::InvalidSegment(raw.to_string()));
        }
        Ok(Action(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

impl TryFrom<String> for Action {
    type Error = ActionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Action::parse(&value)
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionParseError {
    #[error("action {0:?} has no namespace:verb separator")]
    MissingSeparator(String),
    #[error("action {0:?} does not match /^[a-z][a-z0-9_-]*:[a-z][a-z0-9_-]*$/")]
    InvalidSegment(String),
}
