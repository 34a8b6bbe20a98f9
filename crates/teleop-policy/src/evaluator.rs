// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ABAC evaluation: first-deny-wins, then first-allow, then default deny
//! (§4.3).

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{Condition, ConditionOperator, EvaluationContext, Policy, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub decision: Decision,
    pub matched_rule: Option<String>,
    pub allowed_actions: Vec<String>,
    pub reason: Option<String>,
    pub policy_id: String,
    pub policy_version: u64,
    pub evaluated_at: DateTime<Utc>,
    pub duration_ms: f64,
}

pub const DEFAULT_DENY_REASON: &str = "no matching rule";

/// Evaluate `policy` against `context` for the action set `requested_actions`.
pub fn evaluate(policy: &Policy, context: &EvaluationContext, requested_actions: &[String]) -> EvaluationResult {
    let started = Instant::now();
    let requested: HashSet<&str> = requested_actions.iter().map(String::as_str).collect();

    let mut ordered: Vec<(usize, &Rule)> = policy.rules.iter().enumerate().collect();
    ordered.sort_by(|(ai, a), (bi, b)| a.priority.cmp(&b.priority).then(ai.cmp(bi)));

    let matches = |rule: &Rule| -> bool {
        let actions: HashSet<&str> = rule.actions.iter().map(String::as_str).collect();
        if requested.is_empty() || actions.is_disjoint(&requested) {
            return false;
        }
        rule.conditions.iter().all(|c| condition_matches(c, context))
    };

    for (_, rule) in ordered.iter().filter(|(_, r)| r.effect == crate::model::Effect::Deny) {
        if matches(rule) {
            return EvaluationResult {
                decision: Decision::Deny,
                matched_rule: Some(rule.id.clone()),
                allowed_actions: Vec::new(),
                reason: None,
                policy_id: policy.id.clone(),
                policy_version: policy.version,
                evaluated_at: Utc::now(),
                duration_ms: elapsed_ms(started),
            };
        }
    }

    for (_, rule) in ordered.iter().filter(|(_, r)| r.effect == crate::model::Effect::Allow) {
        if matches(rule) {
            let allowed_actions: Vec<String> = requested_actions
                .iter()
                .filter(|a| rule.actions.iter().any(|ra| ra == *a))
                .cloned()
                .collect();
            return EvaluationResult {
                decision: Decision::Allow,
                matched_rule: Some(rule.id.clone()),
                allowed_actions,
                reason: None,
                policy_id: policy.id.clone(),
                policy_version: policy.version,
                evaluated_at: Utc::now(),
                duration_ms: elapsed_ms(started),
            };
        }
    }

    EvaluationResult {
        decision: Decision::Deny,
        matched_rule: None,
        allowed_actions: Vec::new(),
        reason: Some(DEFAULT_DENY_REASON.to_string()),
        policy_id: policy.id.clone(),
        policy_version: policy.version,
        evaluated_at: Utc::now(),
        duration_ms: elapsed_ms(started),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn condition_matches(condition: &Condition, context: &EvaluationContext) -> bool {
    let Some(actual) = context.get(&condition.field) else {
        return false;
    };
    apply_operator(condition.operator, actual, &condition.value)
}

fn apply_operator(operator: ConditionOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Eq => actual == expected,
        ConditionOperator::Neq => actual != expected,
        ConditionOperator::In => expected.as_array().map(|arr| arr.contains(actual)).unwrap_or(false),
        ConditionOperator::Gt => compare_numbers(actual, expected).map(|o| o.is_gt()).unwrap_or(false),
        ConditionOperator::Lt => compare_numbers(actual, expected).map(|o| o.is_lt()).unwrap_or(false),
        ConditionOperator::Gte => compare_numbers(actual, expected).map(|o| o.is_ge()).unwrap_or(false),
        ConditionOperator::Lte => compare_numbers(actual, expected).map(|o| o.is_le()).unwrap_or(false),
        ConditionOperator::Contains => match (actual.as_str(), expected.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => actual.as_array().map(|arr| arr.contains(expected)).unwrap_or(false),
        },
    }
}

fn compare_numbers(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    let a = actual.as_f64()?;
    let b = expected.as_f64()?;
    a.partial_cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effect, Policy, Rule};
    use chrono::Utc;

    fn policy_with(rules: Vec<Rule>) -> Policy {
        Policy {
            id: "pol-1".to_string(),
            version: 1,
            name: "test".to_string(),
            rules,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            content_hash: "hash".to_string(),
        }
    }

    fn allow_rule(id: &str, priority: i64, actions: &[&str]) -> Rule {
        Rule {
            id: id.to_string(),
            effect: Effect::Allow,
            priority,
            actions: actions.iter().map(|s| s.to_string()).collect(),
            conditions: vec![],
        }
    }

    fn deny_rule(id: &str, priority: i64, actions: &[&str], conditions: Vec<Condition>) -> Rule {
        Rule {
            id: id.to_string(),
            effect: Effect::Deny,
            priority,
            actions: actions.iter().map(|s| s.to_string()).collect(),
            conditions,
        }
    }

    #[test]
    fn allows_matching_role_with_effective_scope_intersection() {
        let policy = policy_with(vec![allow_rule(
            "allow-operator",
            1,
            &["teleop:view", "teleop:control", "teleop:estop"],
        )]);
        let ctx = EvaluationContext::new().with("role", "operator");
        let result = evaluate(
            &policy,
            &ctx,
            &["teleop:control".to_string(), "teleop:view".to_string()],
        );
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.matched_rule.as_deref(), Some("allow-operator"));
        assert_eq!(
            result.allowed_actions,
            vec!["teleop:control".to_string(), "teleop:view".to_string()]
        );
    }

    #[test]
    fn denies_by_role_with_no_matching_allow_rule() {
        let policy = policy_with(vec![allow_rule("allow-operator", 1, &["teleop:control"])]);
        let ctx = EvaluationContext::new().with("role", "guest");
        let result = evaluate(&policy, &ctx, &["teleop:control".to_string()]);
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.reason.as_deref(), Some(DEFAULT_DENY_REASON));
    }

    #[test]
    fn first_deny_wins_over_allow_at_same_priority() {
        let policy = policy_with(vec![
            allow_rule("allow-operator", 1, &["teleop:control"]),
            deny_rule(
                "deny-robot-1",
                1,
                &["teleop:control"],
                vec![Condition {
                    field: "resource".to_string(),
                    operator: ConditionOperator::Eq,
                    value: serde_json::json!("robot-1"),
                }],
            ),
        ]);
        let ctx = EvaluationContext::new().with("resource", "robot-1");
        let result = evaluate(&policy, &ctx, &["teleop:control".to_string()]);
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.matched_rule.as_deref(), Some("deny-robot-1"));
    }

    #[test]
    fn empty_requested_actions_default_denies() {
        let policy = policy_with(vec![allow_rule("allow-all", 1, &["teleop:control"])]);
        let ctx = EvaluationContext::new();
        let result = evaluate(&policy, &ctx, &[]);
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.reason.as_deref(), Some(DEFAULT_DENY_REASON));
    }

    #[test]
    fn missing_field_evaluates_any_operator_to_false() {
        let rule = Rule {
            conditions: vec![Condition {
                field: "credential.department".to_string(),
                operator: ConditionOperator::Eq,
                value: serde_json::json!("ops"),
            }],
            ..allow_rule("allow-dept", 1, &["teleop:view"])
        };
        let policy = policy_with(vec![rule]);
        let ctx = EvaluationContext::new();
        let result = evaluate(&policy, &ctx, &["teleop:view".to_string()]);
        assert_eq!(result.decision, Decision::Deny);
    }

    #[test]
    fn contains_matches_substring_and_sequence_element() {
        let substring = Condition {
            field: "note".to_string(),
            operator: ConditionOperator::Contains,
            value: serde_json::json!("urgent"),
        };
        let ctx = EvaluationContext::new().with("note", "this is urgent work");
        assert!(condition_matches(&substring, &ctx));

        let element = Condition {
            field: "tags".to_string(),
            operator: ConditionOperator::Contains,
            value: serde_json::json!("vip"),
        };
        let ctx2 = EvaluationContext::new().with("tags", serde_json::json!(["vip", "beta"]));
        assert!(condition_matches(&element, &ctx2));
    }
}
