//! Structural and typal validation of decoded candidates.
//!
//! Validation is purely shape-level: presence, JSON types, and the bounds a
//! schema can express. Domain invariants (sum consistency, category set
//! membership) belong to the reconciler. The candidate is never mutated.

use serde_json::Value;

use crate::error::{IssueKind, ValidationIssue};
use crate::schema::SchemaKind;

/// Outcome of checking a candidate against one of the fixed schemas.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(Value),
    Rejected(Vec<ValidationIssue>),
}

/// Upper bound on `advice.action_steps`; the plan is meant to be actionable,
/// not an essay.
pub const MAX_ACTION_STEPS: usize = 5;

pub fn validate(candidate: &Value, schema_kind: SchemaKind) -> ValidationOutcome {
    let issues = match schema_kind {
        SchemaKind::BudgetPlan => check_budget_plan(candidate),
        SchemaKind::TransactionList => check_transaction_list(candidate),
    };

    if issues.is_empty() {
        ValidationOutcome::Accepted(candidate.clone())
    } else {
        ValidationOutcome::Rejected(issues)
    }
}

fn check_budget_plan(candidate: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(root) = require_object(candidate, "$", &mut issues) else {
        return issues;
    };

    for field in [
        "monthly_income",
        "monthly_expenses",
        "monthly_savings_potential",
    ] {
        require_number(root, "$", field, &mut issues);
    }

    match root.get("budget_breakdown") {
        None => issues.push(missing("$.budget_breakdown")),
        Some(value) => {
            if let Some(breakdown) = require_object(value, "$.budget_breakdown", &mut issues) {
                for field in ["needs_50_percent", "wants_30_percent", "savings_20_percent"] {
                    require_number(breakdown, "$.budget_breakdown", field, &mut issues);
                }
            }
        }
    }

    match root.get("advice") {
        None => issues.push(missing("$.advice")),
        Some(value) => {
            if let Some(advice) = require_object(value, "$.advice", &mut issues) {
                require_string(advice, "$.advice", "summary", &mut issues);
                require_string(advice, "$.advice", "goal_projection", &mut issues);
                check_action_steps(advice.get("action_steps"), &mut issues);
            }
        }
    }

    issues
}

fn check_action_steps(value: Option<&Value>, issues: &mut Vec<ValidationIssue>) {
    let path = "$.advice.action_steps";
    match value {
        None => issues.push(missing(path)),
        Some(Value::Array(steps)) => {
            if steps.is_empty() {
                issues.push(ValidationIssue::new(
                    path,
                    IssueKind::OutOfRange,
                    "action_steps must contain at least one step",
                ));
            }
            if steps.len() > MAX_ACTION_STEPS {
                issues.push(ValidationIssue::new(
                    path,
                    IssueKind::OutOfRange,
                    format!(
                        "action_steps has {} entries; at most {} are allowed",
                        steps.len(),
                        MAX_ACTION_STEPS
                    ),
                ));
            }
            for (idx, step) in steps.iter().enumerate() {
                if !step.is_string() {
                    issues.push(ValidationIssue::new(
                        format!("{}[{}]", path, idx),
                        IssueKind::TypeMismatch,
                        format!("expected a string, found {}", type_name(step)),
                    ));
                }
            }
        }
        Some(other) => issues.push(ValidationIssue::new(
            path,
            IssueKind::TypeMismatch,
            format!("expected an array of strings, found {}", type_name(other)),
        )),
    }
}

fn check_transaction_list(candidate: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(records) = candidate.as_array() else {
        issues.push(ValidationIssue::new(
            "$",
            IssueKind::TypeMismatch,
            format!(
                "expected an array of transactions, found {}",
                type_name(candidate)
            ),
        ));
        return issues;
    };

    for (idx, record) in records.iter().enumerate() {
        let path = format!("$[{}]", idx);
        let Some(fields) = require_object(record, &path, &mut issues) else {
            continue;
        };

        require_string(fields, &path, "date", &mut issues);
        require_string(fields, &path, "description", &mut issues);
        require_number(fields, &path, "amount", &mut issues);
        // Any string is schema-valid here; set membership is the
        // reconciler's concern because the rest of the record stays usable.
        require_string(fields, &path, "category", &mut issues);
    }

    issues
}

fn require_object<'a>(
    value: &'a Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a serde_json::Map<String, Value>> {
    match value.as_object() {
        Some(map) => Some(map),
        None => {
            issues.push(ValidationIssue::new(
                path,
                IssueKind::TypeMismatch,
                format!("expected an object, found {}", type_name(value)),
            ));
            None
        }
    }
}

fn require_number(
    object: &serde_json::Map<String, Value>,
    parent: &str,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let path = format!("{}.{}", parent, field);
    match object.get(field) {
        None | Some(Value::Null) => issues.push(missing(&path)),
        Some(value) if value.is_number() => {}
        Some(value) => issues.push(ValidationIssue::new(
            path,
            IssueKind::TypeMismatch,
            format!("expected a number, found {}", type_name(value)),
        )),
    }
}

fn require_string(
    object: &serde_json::Map<String, Value>,
    parent: &str,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let path = format!("{}.{}", parent, field);
    match object.get(field) {
        None | Some(Value::Null) => issues.push(missing(&path)),
        Some(Value::String(_)) => {}
        Some(value) => issues.push(ValidationIssue::new(
            path,
            IssueKind::TypeMismatch,
            format!("expected a string, found {}", type_name(value)),
        )),
    }
}

fn missing(path: &str) -> ValidationIssue {
    ValidationIssue::new(path, IssueKind::MissingField, "required field is absent")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
