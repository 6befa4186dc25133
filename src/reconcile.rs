//! Enforcement of domain invariants the schema cannot express.
//!
//! Two invariants live here: the 50/30/20 split must sum to monthly income
//! within tolerance, and every transaction category must belong to the fixed
//! set. The first is the most common generation failure mode (plausible but
//! arithmetically inconsistent splits) and is retry-eligible; the second is
//! locally correctable, so out-of-set categories are rewritten to
//! `Miscellaneous` without spending a repair attempt.
//!
//! Reconciliation is idempotent: running it again over its own output yields
//! the same value and no new remap notes.

use log::debug;
use serde_json::Value;

use crate::error::{IssueKind, ValidationIssue};
use crate::schema::{Category, RemapNote, SchemaKind};

/// Absolute fallback bound used when monthly income is too small to anchor a
/// relative comparison.
const ABSOLUTE_SUM_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub value: Value,
    pub remapped: Vec<RemapNote>,
}

/// Apply domain invariants to a schema-valid candidate.
///
/// Returns the (possibly corrected) value plus non-fatal remap notes, or the
/// ordered issues that require a repair re-prompt.
pub fn reconcile(
    validated: Value,
    schema_kind: SchemaKind,
    sum_tolerance: f64,
) -> Result<Reconciled, Vec<ValidationIssue>> {
    match schema_kind {
        SchemaKind::BudgetPlan => reconcile_budget(validated, sum_tolerance),
        SchemaKind::TransactionList => reconcile_transactions(validated),
    }
}

fn reconcile_budget(value: Value, sum_tolerance: f64) -> Result<Reconciled, Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let income = number_at(&value, &["monthly_income"]);
    let money_fields = [
        ("$.monthly_income", income),
        ("$.monthly_expenses", number_at(&value, &["monthly_expenses"])),
        (
            "$.monthly_savings_potential",
            number_at(&value, &["monthly_savings_potential"]),
        ),
    ];
    for (path, amount) in money_fields {
        if let Some(amount) = amount {
            if amount < 0.0 {
                issues.push(ValidationIssue::new(
                    path,
                    IssueKind::OutOfRange,
                    format!("{} must be non-negative, got {}", path, amount),
                ));
            }
        }
    }

    let needs = number_at(&value, &["budget_breakdown", "needs_50_percent"]);
    let wants = number_at(&value, &["budget_breakdown", "wants_30_percent"]);
    let savings = number_at(&value, &["budget_breakdown", "savings_20_percent"]);

    if let (Some(income), Some(needs), Some(wants), Some(savings)) = (income, needs, wants, savings)
    {
        for (path, part) in [
            ("$.budget_breakdown.needs_50_percent", needs),
            ("$.budget_breakdown.wants_30_percent", wants),
            ("$.budget_breakdown.savings_20_percent", savings),
        ] {
            if part < 0.0 {
                issues.push(ValidationIssue::new(
                    path,
                    IssueKind::OutOfRange,
                    format!("{} must be non-negative, got {}", path, part),
                ));
            }
        }

        let sum = needs + wants + savings;
        if !split_sums_to_income(sum, income, sum_tolerance) {
            issues.push(ValidationIssue::new(
                "$.budget_breakdown",
                IssueKind::SumMismatch,
                format!(
                    "needs + wants + savings = {}, which is not within {}% of monthly_income {}",
                    sum,
                    sum_tolerance * 100.0,
                    income
                ),
            ));
        }
    }

    if issues.is_empty() {
        Ok(Reconciled {
            value,
            remapped: Vec::new(),
        })
    } else {
        Err(issues)
    }
}

fn split_sums_to_income(sum: f64, income: f64, tolerance: f64) -> bool {
    if income.abs() <= ABSOLUTE_SUM_EPSILON {
        // Relative tolerance has no anchor at zero income.
        return sum.abs() <= ABSOLUTE_SUM_EPSILON;
    }
    ((sum - income) / income).abs() <= tolerance
}

fn reconcile_transactions(mut value: Value) -> Result<Reconciled, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut remapped = Vec::new();

    let Some(records) = value.as_array_mut() else {
        return Err(vec![ValidationIssue::new(
            "$",
            IssueKind::TypeMismatch,
            "expected an array of transactions",
        )]);
    };

    for (idx, record) in records.iter_mut().enumerate() {
        // Amounts cannot be safely defaulted, so a missing or unusable one
        // must go back to the model.
        match record.get("amount").and_then(Value::as_f64) {
            Some(amount) if amount.is_finite() => {}
            Some(amount) => issues.push(ValidationIssue::new(
                format!("$[{}].amount", idx),
                IssueKind::OutOfRange,
                format!("amount {} is not a usable number", amount),
            )),
            None => issues.push(ValidationIssue::new(
                format!("$[{}].amount", idx),
                IssueKind::TypeMismatch,
                "amount is missing or not numeric",
            )),
        }

        match record.get("category").and_then(Value::as_str) {
            Some(label) if Category::from_label(label).is_some() => {}
            Some(label) => {
                let note = RemapNote {
                    index: idx,
                    original_label: label.to_string(),
                };
                debug!("{}", note);
                remapped.push(note);
                record["category"] = Value::String(Category::Miscellaneous.label().to_string());
            }
            None => issues.push(ValidationIssue::new(
                format!("$[{}].category", idx),
                IssueKind::TypeMismatch,
                "category is missing or not a string",
            )),
        }
    }

    if issues.is_empty() {
        Ok(Reconciled { value, remapped })
    } else {
        Err(issues)
    }
}

fn number_at(value: &Value, path: &[&str]) -> Option<f64> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_f64()
}
