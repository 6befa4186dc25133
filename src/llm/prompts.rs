//! Fixed prompt templates and the renderer that fills them.
//!
//! Templates are versioned strings baked into the crate, not user-editable
//! at runtime, so downstream stages can trust their structural assumptions
//! (the categorization template always lists exactly the 8 categories the
//! reconciler accepts).

use std::collections::BTreeMap;

use crate::error::{BudgetAdvisorError, DecodeError, Result, ValidationIssue};
use crate::llm::types::RenderedPrompt;
use crate::schema::{BudgetPlan, TransactionRecord};

/// Which of the three fixed prompt templates to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    BudgetPlan,
    Categorization,
    Chat,
}

impl TemplateKind {
    /// Placeholders the template requires. Missing ones are a caller
    /// programming error, raised at render time and never retried.
    pub fn required_placeholders(&self) -> &'static [&'static str] {
        match self {
            TemplateKind::BudgetPlan => &["income", "expenses", "goal"],
            TemplateKind::Categorization => &["csv_data"],
            TemplateKind::Chat => &["message"],
        }
    }
}

/// A caller-supplied placeholder value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{:.0}", n)
            }
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

/// An immutable, caller-constructed request for one rendered prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub template_kind: TemplateKind,
    pub fields: BTreeMap<String, FieldValue>,
}

impl PromptRequest {
    pub fn new(template_kind: TemplateKind, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            template_kind,
            fields,
        }
    }

    pub fn budget(income: f64, expenses: f64, goal: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("income".to_string(), FieldValue::Number(income));
        fields.insert("expenses".to_string(), FieldValue::Number(expenses));
        fields.insert("goal".to_string(), FieldValue::Text(goal.into()));
        Self::new(TemplateKind::BudgetPlan, fields)
    }

    pub fn categorization(csv_data: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("csv_data".to_string(), FieldValue::Text(csv_data.into()));
        Self::new(TemplateKind::Categorization, fields)
    }

    pub fn chat(message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("message".to_string(), FieldValue::Text(message.into()));
        Self::new(TemplateKind::Chat, fields)
    }
}

pub const SYSTEM_PROMPT_BUDGET: &str = r#"
You are a professional financial planning engine.

## YOUR MISSION
Produce a complete 50/30/20 budget plan from the user's stated income,
expenses, and goal.

## OUTPUT RULES (STRICT)
1. Your ONLY response MUST be a single valid JSON object matching the
   required schema. No explanatory text, no markdown fences.
2. `budget_breakdown.needs_50_percent` + `wants_30_percent` +
   `savings_20_percent` MUST sum exactly to `monthly_income`. Recompute the
   three parts before answering; do not round them independently.
3. All monetary values are non-negative numbers in the user's currency.
4. `advice.action_steps` is an ordered list of 1 to 5 short, concrete steps.

## QUALITY CHECKLIST
Before finalizing:
- The three breakdown parts sum to monthly_income
- monthly_savings_potential is consistent with income minus expenses
- advice.summary and advice.goal_projection reference the user's stated goal
"#;

pub const USER_PROMPT_BUDGET: &str = "My monthly income is {income} and my monthly fixed \
expenses are {expenses}. My financial goal is: {goal}. Using the 50/30/20 rule, prepare a \
budget and advice plan in JSON format.";

pub const SYSTEM_PROMPT_CATEGORIZATION: &str = r#"
You are a transaction categorization engine.

## YOUR MISSION
Assign every transaction in the raw CSV data to exactly one category.

## OUTPUT RULES (STRICT)
1. Your ONLY response MUST be a valid JSON array of categorized
   transactions. No explanatory text, no markdown fences.
2. Each element has exactly these fields: `date` (string, copied from the
   input), `description` (string), `amount` (number, sign preserved from the
   input), `category` (string).
3. Use ONLY these categories: 'Groceries', 'Rent/EMI', 'Utilities',
   'Transport', 'Entertainment', 'Health', 'Savings/Investments',
   'Miscellaneous'.
4. If no category clearly fits, use 'Miscellaneous'. Never invent a new one.

## QUALITY CHECKLIST
Before finalizing:
- One output element per input row, in input order
- Every `amount` is a number, never a quoted string
- Every `category` is one of the 8 listed values, spelled exactly
"#;

pub const USER_PROMPT_CATEGORIZATION: &str =
    "Please categorize the following raw transactions data:\n\nRaw Data (CSV format):\n{csv_data}";

pub const SYSTEM_PROMPT_CHAT: &str = "You are an AI financial advisor for a website user. \
Give short (max 3 sentences), simple, safe, non-aggressive, and general financial advice. \
Keep the tone helpful and concise. Never promise specific investment returns.";

pub const USER_PROMPT_CHAT: &str = "{message}";

/// Fill the template for `request`, failing fast on any absent placeholder.
pub fn render(request: &PromptRequest) -> Result<RenderedPrompt> {
    for placeholder in request.template_kind.required_placeholders() {
        if !request.fields.contains_key(*placeholder) {
            return Err(BudgetAdvisorError::TemplateFieldMissing {
                template: request.template_kind,
                field: (*placeholder).to_string(),
            });
        }
    }

    let (system, user_template, response_schema, enable_search) = match request.template_kind {
        TemplateKind::BudgetPlan => (
            SYSTEM_PROMPT_BUDGET,
            USER_PROMPT_BUDGET,
            Some(serde_json::to_value(BudgetPlan::generate_json_schema())?),
            false,
        ),
        TemplateKind::Categorization => (
            SYSTEM_PROMPT_CATEGORIZATION,
            USER_PROMPT_CATEGORIZATION,
            Some(serde_json::to_value(TransactionRecord::generate_json_schema())?),
            false,
        ),
        TemplateKind::Chat => (SYSTEM_PROMPT_CHAT, USER_PROMPT_CHAT, None, true),
    };

    let mut user = user_template.to_string();
    for (name, value) in &request.fields {
        user = user.replace(&format!("{{{}}}", name), &value.to_string());
    }

    Ok(RenderedPrompt {
        kind: request.template_kind,
        system: system.to_string(),
        user,
        response_schema,
        enable_search,
    })
}

/// How many individual issues a corrective clause names before truncating.
const MAX_REPAIR_DETAILS: usize = 5;

/// Build the corrective clause appended to the user prompt after a
/// validation or reconciliation failure.
///
/// Wording is a tuning parameter, deliberately kept in one place: each issue
/// is named with its field path, and sum mismatches get an explicit
/// recompute instruction since they are the dominant failure mode.
pub fn repair_instruction(issues: &[ValidationIssue]) -> String {
    let mut details: Vec<String> = issues
        .iter()
        .take(MAX_REPAIR_DETAILS)
        .map(|issue| format!("- {}", issue))
        .collect();
    if issues.len() > MAX_REPAIR_DETAILS {
        details.push(format!("- ... and {} more", issues.len() - MAX_REPAIR_DETAILS));
    }

    let mut instruction = format!(
        "\n\nYour previous response failed validation with the following issue(s):\n{}\n\
         Return the complete corrected JSON (not a diff), fixing every issue listed. \
         Do not change any field names or the overall structure.",
        details.join("\n")
    );

    if issues
        .iter()
        .any(|issue| issue.kind == crate::error::IssueKind::SumMismatch)
    {
        instruction.push_str(
            "\nYour budget split did not sum to the stated income; recompute so that \
             needs_50_percent + wants_30_percent + savings_20_percent equals monthly_income exactly.",
        );
    }

    instruction
}

/// Corrective clause for a response that contained no parseable JSON.
pub fn decode_repair_instruction(error: &DecodeError) -> String {
    format!(
        "\n\nYour previous response could not be parsed as JSON ({}). \
         Respond with ONLY the JSON payload: no prose, no markdown fences, no comments.",
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IssueKind;

    #[test]
    fn budget_prompt_renders_all_fields() {
        let request = PromptRequest::budget(50000.0, 20000.0, "buy a car");
        let rendered = render(&request).unwrap();

        assert!(rendered.user.contains("50000"));
        assert!(rendered.user.contains("20000"));
        assert!(rendered.user.contains("buy a car"));
        assert!(!rendered.user.contains('{'), "unfilled placeholder left: {}", rendered.user);
        assert!(rendered.response_schema.is_some());
        assert!(!rendered.enable_search);
    }

    #[test]
    fn categorization_prompt_embeds_csv() {
        let request = PromptRequest::categorization("date,desc,amount\n2024-01-05,Cafe,-12.5");
        let rendered = render(&request).unwrap();
        assert!(rendered.user.contains("2024-01-05,Cafe,-12.5"));
        assert!(rendered.system.contains("'Rent/EMI'"));
        assert!(rendered.response_schema.is_some());
    }

    #[test]
    fn chat_prompt_enables_search_without_schema() {
        let rendered = render(&PromptRequest::chat("How do I start an emergency fund?")).unwrap();
        assert!(rendered.enable_search);
        assert!(rendered.response_schema.is_none());
        assert_eq!(rendered.user, "How do I start an emergency fund?");
    }

    #[test]
    fn missing_placeholder_is_construction_error() {
        let request = PromptRequest::new(TemplateKind::BudgetPlan, BTreeMap::new());
        let err = render(&request).unwrap_err();
        match err {
            BudgetAdvisorError::TemplateFieldMissing { template, field } => {
                assert_eq!(template, TemplateKind::BudgetPlan);
                assert_eq!(field, "income");
            }
            other => panic!("expected TemplateFieldMissing, got {:?}", other),
        }
    }

    #[test]
    fn whole_numbers_render_without_decimal_point() {
        assert_eq!(FieldValue::Number(50000.0).to_string(), "50000");
        assert_eq!(FieldValue::Number(1234.5).to_string(), "1234.5");
    }

    #[test]
    fn repair_instruction_names_paths_and_caps_details() {
        let issues: Vec<ValidationIssue> = (0..8)
            .map(|i| {
                ValidationIssue::new(
                    format!("$[{}].amount", i),
                    IssueKind::TypeMismatch,
                    "expected a number",
                )
            })
            .collect();

        let text = repair_instruction(&issues);
        assert!(text.contains("$[0].amount"));
        assert!(text.contains("$[4].amount"));
        assert!(!text.contains("$[5].amount"));
        assert!(text.contains("and 3 more"));
    }

    #[test]
    fn sum_mismatch_gets_recompute_clause() {
        let issues = vec![ValidationIssue::new(
            "$.budget_breakdown",
            IssueKind::SumMismatch,
            "off by 1000",
        )];
        let text = repair_instruction(&issues);
        assert!(text.contains("recompute"));
        assert!(text.contains("monthly_income"));
    }
}
