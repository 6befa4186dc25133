use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which of the two fixed response schemas a candidate is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    BudgetPlan,
    TransactionList,
}

/// The fixed transaction category set.
///
/// Serialized labels are a compatibility contract with the categorization
/// prompt and any existing front end; they must not change. Anything the
/// model invents outside this set is remapped to `Miscellaneous` by the
/// reconciler rather than rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum Category {
    #[serde(rename = "Groceries")]
    Groceries,

    #[serde(rename = "Rent/EMI")]
    RentEmi,

    #[serde(rename = "Utilities")]
    Utilities,

    #[serde(rename = "Transport")]
    Transport,

    #[serde(rename = "Entertainment")]
    Entertainment,

    #[serde(rename = "Health")]
    Health,

    #[serde(rename = "Savings/Investments")]
    SavingsInvestments,

    #[serde(rename = "Miscellaneous")]
    Miscellaneous,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Groceries,
        Category::RentEmi,
        Category::Utilities,
        Category::Transport,
        Category::Entertainment,
        Category::Health,
        Category::SavingsInvestments,
        Category::Miscellaneous,
    ];

    /// The exact wire label for this category.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Groceries => "Groceries",
            Category::RentEmi => "Rent/EMI",
            Category::Utilities => "Utilities",
            Category::Transport => "Transport",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
            Category::SavingsInvestments => "Savings/Investments",
            Category::Miscellaneous => "Miscellaneous",
        }
    }

    /// Resolve a wire label to a category. This is the single recognition
    /// point for set membership; `None` means the label is out of set.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.label() == label)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BudgetBreakdown {
    #[schemars(description = "Amount allocated to needs: 50% of monthly income")]
    pub needs_50_percent: f64,

    #[schemars(description = "Amount allocated to wants: 30% of monthly income")]
    pub wants_30_percent: f64,

    #[schemars(description = "Amount allocated to savings: 20% of monthly income")]
    pub savings_20_percent: f64,
}

impl BudgetBreakdown {
    /// Sum of the three allocations, compared against monthly income by the
    /// reconciler.
    pub fn total(&self) -> f64 {
        self.needs_50_percent + self.wants_30_percent + self.savings_20_percent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Advice {
    #[schemars(description = "One-paragraph summary of the financial situation and plan")]
    pub summary: String,

    #[schemars(
        description = "Ordered list of 1 to 5 concrete action steps toward the stated goal"
    )]
    pub action_steps: Vec<String>,

    #[schemars(
        description = "Projection of when and how the stated financial goal can be reached"
    )]
    pub goal_projection: String,
}

/// A 50/30/20 budget plan as returned to the front end.
///
/// Field names and nesting are the wire contract; repairs may change the
/// generated content but never this shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BudgetPlan {
    #[schemars(description = "Stated monthly income, non-negative")]
    pub monthly_income: f64,

    #[schemars(description = "Stated monthly fixed expenses, non-negative")]
    pub monthly_expenses: f64,

    #[schemars(description = "Income remaining after expenses that can be saved, non-negative")]
    pub monthly_savings_potential: f64,

    #[schemars(
        description = "50/30/20 split of monthly income; the three parts must sum to monthly_income"
    )]
    pub budget_breakdown: BudgetBreakdown,

    pub advice: Advice,
}

impl BudgetPlan {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BudgetPlan)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// One categorized transaction as returned to the front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TransactionRecord {
    #[schemars(description = "Transaction date as it appeared in the input, passed through opaque")]
    pub date: String,

    #[schemars(description = "Transaction description from the input")]
    pub description: String,

    #[schemars(description = "Signed transaction amount; sign preserved from the input")]
    pub amount: f64,

    #[schemars(description = "Assigned category from the fixed 8-value set")]
    pub category: Category,
}

impl TransactionRecord {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<TransactionRecord>)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Note that a record's out-of-set category was rewritten to
/// `Miscellaneous`. Non-fatal: it never triggers a repair retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapNote {
    /// Index of the record in the transaction list.
    pub index: usize,
    /// The unrecognized label the model produced.
    pub original_label: String,
}

impl std::fmt::Display for RemapNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record {}: category '{}' remapped to '{}'",
            self.index,
            self.original_label,
            Category::Miscellaneous
        )
    }
}

/// Terminal accepted outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome<T> {
    pub value: T,
    /// How many attempts the run consumed, including the accepted one.
    pub attempts_used: u32,
    /// Non-fatal category remaps applied during reconciliation.
    pub remapped: Vec<RemapNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("Food"), None);
        assert_eq!(Category::from_label("groceries"), None);
    }

    #[test]
    fn category_serializes_to_wire_label() {
        let json = serde_json::to_string(&Category::RentEmi).unwrap();
        assert_eq!(json, "\"Rent/EMI\"");
        let json = serde_json::to_string(&Category::SavingsInvestments).unwrap();
        assert_eq!(json, "\"Savings/Investments\"");
    }

    #[test]
    fn budget_plan_wire_shape() {
        let plan = BudgetPlan {
            monthly_income: 50000.0,
            monthly_expenses: 20000.0,
            monthly_savings_potential: 10000.0,
            budget_breakdown: BudgetBreakdown {
                needs_50_percent: 25000.0,
                wants_30_percent: 15000.0,
                savings_20_percent: 10000.0,
            },
            advice: Advice {
                summary: "Solid position.".to_string(),
                action_steps: vec!["Automate savings".to_string()],
                goal_projection: "Goal reachable in 14 months.".to_string(),
            },
        };

        let json = serde_json::to_value(&plan).unwrap();
        assert!(json.get("monthly_income").is_some());
        assert!(json["budget_breakdown"].get("needs_50_percent").is_some());
        assert!(json["advice"].get("action_steps").is_some());

        let back: BudgetPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn schema_generation_names_contract_fields() {
        let schema = BudgetPlan::schema_as_json().unwrap();
        assert!(schema.contains("monthly_income"));
        assert!(schema.contains("budget_breakdown"));
        assert!(schema.contains("action_steps"));

        let schema = TransactionRecord::schema_as_json().unwrap();
        assert!(schema.contains("Rent/EMI"));
        assert!(schema.contains("Savings/Investments"));
    }
}
