//! # Budget Advisor Engine
//!
//! A library for turning the output of a non-deterministic LLM generation
//! service into trusted structured financial data: a 50/30/20 budget plan,
//! a categorized transaction list, or bounded free-text advice.
//!
//! ## Core Concepts
//!
//! - **Contract enforcement**: the generation service gives no guarantee of
//!   schema conformance, numeric consistency, or category-set membership;
//!   every response passes decode -> validate -> reconcile before it is
//!   trusted.
//! - **Repair retries**: retry-eligible faults re-prompt the service with a
//!   corrective clause naming the concrete issues, bounded by a fixed
//!   attempt budget and a request deadline.
//! - **Reconciliation**: domain invariants a schema cannot express: the
//!   50/30/20 split must sum to monthly income within tolerance, and every
//!   category must belong to the fixed 8-value set (out-of-set values are
//!   remapped to Miscellaneous rather than rejected).
//! - **Two retry budgets**: transient transport faults are retried inside
//!   the client adapter, independently of the pipeline's content-level
//!   attempts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use budget_advisor_engine::{AdvisorEngine, EngineConfig, GeminiClient};
//!
//! let client = GeminiClient::new(std::env::var("GEMINI_API_KEY")?);
//! let engine = AdvisorEngine::new(client, EngineConfig::default())?;
//!
//! let outcome = engine.budget_plan(50000.0, 20000.0, "buy a car").await?;
//! println!(
//!     "plan accepted after {} attempt(s): {:?}",
//!     outcome.attempts_used, outcome.value
//! );
//!
//! let categorized = engine.categorize("date,description,amount\n...").await?;
//! for note in &categorized.remapped {
//!     println!("remapped: {}", note);
//! }
//! ```

pub mod advice;
pub mod config;
pub mod decode;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod validate;

pub use advice::{sanitize_reply, FALLBACK_REPLY};
pub use config::EngineConfig;
pub use decode::decode;
pub use error::{
    AttemptFailure, AttemptFault, BudgetAdvisorError, DecodeError, IssueKind, Result,
    TransportError, ValidationIssue,
};
pub use llm::client::{GeminiClient, GenerationService};
pub use llm::prompts::{FieldValue, PromptRequest, TemplateKind};
pub use llm::types::RenderedPrompt;
pub use pipeline::{ContractPipeline, GenerationAttempt, PipelineEvent};
pub use reconcile::{reconcile, Reconciled};
pub use schema::{
    Advice, BudgetBreakdown, BudgetPlan, Category, PipelineOutcome, RemapNote, SchemaKind,
    TransactionRecord,
};
pub use validate::{validate, ValidationOutcome};

use tokio::sync::mpsc::Sender;

/// The facade the web route layer talks to.
///
/// Holds no mutable state between requests; one instance is safely shared
/// across concurrent callers.
pub struct AdvisorEngine<S> {
    pipeline: ContractPipeline<S>,
}

impl<S: GenerationService> AdvisorEngine<S> {
    pub fn new(service: S, config: EngineConfig) -> Result<Self> {
        Ok(Self {
            pipeline: ContractPipeline::new(service, config)?,
        })
    }

    /// Attach a progress channel; events are delivered best-effort.
    pub fn with_progress(mut self, sender: Sender<PipelineEvent>) -> Self {
        self.pipeline = self.pipeline.with_progress(sender);
        self
    }

    /// Generate a validated 50/30/20 budget plan.
    pub async fn budget_plan(
        &self,
        income: f64,
        expenses: f64,
        goal: &str,
    ) -> Result<PipelineOutcome<BudgetPlan>> {
        let request = PromptRequest::budget(income, expenses, goal);
        self.pipeline.run_budget(&request).await
    }

    /// Categorize raw CSV transaction text into the fixed category set.
    pub async fn categorize(
        &self,
        csv_data: &str,
    ) -> Result<PipelineOutcome<Vec<TransactionRecord>>> {
        let request = PromptRequest::categorization(csv_data);
        self.pipeline.run_categorization(&request).await
    }

    /// Free-text advice with bounded-length, claim-safe post-filtering.
    pub async fn advice(&self, message: &str) -> Result<String> {
        let request = PromptRequest::chat(message);
        self.pipeline.run_advice(&request).await
    }
}
