//! The repair-retry controller wrapping the decode -> validate -> reconcile
//! pipeline.
//!
//! One run moves through Drafting -> AwaitingResponse -> Decoding ->
//! Validating -> Reconciling and terminates in Accepted or Failed. Any
//! retry-eligible fault transitions to Repairing: a corrective clause naming
//! the concrete issues is appended to the original user prompt and the run
//! loops back to Drafting. The loop is bounded by `max_attempts` and a
//! request-level deadline; transport failures consume the same budget.

use std::time::Instant;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc::Sender;

use crate::advice::sanitize_reply;
use crate::config::EngineConfig;
use crate::decode::decode;
use crate::error::{
    AttemptFailure, AttemptFault, BudgetAdvisorError, Result, TransportError,
};
use crate::llm::client::GenerationService;
use crate::llm::prompts::{
    decode_repair_instruction, render, repair_instruction, PromptRequest,
};
use crate::llm::types::RenderedPrompt;
use crate::reconcile::reconcile;
use crate::schema::{BudgetPlan, PipelineOutcome, RemapNote, SchemaKind, TransactionRecord};
use crate::validate::{validate, ValidationOutcome};

/// Progress notifications emitted while a pipeline run advances through its
/// states. Delivery is best-effort; a full or dropped channel never affects
/// the run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Drafting { attempt: u32 },
    AwaitingResponse { attempt: u32 },
    Decoding { attempt: u32 },
    Validating { attempt: u32 },
    Reconciling { attempt: u32 },
    Repairing { attempt: u32, reason: String },
    Accepted { attempts_used: u32 },
    Failed { attempts: u32 },
}

/// Record of one call to the generation service. Immutable once populated,
/// debug-logged, and discarded when the run concludes; never persisted.
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub attempt_number: u32,
    pub prompt_text: String,
    pub raw_response: Option<String>,
    pub transport_error: Option<TransportError>,
}

pub struct ContractPipeline<S> {
    service: S,
    config: EngineConfig,
    progress: Option<Sender<PipelineEvent>>,
}

impl<S: GenerationService> ContractPipeline<S> {
    pub fn new(service: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service,
            config,
            progress: None,
        })
    }

    pub fn with_progress(mut self, sender: Sender<PipelineEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline for a budget-plan request.
    pub async fn run_budget(
        &self,
        request: &PromptRequest,
    ) -> Result<PipelineOutcome<BudgetPlan>> {
        let (value, attempts_used, remapped) =
            self.run_structured(request, SchemaKind::BudgetPlan).await?;
        let plan: BudgetPlan = serde_json::from_value(value)?;
        Ok(PipelineOutcome {
            value: plan,
            attempts_used,
            remapped,
        })
    }

    /// Run the full pipeline for a categorization request.
    pub async fn run_categorization(
        &self,
        request: &PromptRequest,
    ) -> Result<PipelineOutcome<Vec<TransactionRecord>>> {
        let (value, attempts_used, remapped) = self
            .run_structured(request, SchemaKind::TransactionList)
            .await?;
        let records: Vec<TransactionRecord> = serde_json::from_value(value)?;
        Ok(PipelineOutcome {
            value: records,
            attempts_used,
            remapped,
        })
    }

    /// One-shot advice flow: no schema, no content retries, only the
    /// client's transparent transport retry plus the deterministic
    /// post-filter.
    pub async fn run_advice(&self, request: &PromptRequest) -> Result<String> {
        let prompt = render(request)?;
        let raw = self
            .service
            .generate(&prompt, self.config.generation_timeout)
            .await?;
        Ok(sanitize_reply(&raw))
    }

    async fn run_structured(
        &self,
        request: &PromptRequest,
        schema_kind: SchemaKind,
    ) -> Result<(Value, u32, Vec<RemapNote>)> {
        let base = render(request)?;
        let started = Instant::now();

        let mut corrective = String::new();
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut attempts_made = 0u32;

        for attempt in 1..=self.config.max_attempts {
            let elapsed = started.elapsed();
            if elapsed >= self.config.request_deadline {
                warn!(
                    "request deadline {:?} exhausted before attempt {}",
                    self.config.request_deadline, attempt
                );
                failures.push(AttemptFailure {
                    attempt,
                    fault: AttemptFault::Transport(TransportError::Timeout(
                        self.config.request_deadline,
                    )),
                });
                break;
            }
            attempts_made = attempt;

            self.emit(PipelineEvent::Drafting { attempt }).await;
            let mut prompt: RenderedPrompt = base.clone();
            prompt.user.push_str(&corrective);

            let call_timeout = self
                .config
                .generation_timeout
                .min(self.config.request_deadline - elapsed);

            self.emit(PipelineEvent::AwaitingResponse { attempt }).await;
            let mut record = GenerationAttempt {
                attempt_number: attempt,
                prompt_text: prompt.user.clone(),
                raw_response: None,
                transport_error: None,
            };

            let raw = match self.service.generate(&prompt, call_timeout).await {
                Ok(raw) => {
                    record.raw_response = Some(raw.clone());
                    debug!("attempt {}: received {} bytes", attempt, raw.len());
                    raw
                }
                Err(fault) => {
                    record.transport_error = Some(fault.clone());
                    warn!("attempt {}: transport fault: {}", attempt, fault);
                    failures.push(AttemptFailure {
                        attempt,
                        fault: AttemptFault::Transport(fault),
                    });
                    continue;
                }
            };
            debug!("{:?}", record);

            self.emit(PipelineEvent::Decoding { attempt }).await;
            let candidate = match decode(&raw) {
                Ok(candidate) => candidate,
                Err(error) => {
                    warn!("attempt {}: decode failed: {}", attempt, error);
                    corrective = decode_repair_instruction(&error);
                    self.emit(PipelineEvent::Repairing {
                        attempt,
                        reason: error.to_string(),
                    })
                    .await;
                    failures.push(AttemptFailure {
                        attempt,
                        fault: AttemptFault::Decode(error),
                    });
                    continue;
                }
            };

            self.emit(PipelineEvent::Validating { attempt }).await;
            let validated = match validate(&candidate, schema_kind) {
                ValidationOutcome::Accepted(value) => value,
                ValidationOutcome::Rejected(issues) => {
                    warn!(
                        "attempt {}: {} schema issue(s), re-prompting",
                        attempt,
                        issues.len()
                    );
                    corrective = repair_instruction(&issues);
                    self.emit(PipelineEvent::Repairing {
                        attempt,
                        reason: summarize(&issues),
                    })
                    .await;
                    failures.push(AttemptFailure {
                        attempt,
                        fault: AttemptFault::Validation(issues),
                    });
                    continue;
                }
            };

            self.emit(PipelineEvent::Reconciling { attempt }).await;
            match reconcile(validated, schema_kind, self.config.sum_tolerance) {
                Ok(reconciled) => {
                    info!(
                        "pipeline accepted after {} attempt(s), {} category remap(s)",
                        attempt,
                        reconciled.remapped.len()
                    );
                    self.emit(PipelineEvent::Accepted {
                        attempts_used: attempt,
                    })
                    .await;
                    return Ok((reconciled.value, attempt, reconciled.remapped));
                }
                Err(issues) => {
                    warn!(
                        "attempt {}: {} reconciliation issue(s), re-prompting",
                        attempt,
                        issues.len()
                    );
                    corrective = repair_instruction(&issues);
                    self.emit(PipelineEvent::Repairing {
                        attempt,
                        reason: summarize(&issues),
                    })
                    .await;
                    failures.push(AttemptFailure {
                        attempt,
                        fault: AttemptFault::Validation(issues),
                    });
                    continue;
                }
            }
        }

        self.emit(PipelineEvent::Failed {
            attempts: attempts_made,
        })
        .await;
        Err(BudgetAdvisorError::PipelineFailed {
            attempts: attempts_made,
            failures,
        })
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }
}

fn summarize(issues: &[crate::error::ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
