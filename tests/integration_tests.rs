use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use budget_advisor_engine::{
    AdvisorEngine, AttemptFault, BudgetAdvisorError, EngineConfig, GenerationService, IssueKind,
    RenderedPrompt, TransportError, FALLBACK_REPLY,
};

/// A generation service that replays a fixed script of outcomes and records
/// every prompt it was sent.
#[derive(Clone, Default)]
struct ScriptedService {
    inner: Arc<ScriptInner>,
}

#[derive(Default)]
struct ScriptInner {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedService {
    fn new(script: Vec<Result<String, TransportError>>) -> Self {
        Self {
            inner: Arc::new(ScriptInner {
                responses: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            }),
        }
    }

    fn calls(&self) -> usize {
        self.inner.prompts.lock().unwrap().len()
    }

    fn prompt(&self, call: usize) -> String {
        self.inner.prompts.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        self.inner.prompts.lock().unwrap().push(prompt.user.clone());
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unknown("script exhausted".to_string())))
    }
}

fn engine(service: ScriptedService) -> AdvisorEngine<ScriptedService> {
    AdvisorEngine::new(service, EngineConfig::default()).unwrap()
}

fn budget_json(income: f64, needs: f64, wants: f64, savings: f64) -> String {
    format!(
        r#"{{
            "monthly_income": {income},
            "monthly_expenses": 20000.0,
            "monthly_savings_potential": 10000.0,
            "budget_breakdown": {{
                "needs_50_percent": {needs},
                "wants_30_percent": {wants},
                "savings_20_percent": {savings}
            }},
            "advice": {{
                "summary": "A workable plan toward the car.",
                "action_steps": ["Open a separate car fund", "Automate a monthly transfer"],
                "goal_projection": "At this rate the car is affordable in 15 months."
            }}
        }}"#
    )
}

// Scenario A: first split sums to 49000 against an income of 50000; the
// repair prompt must name the sum mismatch and the corrected second attempt
// is accepted.
#[tokio::test]
async fn budget_sum_mismatch_repaired_on_second_attempt() {
    let service = ScriptedService::new(vec![
        Ok(budget_json(50000.0, 24000.0, 15000.0, 10000.0)),
        Ok(budget_json(50000.0, 25000.0, 15000.0, 10000.0)),
    ]);
    let engine = engine(service.clone());

    let outcome = engine
        .budget_plan(50000.0, 20000.0, "buy a car")
        .await
        .unwrap();

    assert_eq!(outcome.attempts_used, 2);
    assert!(outcome.remapped.is_empty());
    assert_eq!(outcome.value.budget_breakdown.total(), 50000.0);

    assert_eq!(service.calls(), 2);
    let repair_prompt = service.prompt(1);
    assert!(repair_prompt.contains("failed validation"));
    assert!(repair_prompt.contains("recompute"));
    assert!(repair_prompt.contains("monthly_income"));
    // The original request text is preserved ahead of the corrective clause.
    assert!(repair_prompt.contains("buy a car"));
}

// Accepted plans always satisfy the 50/30/20 invariant within tolerance.
#[tokio::test]
async fn accepted_budget_always_sums_within_tolerance() {
    let service = ScriptedService::new(vec![Ok(budget_json(
        50000.0, 24950.0, 15000.0, 10000.0,
    ))]);
    let engine = engine(service);

    let outcome = engine
        .budget_plan(50000.0, 20000.0, "emergency fund")
        .await
        .unwrap();

    let plan = &outcome.value;
    let sum = plan.budget_breakdown.total();
    assert!(((sum - plan.monthly_income) / plan.monthly_income).abs() <= 0.01);
    assert_eq!(outcome.attempts_used, 1);
}

// Scenario B, retry half: a non-numeric amount cannot be defaulted and must
// go back to the model.
#[tokio::test]
async fn non_numeric_amount_triggers_repair() {
    let bad = r#"[{"date": "2024-01-05", "description": "Rent", "amount": "abc", "category": "Rent/EMI"}]"#;
    let good = r#"[{"date": "2024-01-05", "description": "Rent", "amount": -800.0, "category": "Rent/EMI"}]"#;
    let service = ScriptedService::new(vec![Ok(bad.to_string()), Ok(good.to_string())]);
    let engine = engine(service.clone());

    let outcome = engine
        .categorize("date,description,amount\n2024-01-05,Rent,-800")
        .await
        .unwrap();

    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(outcome.value.len(), 1);
    assert_eq!(outcome.value[0].amount, -800.0);

    let repair_prompt = service.prompt(1);
    assert!(repair_prompt.contains("amount"));
}

// Scenario B, remap half: an out-of-set category alone is corrected locally
// with no second generation call.
#[tokio::test]
async fn out_of_set_category_remapped_without_retry() {
    let response = r#"[
        {"date": "2024-01-05", "description": "Cafe", "amount": -12.5, "category": "Food"},
        {"date": "2024-01-06", "description": "Bus pass", "amount": -40.0, "category": "Transport"}
    ]"#;
    let service = ScriptedService::new(vec![Ok(response.to_string())]);
    let engine = engine(service.clone());

    let outcome = engine.categorize("raw csv").await.unwrap();

    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(service.calls(), 1);
    assert_eq!(outcome.remapped.len(), 1);
    assert_eq!(outcome.remapped[0].index, 0);
    assert_eq!(outcome.remapped[0].original_label, "Food");
    assert_eq!(
        outcome.value[0].category,
        budget_advisor_engine::Category::Miscellaneous
    );
    assert_eq!(
        outcome.value[1].category,
        budget_advisor_engine::Category::Transport
    );
}

// Scenario C: the service times out on every attempt; the failure history
// contains timeout entries only.
#[tokio::test]
async fn persistent_timeouts_fail_with_transport_history() {
    let timeout = TransportError::Timeout(Duration::from_secs(30));
    let service = ScriptedService::new(vec![
        Err(timeout.clone()),
        Err(timeout.clone()),
        Err(timeout.clone()),
    ]);
    let engine = engine(service.clone());

    let err = engine
        .budget_plan(50000.0, 20000.0, "buy a car")
        .await
        .unwrap_err();

    let BudgetAdvisorError::PipelineFailed { attempts, failures } = err else {
        panic!("expected PipelineFailed");
    };
    assert_eq!(attempts, 3);
    assert_eq!(failures.len(), 3);
    assert_eq!(service.calls(), 3);
    for failure in &failures {
        assert!(
            matches!(
                failure.fault,
                AttemptFault::Transport(TransportError::Timeout(_))
            ),
            "unexpected fault: {:?}",
            failure.fault
        );
    }
}

// The controller makes exactly max_attempts calls when every response fails
// validation, and records one failure per attempt.
#[tokio::test]
async fn attempt_budget_is_exact() {
    let bad = budget_json(50000.0, 10000.0, 10000.0, 10000.0);
    let service = ScriptedService::new(vec![
        Ok(bad.clone()),
        Ok(bad.clone()),
        Ok(bad.clone()),
        Ok(bad.clone()),
    ]);
    let engine = engine(service.clone());

    let err = engine
        .budget_plan(50000.0, 20000.0, "buy a car")
        .await
        .unwrap_err();

    let BudgetAdvisorError::PipelineFailed { attempts, failures } = err else {
        panic!("expected PipelineFailed");
    };
    assert_eq!(attempts, 3);
    assert_eq!(failures.len(), 3);
    assert_eq!(service.calls(), 3, "never more calls than the budget");

    for (idx, failure) in failures.iter().enumerate() {
        assert_eq!(failure.attempt, idx as u32 + 1);
        let AttemptFault::Validation(issues) = &failure.fault else {
            panic!("expected validation fault");
        };
        assert!(issues.iter().any(|i| i.kind == IssueKind::SumMismatch));
    }
}

// Responses wrapped in prose and fences decode identically to bare JSON.
#[tokio::test]
async fn fenced_response_accepted_first_attempt() {
    let wrapped = format!(
        "Here you go:\n```json\n{}\n```\nLet me know if you need anything else!",
        budget_json(50000.0, 25000.0, 15000.0, 10000.0)
    );
    let service = ScriptedService::new(vec![Ok(wrapped)]);
    let engine = engine(service);

    let outcome = engine
        .budget_plan(50000.0, 20000.0, "buy a car")
        .await
        .unwrap();
    assert_eq!(outcome.attempts_used, 1);
}

// A response with no JSON at all is retry-eligible and the repair prompt
// demands a bare payload.
#[tokio::test]
async fn prose_only_response_triggers_decode_repair() {
    let service = ScriptedService::new(vec![
        Ok("I'm sorry, I can't produce that.".to_string()),
        Ok(budget_json(50000.0, 25000.0, 15000.0, 10000.0)),
    ]);
    let engine = engine(service.clone());

    let outcome = engine
        .budget_plan(50000.0, 20000.0, "buy a car")
        .await
        .unwrap();

    assert_eq!(outcome.attempts_used, 2);
    assert!(service.prompt(1).contains("could not be parsed as JSON"));
}

// A missing placeholder is a caller programming error: it fails before any
// generation call and is never retried.
#[tokio::test]
async fn missing_template_field_fails_without_calls() {
    use budget_advisor_engine::{ContractPipeline, PromptRequest, TemplateKind};

    let service = ScriptedService::default();
    let pipeline = ContractPipeline::new(service.clone(), EngineConfig::default()).unwrap();

    let request = PromptRequest::new(TemplateKind::BudgetPlan, Default::default());
    let err = pipeline.run_budget(&request).await.unwrap_err();

    assert!(matches!(
        err,
        BudgetAdvisorError::TemplateFieldMissing { .. }
    ));
    assert_eq!(service.calls(), 0);
}

// The advice flow post-filters rather than retries: unsafe sentences are
// dropped and bounded output returned.
#[tokio::test]
async fn advice_reply_is_filtered_and_bounded() {
    let service = ScriptedService::new(vec![Ok(
        "Build an emergency fund first. This plan has a guaranteed return of 20%. \
         Review your spending monthly. Then diversify. And another thing."
            .to_string(),
    )]);
    let engine = engine(service.clone());

    let reply = engine.advice("How should I start investing?").await.unwrap();

    assert!(!reply.to_lowercase().contains("guaranteed"));
    assert!(reply.contains("emergency fund"));
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn fully_unsafe_advice_falls_back_deterministically() {
    let service = ScriptedService::new(vec![Ok(
        "This risk-free scheme will double your money!".to_string()
    )]);
    let engine = engine(service);

    let reply = engine.advice("Any hot tips?").await.unwrap();
    assert_eq!(reply, FALLBACK_REPLY);
}

// Transport faults from the advice flow surface directly once the client's
// own retry budget is spent.
#[tokio::test]
async fn advice_transport_fault_surfaces() {
    let service = ScriptedService::new(vec![Err(TransportError::RateLimited)]);
    let engine = engine(service);

    let err = engine.advice("hello").await.unwrap_err();
    assert!(matches!(
        err,
        BudgetAdvisorError::Transport(TransportError::RateLimited)
    ));
}
