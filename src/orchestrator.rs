//! C1 — Orchestrator: the entry point (spec §4.1).
//!
//! Grounded in the teacher's composition-root pattern (explicit dependency injection, no
//! module-level singletons) and in `examples/CloudLLM-ai-cloudllm/src/cloudllm/orchestration.rs`'s
//! deadline/iteration-bound wrapping of a graph run, reduced to the single linear graph
//! spec.md names. Panic isolation uses `futures_util::FutureExt::catch_unwind` the way a
//! `tokio::spawn`'d worker would isolate a panicking task, without requiring `'static` state
//! (the handler context is borrowed for the call's duration).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;

use crate::errors::AppError;
use crate::handlers::HandlerContext;
use crate::intent::{Capabilities, IntentClassifier};
use crate::model::{AgentState, HistoryTurn, IntentDecision, Request};
use crate::router::{Router, RouterCapabilities};

const MAX_HISTORY_ENTRIES: usize = 10;
const GLOBAL_DEADLINE_CAP: Duration = Duration::from_secs(5 * 60);

/// Everything about a completed run that isn't the reply text itself (spec §4.1 contract:
/// `Handle(Request) → (assistant_reply, diagnostics)`).
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub intent: Option<IntentDecision>,
    pub hops: u32,
    pub error: Option<String>,
}

pub struct Orchestrator {
    intent_classifier: IntentClassifier,
    handler_context: HandlerContext,
    router_capabilities: RouterCapabilities,
    intent_capabilities: Capabilities,
}

impl Orchestrator {
    pub fn new(intent_classifier: IntentClassifier, handler_context: HandlerContext) -> Self {
        let config = &handler_context.config;
        let has_ticket = config.has_ticket_capability();
        let has_wiki = config.has_wiki_capability();
        let has_retrieval = handler_context.retrieval.is_some();
        let has_delegation = handler_context.delegation.is_some() && config.agent_delegation_enabled;

        Self {
            intent_classifier,
            router_capabilities: RouterCapabilities {
                has_ticket,
                has_wiki,
                has_retrieval,
                has_delegation,
            },
            intent_capabilities: Capabilities {
                has_ticket,
                has_retrieval,
                has_delegation,
            },
            handler_context,
        }
    }

    /// Never panics across this boundary; any internal failure becomes an apology reply
    /// plus a diagnostic (spec §4.1 contract: "never throws").
    pub async fn handle(&self, request: Request) -> (String, Diagnostics) {
        let mut state = AgentState::new(request.user_input.clone(), recent_history(&request.history));
        state.push_message(crate::model::ChatMessage::user(request.user_input.clone()));

        let decision = self
            .intent_classifier
            .classify(&request.user_input, &state.history, self.intent_capabilities)
            .await;
        state.set_intent(decision.intent);

        let global_deadline = std::cmp::min(request.deadline, Instant::now() + GLOBAL_DEADLINE_CAP);
        let now = Instant::now();

        let error = if global_deadline <= now {
            log::warn!("orchestrator: global deadline already expired before routing began");
            let app_err = AppError::timeout("global deadline expired before routing began");
            append_apology(&mut state, &app_err);
            Some(app_err.to_string())
        } else {
            let remaining = global_deadline - now;
            let router = Router::new(self.router_capabilities, &self.handler_context);
            let run = AssertUnwindSafe(router.run(&mut state)).catch_unwind();

            match tokio::time::timeout(remaining, run).await {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(app_err))) => {
                    log::error!("orchestrator: router returned an error: {}", app_err);
                    append_apology(&mut state, &app_err);
                    Some(app_err.to_string())
                }
                Ok(Err(_panic)) => {
                    log::error!("orchestrator: handler panicked mid-run");
                    let app_err = AppError::internal("handler panicked");
                    append_apology(&mut state, &app_err);
                    Some(app_err.to_string())
                }
                Err(_timeout) => {
                    log::warn!("orchestrator: global deadline expired");
                    let app_err = AppError::timeout("global deadline expired");
                    append_apology(&mut state, &app_err);
                    Some(app_err.to_string())
                }
            }
        };

        let reply = state
            .last_assistant_reply()
            .map(str::to_string)
            .unwrap_or_else(|| "Sorry, something went wrong and I couldn't respond.".to_string());

        let diagnostics = Diagnostics {
            intent: Some(decision),
            hops: state.hops,
            error,
        };

        (reply, diagnostics)
    }
}

fn recent_history(history: &[HistoryTurn]) -> Vec<HistoryTurn> {
    let start = history.len().saturating_sub(MAX_HISTORY_ENTRIES);
    history[start..].to_vec()
}

fn append_apology(state: &mut AgentState, error: &AppError) {
    state.push_message(crate::model::ChatMessage::assistant(error.kind.user_template().to_string()));
}

/// Convenience constructor bundling the composition-root wiring a binary would otherwise
/// have to repeat (spec §9 design note: explicit DI, no ambient singleton).
pub fn build_orchestrator(
    config: crate::config::Config,
    llm: Option<Arc<dyn crate::llm::LlmProvider>>,
    dispatcher: Option<Arc<crate::tools::dispatcher::ToolDispatcher>>,
    retrieval: Option<Arc<dyn crate::collaborators::RetrievalService>>,
    delegation: Option<Arc<dyn crate::collaborators::DelegationAgent>>,
) -> Orchestrator {
    let intent_classifier = IntentClassifier::new(
        llm.clone(),
        config.intent_use_llm,
        config.intent_llm_timeout,
        config.intent_confidence_threshold,
        config.intent_llm_temperature,
        config.intent_cache_capacity,
    );
    let handler_context = HandlerContext::new(config, dispatcher, llm, retrieval, delegation);
    Orchestrator::new(intent_classifier, handler_context)
}
