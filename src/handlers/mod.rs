//! Handler nodes the [`crate::router::Router`] dispatches to (spec §4.3).
//!
//! Each handler owns exactly the `AgentState` fields its node name implies and never lets a
//! raw error cross back into the router: failures are caught, classified, and written as a
//! templated assistant message (spec §7: "Handlers catch internally... The Router and
//! Orchestrator never see a raw exception type").

pub mod agent_delegation;
pub mod confluence_creation;
pub mod evaluation;
pub mod general_chat;
pub mod jira_creation;
pub mod rag_query;

use std::sync::Arc;

use crate::collaborators::{DelegationAgent, RetrievalService};
use crate::config::Config;
use crate::llm::LlmProvider;
use crate::tools::dispatcher::ToolDispatcher;

/// Shared, read-only collaborator handles every handler may need. Constructed once per
/// process by the composition root, not per request (spec §5: collaborators are long-lived;
/// only `AgentState` is per-request).
pub struct HandlerContext {
    pub config: Config,
    pub dispatcher: Option<Arc<ToolDispatcher>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub retrieval: Option<Arc<dyn RetrievalService>>,
    pub delegation: Option<Arc<dyn DelegationAgent>>,
}

impl HandlerContext {
    pub fn new(
        config: Config,
        dispatcher: Option<Arc<ToolDispatcher>>,
        llm: Option<Arc<dyn LlmProvider>>,
        retrieval: Option<Arc<dyn RetrievalService>>,
        delegation: Option<Arc<dyn DelegationAgent>>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            llm,
            retrieval,
            delegation,
        }
    }

    #[cfg(test)]
    pub fn for_tests(config: Config) -> Self {
        Self {
            config,
            dispatcher: None,
            llm: None,
            retrieval: None,
            delegation: None,
        }
    }
}
