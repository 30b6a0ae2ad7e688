//! `evaluation` node: scores a freshly created ticket (unconditional successor of
//! `jira_creation`, spec §4.3).

use crate::handlers::HandlerContext;
use crate::model::{AgentState, EvaluationResult};

pub async fn run(state: &mut AgentState, _ctx: &HandlerContext) {
    let Some(jira_result) = state.jira_result.as_ref() else {
        return;
    };

    if !jira_result.success {
        state.evaluation_result = Some(EvaluationResult {
            score: 0,
            notes: Some("ticket creation failed; nothing to evaluate".to_string()),
        });
        return;
    }

    let has_title = jira_result.title.is_some();
    let has_id = jira_result.id.is_some();
    let score = 50 + if has_title { 25 } else { 0 } + if has_id { 25 } else { 0 };

    state.evaluation_result = Some(EvaluationResult {
        score,
        notes: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{ToolResult, ToolUsed};
    use serde_json::Value;

    #[tokio::test]
    async fn scores_successful_ticket_with_id_and_title() {
        let ctx = HandlerContext::for_tests(Config::default());
        let mut state = AgentState::new("x", vec![]);
        state.jira_result = Some(ToolResult::success(
            ToolUsed::RemoteProtocol,
            Some("PROJ-1".to_string()),
            None,
            Some("Title".to_string()),
            Value::Null,
        ));
        run(&mut state, &ctx).await;
        assert_eq!(state.evaluation_result.as_ref().unwrap().score, 100);
    }

    #[tokio::test]
    async fn zero_score_when_ticket_creation_failed() {
        let ctx = HandlerContext::for_tests(Config::default());
        let mut state = AgentState::new("x", vec![]);
        state.jira_result = Some(ToolResult::failure(
            ToolUsed::DirectApi,
            crate::errors::ErrorKind::ToolUnavailable,
            "nope",
            Value::Null,
        ));
        run(&mut state, &ctx).await;
        assert_eq!(state.evaluation_result.as_ref().unwrap().score, 0);
    }
}
