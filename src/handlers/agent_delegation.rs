//! `agent_delegation` node: hands the request to the optional delegation collaborator
//! (spec §6 "collaborators").

use crate::handlers::HandlerContext;
use crate::model::{AgentState, ChatMessage};

pub async fn run(state: &mut AgentState, ctx: &HandlerContext) {
    let Some(delegation) = &ctx.delegation else {
        state.push_message(ChatMessage::assistant(
            crate::errors::ErrorKind::ToolUnavailable.user_template(),
        ));
        return;
    };

    let reply = match delegation.delegate(&state.user_input).await {
        Ok(reply) => reply,
        Err(e) => {
            log::warn!("agent_delegation: delegate call failed: {}", e);
            crate::errors::ErrorKind::Internal.user_template().to_string()
        }
    };

    state.agent_result = Some(reply.clone());
    state.push_message(ChatMessage::assistant(reply));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn reports_unavailable_without_a_delegation_agent() {
        let ctx = HandlerContext::for_tests(Config::default());
        let mut state = AgentState::new("delegate this to the agent", vec![]);
        run(&mut state, &ctx).await;
        assert!(state.agent_result.is_none());
        assert!(state.last_assistant_reply().is_some());
    }
}
