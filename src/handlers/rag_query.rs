//! `rag_query` node: answers using the optional retrieval collaborator (spec §6
//! "Retrieval service").

use crate::handlers::HandlerContext;
use crate::model::{AgentState, ChatMessage};

const ANSWER_SYSTEM_PROMPT: &str = "Answer the user's question using only the provided context. \
     If the context does not contain the answer, say so plainly.";

pub async fn run(state: &mut AgentState, ctx: &HandlerContext) {
    let Some(retrieval) = &ctx.retrieval else {
        state.push_message(ChatMessage::assistant(
            crate::errors::ErrorKind::ToolUnavailable.user_template(),
        ));
        return;
    };

    let context = match retrieval.get_context(&state.user_input, 3).await {
        Ok(context) => context,
        Err(e) => {
            log::warn!("rag_query: retrieval lookup failed: {}", e);
            None
        }
    };

    let Some(context) = context else {
        state.push_message(ChatMessage::assistant(
            "I couldn't find anything relevant to answer that.".to_string(),
        ));
        return;
    };

    state.rag_context = Some(context.clone());

    let reply = match &ctx.llm {
        Some(llm) => {
            let user_prompt = format!("Context:\n{}\n\nQuestion: {}", context, state.user_input);
            match llm.generate(ANSWER_SYSTEM_PROMPT, &user_prompt, 0.2, false).await {
                Ok(answer) => answer,
                Err(e) => {
                    log::warn!("rag_query: answer generation failed: {}", e);
                    context
                }
            }
        }
        None => context,
    };

    state.push_message(ChatMessage::assistant(reply));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn reports_unavailable_without_a_retrieval_service() {
        let ctx = HandlerContext::for_tests(Config::default());
        let mut state = AgentState::new("what is the acceptance criteria for PROJ-1?", vec![]);
        run(&mut state, &ctx).await;
        assert!(state.rag_context.is_none());
        assert!(state.last_assistant_reply().is_some());
    }
}
