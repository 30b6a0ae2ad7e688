//! `general_chat` node: the default conversational fallback.

use crate::handlers::HandlerContext;
use crate::model::{AgentState, ChatMessage};

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant for a ticketing and knowledge-base \
     system. Answer conversationally and briefly.";

pub async fn run(state: &mut AgentState, ctx: &HandlerContext) {
    let reply = match &ctx.llm {
        Some(llm) => match llm.generate(CHAT_SYSTEM_PROMPT, &state.user_input, 0.5, false).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("general_chat: reply generation failed: {}", e);
                "Sorry, I'm having trouble responding right now.".to_string()
            }
        },
        None => "Hi! I can help create tickets, look up documentation, or just chat.".to_string(),
    };

    state.push_message(ChatMessage::assistant(reply));
}
