//! `confluence_creation` node: only reached when `evaluation` saw a successful ticket and a
//! wiki capability exists (spec §4.3).

use crate::handlers::jira_creation::reply_for as ticket_reply_for;
use crate::handlers::HandlerContext;
use crate::model::{AgentState, ChatMessage, ToolResult, ToolUsed};

pub async fn run(state: &mut AgentState, ctx: &HandlerContext) {
    let ticket_succeeded = state.jira_result.as_ref().map(|r| r.success).unwrap_or(false);
    let title = state
        .jira_result
        .as_ref()
        .and_then(|r| r.title.clone())
        .unwrap_or_else(|| format!("Notes: {}", state.user_input.chars().take(60).collect::<String>()));

    let html_body = format!(
        "<h1>{}</h1><p>{}</p>",
        title,
        state.jira_result.as_ref().and_then(|r| r.id.clone()).unwrap_or_default()
    );

    let result = match &ctx.dispatcher {
        Some(dispatcher) => dispatcher.create_wiki_page(&title, &html_body, ticket_succeeded).await,
        None => ToolResult::failure(
            ToolUsed::DirectApi,
            crate::errors::ErrorKind::ToolUnavailable,
            "wiki capability is not configured",
            serde_json::Value::Null,
        ),
    };

    let wiki_note = if result.success {
        match &result.link {
            Some(link) => format!("Also created a wiki page: {}", link),
            None => "Also created a wiki page.".to_string(),
        }
    } else {
        result
            .error_kind
            .map(|kind| kind.user_template().to_string())
            .unwrap_or_else(|| "The ticket was created, but I couldn't create the wiki page.".to_string())
    };

    // `confluence_creation` runs last and owns the final assistant message (spec §4.3), so it
    // must restate the ticket outcome here rather than letting `jira_creation`'s earlier,
    // now-superseded message carry it alone (spec §8 Scenario 1: the reply must mention both
    // the ticket and the wiki page).
    let ticket_note = match &state.jira_result {
        Some(r) => ticket_reply_for(r),
        None => String::new(),
    };

    state.push_message(ChatMessage::assistant(format!("{} {}", ticket_note, wiki_note)));
    state.confluence_result = Some(result);
}
