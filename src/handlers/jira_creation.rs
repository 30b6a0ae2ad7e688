//! `jira_creation` node (spec §4.4 "Preparation (ticket creation)").

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::handlers::HandlerContext;
use crate::model::{ChatMessage, ToolResult, ToolUsed};
use crate::tools::response_parser::strip_code_fences;

const TICKET_SYSTEM_PROMPT: &str = "You write well-formed Jira ticket content. Given a user's \
     request, respond with a single JSON object with fields: summary, description, priority \
     (one of low/medium/high), acceptance_criteria, business_value, invest_analysis. Return \
     JSON only, no prose.";

pub async fn run(state: &mut crate::model::AgentState, ctx: &HandlerContext) {
    let fields = generate_ticket_fields(&state.user_input, ctx).await;

    let result = match &ctx.dispatcher {
        Some(dispatcher) => dispatcher.create_ticket(fields).await,
        None => ToolResult::failure(
            ToolUsed::DirectApi,
            crate::errors::ErrorKind::ToolUnavailable,
            "ticketing capability is not configured",
            Value::Null,
        ),
    };

    state.push_message(ChatMessage::assistant(reply_for(&result)));
    state.jira_result = Some(result);
}

async fn generate_ticket_fields(user_input: &str, ctx: &HandlerContext) -> BTreeMap<String, Value> {
    if let Some(llm) = &ctx.llm {
        let generated = llm
            .generate(TICKET_SYSTEM_PROMPT, user_input, 0.3, llm.supports_json_mode())
            .await;

        if let Ok(raw) = generated {
            if let Some(fields) = parse_ticket_fields(&raw) {
                return fields;
            }
            log::warn!("jira_creation: LLM ticket content was not valid JSON, using fallback fields");
        } else if let Err(e) = generated {
            log::warn!("jira_creation: LLM ticket content generation failed: {}", e);
        }
    }

    default_fields(user_input)
}

fn parse_ticket_fields(raw: &str) -> Option<BTreeMap<String, Value>> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned.trim()).ok()?;
    let obj = value.as_object()?;
    Some(obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn default_fields(user_input: &str) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("summary".to_string(), json!(user_input.chars().take(120).collect::<String>()));
    fields.insert("description".to_string(), json!(user_input));
    fields.insert("priority".to_string(), json!("medium"));
    fields
}

/// Renders the assistant-facing summary of a ticket-creation attempt. Shared with
/// `confluence_creation`, which prepends this before its own wiki-page summary so the final
/// reply still mentions the ticket even though `confluence_creation` runs last and owns the
/// last assistant message (spec §8 Scenario 1: the reply must contain both outcomes).
pub(crate) fn reply_for(result: &ToolResult) -> String {
    if result.success {
        match (&result.id, &result.link) {
            (Some(id), Some(link)) => format!("Created ticket {}: {}", id, link),
            (Some(id), None) => format!("Created ticket {}.", id),
            _ => "Created the ticket.".to_string(),
        }
    } else {
        result
            .error_kind
            .map(|kind| kind.user_template().to_string())
            .unwrap_or_else(|| "Sorry, I couldn't create the ticket.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::AgentState;

    #[tokio::test]
    async fn falls_back_to_unavailable_message_without_a_dispatcher() {
        let ctx = HandlerContext::for_tests(Config::default());
        let mut state = AgentState::new("create a jira ticket: fix login bug", vec![]);
        run(&mut state, &ctx).await;
        assert!(!state.jira_result.as_ref().unwrap().success);
        assert_eq!(
            state.jira_result.as_ref().unwrap().error_kind,
            Some(crate::errors::ErrorKind::ToolUnavailable)
        );
        assert!(state.last_assistant_reply().is_some());
    }

    #[test]
    fn parses_fenced_json_ticket_fields() {
        let raw = "```json\n{\"summary\": \"Fix bug\", \"priority\": \"high\"}\n```";
        let fields = parse_ticket_fields(raw).unwrap();
        assert_eq!(fields["summary"], json!("Fix bug"));
    }
}
