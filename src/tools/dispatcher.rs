//! C4 — ToolDispatcher: the protocol-first tool invocation layer (spec §4.4).
//!
//! Tries a remote tool server first, falls back to a direct API client on timeout/parse
//! failure/schema-validation failure/explicit error, and normalizes both paths into a single
//! [`ToolResult`] shape. Grounded in `examples/original_source/src/mcp/mcp_integration.py`'s
//! try-remote-then-direct shape and `examples/CloudLLM-ai-cloudllm/src/cloudllm/tool_protocols.rs`'s
//! timeout-wrapped worker-and-await pattern (`clients/common.rs`'s `send_and_track*` helpers
//! use the same "spawn under timeout, synthesize a result on expiry" idiom).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::binder::ArgumentBinder;
use crate::errors::ErrorKind;
use crate::markdown::html_to_markdown;
use crate::model::{ToolDescriptor, ToolResult, ToolUsed};
use crate::tools::direct::DirectApiBackend;
use crate::tools::protocol::{ToolKind, ToolProtocol};
use crate::tools::response_parser::{self, ParsedResponse};

const TICKET_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const WIKI_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const INFO_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const WRAPPER_SLACK: Duration = Duration::from_secs(15);

/// Why a remote attempt didn't produce a usable [`ToolResult`] and should fall back to the
/// direct client (spec §4.4 "Fallback decisions").
enum FallbackReason {
    Timeout,
    Protocol(String),
    SchemaValidation(String),
}

pub struct ToolDispatcher {
    remote: Option<Arc<dyn ToolProtocol>>,
    direct: Arc<dyn DirectApiBackend>,
    project_key: String,
    space_key: String,
}

impl ToolDispatcher {
    pub fn new(
        remote: Option<Arc<dyn ToolProtocol>>,
        direct: Arc<dyn DirectApiBackend>,
        project_key: impl Into<String>,
        space_key: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            direct,
            project_key: project_key.into(),
            space_key: space_key.into(),
        }
    }

    /// Preparation + invocation for ticket creation (spec §4.4 "Preparation (ticket
    /// creation)"). `fields` is the already-parsed `{summary, description, priority,
    /// acceptance_criteria, business_value, invest_analysis}` record from the LLM.
    pub async fn create_ticket(&self, fields: BTreeMap<String, Value>) -> ToolResult {
        if let Some(remote) = self.remote.clone() {
            match self.find_remote_tool(remote.as_ref(), ToolKind::CreateTicket).await {
                Ok(Some(tool)) => match self.invoke_remote(remote.as_ref(), &tool, &fields, None, TICKET_CALL_TIMEOUT).await {
                    Ok(result) => return result,
                    Err(reason) => {
                        log_fallback("create_ticket", &reason);
                        return self.fallback_create_ticket(&fields, Some(reason_message(reason))).await;
                    }
                },
                Ok(None) => {
                    log::info!("create_ticket: no remote tool matched create_ticket kind, using direct API");
                }
                Err(e) => {
                    log::warn!("create_ticket: remote registry unavailable ({}), using direct API", e);
                }
            }
        }

        self.direct_create_ticket(&fields, ToolUsed::DirectApi, None).await
    }

    async fn fallback_create_ticket(&self, fields: &BTreeMap<String, Value>, remote_error: Option<String>) -> ToolResult {
        self.direct_create_ticket(fields, ToolUsed::DirectApiFallback, remote_error).await
    }

    async fn direct_create_ticket(
        &self,
        fields: &BTreeMap<String, Value>,
        tool_used: ToolUsed,
        remote_error: Option<String>,
    ) -> ToolResult {
        let body = json!(fields);
        match self.direct.create_ticket(&self.project_key, &body).await {
            Ok(value) => {
                let parsed = response_parser::parse(&value, None);
                let mut result = to_tool_result(parsed, tool_used, value);
                if let Some(remote_error) = remote_error {
                    result = result.with_outcome_note(format!("remote attempt failed first: {}", remote_error));
                }
                result
            }
            Err(e) => {
                let message = match remote_error {
                    Some(remote_error) => format!("remote: {}; direct: {}", remote_error, e),
                    None => e.to_string(),
                };
                ToolResult::failure(tool_used, classify_transport_error(&e.to_string()), message, Value::Null)
            }
        }
    }

    /// Preparation + invocation for wiki page creation, which depends on ticket creation
    /// having succeeded (spec §4.4 "Preparation (wiki creation, depends on ticket creation
    /// success)").
    pub async fn create_wiki_page(&self, title: &str, html_body: &str, ticket_succeeded: bool) -> ToolResult {
        if !ticket_succeeded {
            return ToolResult::failure(
                ToolUsed::DirectApi,
                ErrorKind::Internal,
                "create_wiki_page called without a successful ticket creation",
                Value::Null,
            );
        }

        if let Some(remote) = self.remote.clone() {
            match self.find_remote_tool(remote.as_ref(), ToolKind::CreateWikiPage).await {
                Ok(Some(tool)) => {
                    let context = self.build_wiki_context(remote.as_ref(), &tool).await;
                    let body = self.render_body_for_schema(&tool, html_body);
                    let mut fields = BTreeMap::new();
                    fields.insert("title".to_string(), json!(title));
                    fields.insert("content".to_string(), json!(body));

                    match self.invoke_remote(remote.as_ref(), &tool, &fields, Some(&context), WIKI_CALL_TIMEOUT).await {
                        Ok(result) => return result,
                        Err(reason) => {
                            log_fallback("create_wiki_page", &reason);
                            return self.direct_create_wiki_page(title, html_body, ToolUsed::DirectApiFallback, Some(reason_message(reason))).await;
                        }
                    }
                }
                Ok(None) => log::info!("create_wiki_page: no remote tool matched create_wiki_page kind, using direct API"),
                Err(e) => log::warn!("create_wiki_page: remote registry unavailable ({}), using direct API", e),
            }
        }

        self.direct_create_wiki_page(title, html_body, ToolUsed::DirectApi, None).await
    }

    async fn direct_create_wiki_page(
        &self,
        title: &str,
        html_body: &str,
        tool_used: ToolUsed,
        remote_error: Option<String>,
    ) -> ToolResult {
        match self.direct.create_wiki_page(&self.space_key, title, html_body).await {
            Ok(value) => {
                let parsed = response_parser::parse(&value, Some(self.direct.base_url()));
                let mut result = to_tool_result(parsed, tool_used, value);
                if let Some(remote_error) = remote_error {
                    result = result.with_outcome_note(format!("remote attempt failed first: {}", remote_error));
                }
                result
            }
            Err(e) => {
                let message = match remote_error {
                    Some(remote_error) => format!("remote: {}; direct: {}", remote_error, e),
                    None => e.to_string(),
                };
                ToolResult::failure(tool_used, classify_transport_error(&e.to_string()), message, Value::Null)
            }
        }
    }

    /// Step 1/2 of wiki preparation: resolve `cloud_id` and `space_id` context values.
    async fn build_wiki_context(&self, remote: &dyn ToolProtocol, tool: &ToolDescriptor) -> BTreeMap<String, Value> {
        let mut context = BTreeMap::new();
        context.insert("contentFormat".to_string(), json!("markdown"));

        if looks_hosted_variant(&tool.name) {
            if let Some(cloud_id) = self.resolve_cloud_id(remote).await {
                context.insert("cloudId".to_string(), json!(cloud_id));
            }
        }

        if tool.input_schema.properties.contains_key("spaceId") {
            if let Some(space_id) = self.resolve_space_id(remote).await {
                context.insert("spaceId".to_string(), json!(space_id));
            }
        }

        context
    }

    async fn resolve_cloud_id(&self, remote: &dyn ToolProtocol) -> Option<String> {
        if let Ok(value) = tokio::time::timeout(INFO_CALL_TIMEOUT, remote.call_tool("getAccessibleAtlassianResources", json!({}))).await {
            if let Ok(value) = value {
                if let Some(id) = extract_first_id(&value, &["id", "cloudId"]) {
                    return Some(id);
                }
            }
        }

        self.direct.tenant_info().await.ok().and_then(|v| v.get("cloudId").and_then(|c| c.as_str()).map(str::to_string))
    }

    async fn resolve_space_id(&self, remote: &dyn ToolProtocol) -> Option<String> {
        if let Ok(value) = tokio::time::timeout(INFO_CALL_TIMEOUT, remote.call_tool("getConfluenceSpaces", json!({"keys": [self.space_key.clone()]}))).await
        {
            if let Ok(value) = value {
                if let Some(id) = extract_first_id(&value, &["id", "spaceId"]) {
                    return Some(id);
                }
            }
        }

        self.direct
            .space_info(&self.space_key)
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(value_to_string))
    }

    /// Step 4 of wiki preparation: convert to Markdown only when the target schema declares
    /// `contentFormat` with `markdown` among its allowed values.
    fn render_body_for_schema(&self, tool: &ToolDescriptor, html_body: &str) -> String {
        let wants_markdown = tool
            .input_schema
            .properties
            .get("contentFormat")
            .and_then(|p| p.allowed_values())
            .map(|values| values.iter().any(|v| v.as_str() == Some("markdown")))
            .unwrap_or(false);

        if wants_markdown {
            html_to_markdown(html_body)
        } else {
            html_body.to_string()
        }
    }

    async fn find_remote_tool(&self, remote: &dyn ToolProtocol, kind: ToolKind) -> Result<Option<ToolDescriptor>, Box<dyn std::error::Error + Send + Sync>> {
        let tools = remote.list_tools().await?;
        Ok(kind.find_in(&tools).cloned())
    }

    /// Build arguments, invoke the remote tool under the documented timeout pair, and parse
    /// its response. Returns a [`FallbackReason`] for anything the spec says should trigger
    /// a direct-API retry.
    async fn invoke_remote(
        &self,
        remote: &dyn ToolProtocol,
        tool: &ToolDescriptor,
        fields: &BTreeMap<String, Value>,
        context: Option<&BTreeMap<String, Value>>,
        inner_timeout: Duration,
    ) -> Result<ToolResult, FallbackReason> {
        let args = ArgumentBinder::build(&tool.input_schema, fields, context)
            .map_err(|e| FallbackReason::SchemaValidation(e.to_string()))?;

        let outer_timeout = inner_timeout + WRAPPER_SLACK;
        let call = remote.call_tool(&tool.name, json!(args));

        let outcome = match tokio::time::timeout(outer_timeout, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                let message = e.to_string();
                if is_duplicate_message(&message) {
                    return Ok(ToolResult::failure(ToolUsed::RemoteProtocol, ErrorKind::Conflict, message, Value::Null)
                        .with_outcome_note("remote may have already created the resource; not retried via direct client"));
                }
                return Err(FallbackReason::Protocol(message));
            }
            Err(_) => return Err(FallbackReason::Timeout),
        };

        let parsed = response_parser::parse(&outcome, None);
        match parsed.error_kind {
            Some(ErrorKind::Conflict) => Ok(to_tool_result(parsed, ToolUsed::RemoteProtocol, outcome)
                .with_outcome_note("remote reported a possible duplicate; not retried via direct client")),
            Some(_) => Err(FallbackReason::Protocol(parsed.error_message.unwrap_or_else(|| "remote tool returned an error".to_string()))),
            None => Ok(to_tool_result(parsed, ToolUsed::RemoteProtocol, outcome)),
        }
    }
}

fn to_tool_result(parsed: ParsedResponse, tool_used: ToolUsed, raw: Value) -> ToolResult {
    if parsed.success {
        ToolResult::success(tool_used, parsed.id, parsed.link, parsed.title, raw)
    } else {
        ToolResult::failure(
            tool_used,
            parsed.error_kind.unwrap_or(ErrorKind::ProtocolError),
            parsed.error_message.unwrap_or_else(|| "tool call failed".to_string()),
            raw,
        )
    }
}

/// Spec §4.4 step 1: "If the target tool's name indicates a hosted-variant ('Rovo'-style
/// camelCase)". The hosted integration's tools are named distinctly (e.g. `createPageRovo`)
/// rather than merely being camelCase, which every tool name in this protocol already is.
fn looks_hosted_variant(tool_name: &str) -> bool {
    tool_name.to_lowercase().contains("rovo")
}

fn is_duplicate_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already exists") || lower.contains("duplicate") || lower.contains("same title")
}

fn extract_first_id(value: &Value, keys: &[&str]) -> Option<String> {
    if let Some(array) = value.as_array() {
        return array.first().and_then(|v| extract_first_id(v, keys));
    }
    for key in keys {
        if let Some(v) = value.get(key) {
            if let Some(s) = value_to_string(v) {
                return Some(s);
            }
        }
    }
    None
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn classify_transport_error(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("401") || lower.contains("403") || lower.contains("unauthorized") {
        ErrorKind::AuthError
    } else if lower.contains("429") || lower.contains("rate limit") {
        ErrorKind::RateLimit
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ErrorKind::Timeout
    } else {
        ErrorKind::ConnectionError
    }
}

fn reason_message(reason: FallbackReason) -> String {
    match reason {
        FallbackReason::Timeout => "remote tool call timed out".to_string(),
        FallbackReason::Protocol(m) => m,
        FallbackReason::SchemaValidation(m) => m,
    }
}

fn log_fallback(operation: &str, reason: &FallbackReason) {
    match reason {
        FallbackReason::Timeout => log::warn!("{}: remote tool timed out, falling back to direct API", operation),
        FallbackReason::Protocol(m) => log::warn!("{}: remote tool protocol error ({}), falling back to direct API", operation, m),
        FallbackReason::SchemaValidation(m) => log::warn!("{}: could not build remote arguments ({}), falling back to direct API", operation, m),
    }
}
