//! Parses the three known remote-tool response shapes (spec §4.4 "Response parsing").
//!
//! Ported from `examples/original_source/src/mcp/response_parser.py`'s `MCPResponseParser`:
//! shape detection (`id` + no `success` → "Rovo"; `success: bool` present → "Custom";
//! otherwise "Generic"), the `_links.webui` / synthesized-URL link-extraction chain, and the
//! string-response recovery ladder (code-fence stripping, whole-string JSON parse,
//! balanced-brace regex fallback, URL/`Error:` text heuristics).

use regex::Regex;
use serde_json::Value;

use crate::errors::ErrorKind;

/// The normalized outcome of parsing one tool response, before `tool_used` is attached.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub success: bool,
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
}

impl ParsedResponse {
    fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            link: None,
            title: None,
            error_kind: Some(error_kind),
            error_message: Some(message.into()),
        }
    }
}

/// Entry point: parse a raw tool response, which may be a JSON value or (per the protocol's
/// `content: [{type: "text", text: ...}]` envelope) a string that itself needs recovery.
pub fn parse(response: &Value, base_url: Option<&str>) -> ParsedResponse {
    match response {
        Value::String(s) => parse_string_response(s, base_url),
        Value::Object(_) => parse_object_response(response, base_url),
        Value::Bool(_) => ParsedResponse::failure(ErrorKind::ProtocolError, "boolean result value treated as a protocol error"),
        other => parse_object_response(other, base_url),
    }
}

fn parse_string_response(raw: &str, base_url: Option<&str>) -> ParsedResponse {
    let stripped = strip_code_fences(raw);
    let trimmed = stripped.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return parse_object_response(&value, base_url);
    }

    if let Some(brace_slice) = extract_balanced_braces(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&brace_slice) {
            return parse_object_response(&value, base_url);
        }
    }

    text_heuristics(trimmed)
}

pub(crate) fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return raw.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_balanced_braces(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if b == b'{' {
            depth += 1;
        } else if b == b'}' {
            depth -= 1;
            if depth == 0 {
                return Some(text[start..start + offset + 1].to_string());
            }
        }
    }
    None
}

fn text_heuristics(text: &str) -> ParsedResponse {
    if text.trim_start().to_lowercase().starts_with("error:") {
        return ParsedResponse::failure(ErrorKind::ProtocolError, text.to_string());
    }
    let url_pattern = Regex::new(r"https?://\S+").expect("valid url pattern");
    if let Some(m) = url_pattern.find(text) {
        return ParsedResponse {
            success: true,
            id: None,
            link: Some(m.as_str().trim_end_matches(|c: char| ".,)".contains(c)).to_string()),
            title: None,
            error_kind: None,
            error_message: None,
        };
    }
    ParsedResponse::failure(ErrorKind::ProtocolError, format!("unrecognized text response: {}", text))
}

fn parse_object_response(value: &Value, base_url: Option<&str>) -> ParsedResponse {
    let obj = match value.as_object() {
        Some(o) => o,
        None => return ParsedResponse::failure(ErrorKind::ProtocolError, "response is not a JSON object"),
    };

    if obj.contains_key("success") {
        parse_custom_format(obj, base_url)
    } else if obj.contains_key("id") && !obj.contains_key("success") {
        parse_rovo_format(obj, base_url)
    } else {
        parse_generic_format(obj, base_url)
    }
}

fn parse_rovo_format(obj: &serde_json::Map<String, Value>, base_url: Option<&str>) -> ParsedResponse {
    let id = obj
        .get("id")
        .or_else(|| obj.get("pageId"))
        .or_else(|| obj.get("page_id"))
        .or_else(|| obj.get("version").and_then(|v| v.get("id")))
        .and_then(value_as_id_string);

    let title = obj.get("title").and_then(|v| v.as_str()).map(str::to_string);
    let link = extract_link(obj, id.as_deref(), base_url);

    ParsedResponse {
        success: true,
        id,
        link,
        title,
        error_kind: None,
        error_message: None,
    }
}

fn parse_custom_format(obj: &serde_json::Map<String, Value>, base_url: Option<&str>) -> ParsedResponse {
    let success = obj.get("success").and_then(|v| v.as_bool()).unwrap_or(false);

    if !success {
        let message = obj
            .get("error")
            .or_else(|| obj.get("error_detail"))
            .and_then(|v| v.as_str())
            .unwrap_or("remote tool reported failure")
            .to_string();
        let kind = classify_error_text(&message, obj.get("error_type").and_then(|v| v.as_str()));
        return ParsedResponse::failure(kind, message);
    }

    let id = obj.get("id").and_then(value_as_id_string);
    let title = obj.get("title").and_then(|v| v.as_str()).map(str::to_string);
    let link = extract_link(obj, id.as_deref(), base_url);

    ParsedResponse {
        success: true,
        id,
        link,
        title,
        error_kind: None,
        error_message: None,
    }
}

fn parse_generic_format(obj: &serde_json::Map<String, Value>, base_url: Option<&str>) -> ParsedResponse {
    let error_text = obj
        .get("error")
        .or_else(|| obj.get("errorMessage"))
        .or_else(|| obj.get("failure"))
        .and_then(|v| v.as_str());

    if let Some(message) = error_text {
        let kind = classify_error_text(message, None);
        return ParsedResponse::failure(kind, message.to_string());
    }

    let id = obj.get("id").and_then(value_as_id_string);
    let title = obj.get("title").and_then(|v| v.as_str()).map(str::to_string);
    let link = extract_link(obj, id.as_deref(), base_url);

    // Neither an error key nor an id: optimistic success (spec §4.4 Generic row).
    ParsedResponse {
        success: true,
        id,
        link,
        title,
        error_kind: None,
        error_message: None,
    }
}

fn value_as_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `_links.webui` absolute-vs-relative handling, else synthesize from the resource id when
/// `spaceId`/`pageId` are present (spec §4.4 Rovo row).
fn extract_link(obj: &serde_json::Map<String, Value>, id: Option<&str>, base_url: Option<&str>) -> Option<String> {
    if let Some(direct) = obj.get("link").and_then(|v| v.as_str()) {
        return Some(direct.to_string());
    }

    if let Some(webui) = obj.get("_links").and_then(|l| l.get("webui")).and_then(|v| v.as_str()) {
        return Some(if webui.starts_with("http://") || webui.starts_with("https://") {
            webui.to_string()
        } else {
            let base = base_url.unwrap_or_default().trim_end_matches('/');
            format!("{}/wiki{}", base, webui)
        });
    }

    let has_space_or_page = obj.contains_key("spaceId") || obj.contains_key("pageId");
    if has_space_or_page {
        if let Some(id) = id {
            let base = base_url.unwrap_or_default().trim_end_matches('/');
            return Some(format!("{}/wiki/pages/{}", base, id));
        }
    }

    None
}

fn classify_error_text(message: &str, error_type: Option<&str>) -> ErrorKind {
    let lower = message.to_lowercase();
    if let Some(t) = error_type {
        let t = t.to_lowercase();
        if t.contains("auth") {
            return ErrorKind::AuthError;
        }
        if t.contains("rate") {
            return ErrorKind::RateLimit;
        }
        if t.contains("conflict") || t.contains("duplicate") {
            return ErrorKind::Conflict;
        }
    }
    if lower.contains("already exists") || lower.contains("duplicate") || lower.contains("same title") {
        ErrorKind::Conflict
    } else if lower.contains("unauthorized") || lower.contains("forbidden") || lower.contains("401") || lower.contains("403") {
        ErrorKind::AuthError
    } else if lower.contains("rate limit") || lower.contains("429") {
        ErrorKind::RateLimit
    } else {
        ErrorKind::ProtocolError
    }
}

/// Ported from `MCPResponseParser.parse_error_response` for error envelopes that arrive as a
/// string (`Error: ...` prefix) or a bare error dict.
pub fn parse_error_response(raw: &Value) -> (ErrorKind, String) {
    match raw {
        Value::String(s) if s.to_lowercase().starts_with("error:") => {
            (ErrorKind::ProtocolError, s.trim_start_matches("Error:").trim_start_matches("error:").trim().to_string())
        }
        Value::String(s) => (ErrorKind::ProtocolError, s.clone()),
        Value::Object(obj) => {
            let message = obj
                .get("error")
                .or_else(|| obj.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown tool error")
                .to_string();
            (classify_error_text(&message, obj.get("error_type").and_then(|v| v.as_str())), message)
        }
        other => (ErrorKind::ProtocolError, other.to_string()),
    }
}
