//! Error taxonomy for the core.
//!
//! Every fallible path inside the core normalizes into one of the [`ErrorKind`] variants
//! before it is allowed to surface to a caller. Handlers never let a raw exception type
//! cross the [`crate::router::Router`] boundary — they catch, classify, and write a
//! [`ErrorKind`]-tagged record plus a templated assistant message instead.

use std::fmt;

/// The only error taxonomy the core surfaces (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Any bounded wait expired. Per-call timeouts are locally recoverable (fall back);
    /// the global deadline is not.
    Timeout,
    /// A remote tool returned an unparseable or wrongly-typed result.
    ProtocolError,
    /// [`crate::binder::ArgumentBinder`] rejected inputs (missing required, type mismatch,
    /// enum violation).
    SchemaValidation,
    /// 401/403 from any backend, or an LLM provider auth failure.
    AuthError,
    /// 429 from any backend.
    RateLimit,
    /// TCP/TLS/DNS/connection-reset failure.
    ConnectionError,
    /// The requested capability is not installed/configured.
    ToolUnavailable,
    /// "already exists" / duplicate reported by the wiki API; the remote call may have
    /// actually succeeded and the direct client cannot verify.
    Conflict,
    /// Hop-limit breach, recursion bound, or other condition that should never happen.
    Internal,
}

impl ErrorKind {
    /// User-facing template. Never includes raw exception text, tokens, URLs, or stack
    /// traces (spec §7: "Templates never leak raw exception strings...").
    pub fn user_template(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => {
                "Sorry, that took too long to complete. Please try again in a moment."
            }
            ErrorKind::ProtocolError => {
                "Sorry, the system tried two methods and both failed. Please try again."
            }
            ErrorKind::SchemaValidation => {
                "Sorry, I couldn't build a valid request for that action. Please rephrase your request."
            }
            ErrorKind::AuthError => {
                "Sorry, I couldn't authenticate with a required service. Please check credentials."
            }
            ErrorKind::RateLimit => "Sorry, a required service is rate-limited. Please retry shortly.",
            ErrorKind::ConnectionError => {
                "Sorry, a network connection failed. Please try again later."
            }
            ErrorKind::ToolUnavailable => {
                "That capability isn't configured right now, so I'll answer as best I can instead."
            }
            ErrorKind::Conflict => {
                "That may already exist — the system may have succeeded but I couldn't verify it."
            }
            ErrorKind::Internal => "Sorry, something went wrong internally. Please try again.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::SchemaValidation => "schema_validation",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::ToolUnavailable => "tool_unavailable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// A classified error carrying diagnostic detail that never reaches the user verbatim.
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for AppError {}
