//! Core data model (spec §3): [`Request`], [`AgentState`], [`ToolDescriptor`],
//! [`ToolResult`], [`IntentDecision`].

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::errors::ErrorKind;

/// Conversation turn supplied by the caller; read-only within a run.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    User,
    Assistant,
}

/// Immutable per-invocation request (spec §3).
#[derive(Debug, Clone)]
pub struct Request {
    pub user_input: String,
    pub history: Vec<HistoryTurn>,
    pub deadline: Instant,
    pub correlation_id: Uuid,
}

impl Request {
    pub fn new(user_input: impl Into<String>, history: Vec<HistoryTurn>, deadline: Instant) -> Self {
        Self {
            user_input: user_input.into(),
            history,
            deadline,
            correlation_id: Uuid::new_v4(),
        }
    }
}

/// Tag of a message inside [`AgentState::messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// The intents the classifier can assign (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    JiraCreation,
    RagQuery,
    GeneralChat,
    AgentDelegation,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::JiraCreation => "jira_creation",
            Intent::RagQuery => "rag_query",
            Intent::GeneralChat => "general_chat",
            Intent::AgentDelegation => "agent_delegation",
            Intent::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Intent> {
        match s.trim().to_lowercase().as_str() {
            "jira_creation" => Some(Intent::JiraCreation),
            "rag_query" => Some(Intent::RagQuery),
            "general_chat" => Some(Intent::GeneralChat),
            "agent_delegation" => Some(Intent::AgentDelegation),
            _ => None,
        }
    }
}

/// Where an [`IntentDecision`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Keyword,
    Llm,
    Cache,
    Default,
}

/// Output of the [`crate::intent::IntentClassifier`] (spec §3).
#[derive(Debug, Clone)]
pub struct IntentDecision {
    pub intent: Intent,
    pub confidence: f32,
    pub reason: String,
    pub source: IntentSource,
}

/// Declared JSON-Schema-shaped property type (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
}

impl PropertyType {
    pub fn parse(s: &str) -> Option<PropertyType> {
        match s {
            "string" => Some(PropertyType::String),
            "integer" => Some(PropertyType::Integer),
            "number" => Some(PropertyType::Number),
            "boolean" => Some(PropertyType::Boolean),
            _ => None,
        }
    }
}

/// One property inside a [`ToolDescriptor::input_schema`].
#[derive(Debug, Clone)]
pub struct SchemaProperty {
    pub property_type: PropertyType,
    pub enum_values: Option<Vec<Value>>,
    /// Supplements a bare `enum`: some schemas nest the allowed values under `anyOf[].enum`.
    pub any_of_enum: Option<Vec<Value>>,
    pub description: Option<String>,
    pub default: Option<Value>,
}

impl SchemaProperty {
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            enum_values: None,
            any_of_enum: None,
            description: None,
            default: None,
        }
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// All allowed values, combining a bare `enum` with any `anyOf[].enum` values.
    pub fn allowed_values(&self) -> Option<Vec<Value>> {
        match (&self.enum_values, &self.any_of_enum) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => {
                let mut v = a.clone();
                v.extend(b.clone());
                Some(v)
            }
        }
    }
}

/// JSON-Schema-shaped description of one tool's expected inputs (spec §3).
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    pub properties: BTreeMap<String, SchemaProperty>,
    pub required: Vec<String>,
}

/// Declared by a remote tool server (spec §3).
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// How a [`ToolResult`] was produced (spec §3 / §9: kept a pure enum, conflict detail
/// lives in `outcome_note` instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolUsed {
    RemoteProtocol,
    DirectApi,
    DirectApiFallback,
}

/// Normalized envelope the dispatcher emits regardless of source (spec §3).
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub tool_used: ToolUsed,
    /// Sub-outcome detail that would otherwise have been smuggled into `tool_used`
    /// (spec §9 design note).
    pub outcome_note: Option<String>,
    pub raw: Value,
}

impl ToolResult {
    pub fn success(tool_used: ToolUsed, id: Option<String>, link: Option<String>, title: Option<String>, raw: Value) -> Self {
        Self {
            success: true,
            id,
            link,
            title,
            error_kind: None,
            error_message: None,
            tool_used,
            outcome_note: None,
            raw,
        }
    }

    pub fn failure(tool_used: ToolUsed, error_kind: ErrorKind, error_message: impl Into<String>, raw: Value) -> Self {
        Self {
            success: false,
            id: None,
            link: None,
            title: None,
            error_kind: Some(error_kind),
            error_message: Some(error_message.into()),
            tool_used,
            outcome_note: None,
            raw,
        }
    }

    pub fn with_outcome_note(mut self, note: impl Into<String>) -> Self {
        self.outcome_note = Some(note.into());
        self
    }
}

/// Identifier of a node in the [`crate::router::Router`] graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    IntentDetection,
    JiraCreation,
    Evaluation,
    ConfluenceCreation,
    RagQuery,
    GeneralChat,
    AgentDelegation,
    Sink,
}

/// The single mutable record threaded through the state machine (spec §3).
///
/// `messages` is append-only: the only way to add to it is [`AgentState::push_message`].
/// `intent` is set-once: [`AgentState::set_intent`] panics in debug builds if called twice,
/// matching invariant (c) in spec §3 ("intent is set exactly once per run").
#[derive(Debug, Clone)]
pub struct AgentState {
    pub user_input: String,
    messages: Vec<ChatMessage>,
    intent: Option<Intent>,
    pub jira_result: Option<ToolResult>,
    pub confluence_result: Option<ToolResult>,
    pub evaluation_result: Option<EvaluationResult>,
    pub rag_context: Option<String>,
    pub agent_result: Option<String>,
    pub history: Vec<HistoryTurn>,
    pub next_action: Option<NodeId>,
    pub hops: u32,
}

/// Output of the evaluation handler scoring a freshly created ticket.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub score: u8,
    pub notes: Option<String>,
}

impl AgentState {
    /// `history` should already be trimmed to the most recent N entries (spec §4.1 step 1:
    /// "Copy the most recent N (≤10) history entries into `messages`") — the orchestrator
    /// seeds both `AgentState::history` and the initial `messages` from it.
    pub fn new(user_input: impl Into<String>, history: Vec<HistoryTurn>) -> Self {
        let messages = history
            .iter()
            .map(|turn| match turn.role {
                HistoryRole::User => ChatMessage::user(turn.content.clone()),
                HistoryRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            })
            .collect();

        Self {
            user_input: user_input.into(),
            messages,
            intent: None,
            jira_result: None,
            confluence_result: None,
            evaluation_result: None,
            rag_context: None,
            agent_result: None,
            history,
            next_action: Some(NodeId::IntentDetection),
            hops: 0,
        }
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    /// Set the run's intent. Invariant (c) (spec §3): set exactly once per run.
    pub fn set_intent(&mut self, intent: Intent) {
        debug_assert!(self.intent.is_none(), "intent set more than once in one run");
        self.intent = Some(intent);
    }

    /// The last assistant message, or `None` if no assistant message was ever appended.
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }
}
