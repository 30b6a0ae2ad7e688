//! End-to-end coverage of the orchestrator's public API: the keyword happy path through
//! ticket + wiki creation, remote-timeout-driven direct-API fallback, LLM-classified
//! ambiguous input with intent-cache reuse, general chat with no collaborators configured,
//! and the acyclic graph's hop-limit bound.

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use introuter::config::Config;
use introuter::llm::LlmProvider;
use introuter::model::ToolDescriptor;
use introuter::model::{HistoryRole, HistoryTurn, Request};
use introuter::orchestrator::build_orchestrator;
use introuter::tools::direct::DirectApiBackend;
use introuter::tools::dispatcher::ToolDispatcher;
use introuter::tools::protocol::ToolProtocol;
use serde_json::{json, Value};

struct StubTicketTool {
    call_count: AtomicUsize,
    slow: bool,
}

fn ticket_descriptor() -> ToolDescriptor {
    use introuter::model::{InputSchema, PropertyType, SchemaProperty};
    let mut schema = InputSchema::default();
    schema.properties.insert("summary".to_string(), SchemaProperty::new(PropertyType::String));
    schema.required.push("summary".to_string());
    ToolDescriptor {
        name: "createJiraIssue".to_string(),
        description: "Create a Jira issue".to_string(),
        input_schema: schema,
    }
}

fn wiki_descriptor() -> ToolDescriptor {
    use introuter::model::{InputSchema, PropertyType, SchemaProperty};
    let mut schema = InputSchema::default();
    schema.properties.insert("title".to_string(), SchemaProperty::new(PropertyType::String));
    schema.properties.insert("content".to_string(), SchemaProperty::new(PropertyType::String));
    ToolDescriptor {
        name: "createConfluencePage".to_string(),
        description: "Create a Confluence page".to_string(),
        input_schema: schema,
    }
}

#[async_trait]
impl ToolProtocol for StubTicketTool {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Box<dyn Error + Send + Sync>> {
        Ok(vec![ticket_descriptor(), wiki_descriptor()])
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.slow {
            // Longer than the dispatcher's ticket-call timeout + wrapper slack, so the
            // remote attempt always times out and the dispatcher falls back to direct API.
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        if name == "createJiraIssue" {
            Ok(json!({"success": true, "id": "PROJ-42", "link": "https://example.atlassian.net/browse/PROJ-42", "title": "Integration test ticket"}))
        } else {
            Ok(json!({"success": true, "id": "98765", "link": "https://example.atlassian.net/wiki/pages/98765", "title": "wiki page"}))
        }
    }
}

/// In-memory stand-in for [`introuter::tools::direct::DirectApiClient`] — no test in this
/// file performs real outbound HTTP calls.
struct FakeDirectApi {
    ticket_response: Value,
}

#[async_trait]
impl DirectApiBackend for FakeDirectApi {
    async fn create_ticket(&self, _project_key: &str, _fields: &Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(self.ticket_response.clone())
    }

    async fn create_wiki_page(&self, _space_key: &str, _title: &str, _html_body: &str) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(json!({"success": true, "id": "fallback-page"}))
    }

    async fn tenant_info(&self) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(json!({"cloudId": "cloud-1"}))
    }

    async fn space_info(&self, _key: &str) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(json!({"id": "space-1"}))
    }

    fn base_url(&self) -> &str {
        "https://example.atlassian.net"
    }
}

struct StubLlm {
    response: String,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _json_mode: bool,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    fn supports_json_mode(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn config_with_ticketing() -> Config {
    let mut config = Config::default();
    config.ticket_base_url = Some("https://example.atlassian.net".to_string());
    config.ticket_auth_user = Some("bot".to_string());
    config.ticket_auth_token = Some("token".to_string());
    config.ticket_project_key = Some("PROJ".to_string());
    config.wiki_base_url = Some("https://example.atlassian.net".to_string());
    config.wiki_space_key = Some("DEV".to_string());
    config.intent_use_llm = false;
    config
}

fn fake_direct() -> Arc<dyn DirectApiBackend> {
    Arc::new(FakeDirectApi {
        ticket_response: json!({"success": true, "id": "PROJ-9"}),
    })
}

#[tokio::test]
async fn keyword_happy_path_creates_ticket_and_wiki_page_via_remote_tool() {
    let remote = Arc::new(StubTicketTool {
        call_count: AtomicUsize::new(0),
        slow: false,
    });
    let dispatcher = Arc::new(ToolDispatcher::new(Some(remote), fake_direct(), "PROJ", "DEV"));
    let orchestrator = build_orchestrator(config_with_ticketing(), None, Some(dispatcher), None, None);

    let request = Request::new(
        "please create a jira ticket for the login bug",
        vec![],
        Instant::now() + Duration::from_secs(30),
    );
    let (reply, diagnostics) = orchestrator.handle(request).await;

    // spec.md §8 Scenario 1: the final reply must mention both the ticket and the wiki page.
    assert!(reply.contains("PROJ-42"), "reply missing ticket id: {reply}");
    assert!(reply.contains("98765"), "reply missing wiki page id: {reply}");
    assert!(reply.contains("https://example.atlassian.net/browse/PROJ-42"), "reply missing ticket link: {reply}");
    assert!(reply.contains("https://example.atlassian.net/wiki/pages/98765"), "reply missing wiki link: {reply}");
    assert!(diagnostics.error.is_none());
    assert_eq!(diagnostics.intent.unwrap().intent, introuter::model::Intent::JiraCreation);
}

#[tokio::test(start_paused = true)]
async fn remote_timeout_falls_back_to_direct_api_for_ticket_creation() {
    let remote = Arc::new(StubTicketTool {
        call_count: AtomicUsize::new(0),
        slow: true,
    });
    let dispatcher = Arc::new(ToolDispatcher::new(Some(remote), fake_direct(), "PROJ", "DEV"));
    let orchestrator = build_orchestrator(config_with_ticketing(), None, Some(dispatcher), None, None);

    let request = Request::new(
        "please create a jira ticket for the login bug",
        vec![],
        Instant::now() + Duration::from_secs(600),
    );
    let (reply, diagnostics) = orchestrator.handle(request).await;

    assert!(reply.contains("PROJ-9"), "reply missing fallback ticket id: {reply}");
    assert!(diagnostics.error.is_none());
}

#[tokio::test]
async fn llm_classified_ambiguous_input_is_cached_for_the_next_identical_call() {
    let stub = Arc::new(StubLlm {
        response: r#"{"intent":"general_chat","confidence":0.82,"reasoning":"assistance request"}"#.to_string(),
        calls: AtomicUsize::new(0),
    });
    let mut config = Config::default();
    config.intent_use_llm = true;
    let orchestrator = build_orchestrator(config, Some(stub.clone() as Arc<dyn LlmProvider>), None, None, None);

    let ambiguous_input = "Could you handle my request regarding account settings?";
    let request = Request::new(ambiguous_input, vec![], Instant::now() + Duration::from_secs(30));
    let (_, diagnostics) = orchestrator.handle(request).await;
    assert_eq!(diagnostics.intent.as_ref().unwrap().intent, introuter::model::Intent::GeneralChat);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

    // Second identical call must hit the intent cache, not invoke the LLM provider again.
    let request2 = Request::new(ambiguous_input, vec![], Instant::now() + Duration::from_secs(30));
    let (_, diagnostics2) = orchestrator.handle(request2).await;
    assert_eq!(diagnostics2.intent.as_ref().unwrap().source, introuter::model::IntentSource::Cache);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hop_limit_is_never_exceeded_for_the_acyclic_graph() {
    let orchestrator = build_orchestrator(config_with_ticketing(), None, None, None, None);
    let request = Request::new(
        "create a jira ticket for the outage",
        vec![],
        Instant::now() + Duration::from_secs(30),
    );
    let (_, diagnostics) = orchestrator.handle(request).await;
    assert!(diagnostics.hops <= 10);
}

#[tokio::test]
async fn general_chat_used_for_unrecognized_input_without_any_capabilities() {
    let orchestrator = build_orchestrator(Config::default(), None, None, None, None);
    let history = vec![HistoryTurn {
        role: HistoryRole::User,
        content: "hi there".to_string(),
    }];
    let request = Request::new("good morning", history, Instant::now() + Duration::from_secs(5));
    let (reply, diagnostics) = orchestrator.handle(request).await;
    assert!(!reply.is_empty());
    assert_eq!(diagnostics.intent.unwrap().intent, introuter::model::Intent::GeneralChat);
}

#[tokio::test]
async fn argument_binder_schema_validation_failure_is_reported_as_schema_validation() {
    use introuter::binder::ArgumentBinder;
    use introuter::model::{InputSchema, PropertyType, SchemaProperty};

    let mut schema = InputSchema::default();
    schema.properties.insert("priority".to_string(), SchemaProperty::new(PropertyType::String).with_enum(vec![json!("low"), json!("high")]));
    schema.required.push("priority".to_string());

    let mut data = BTreeMap::new();
    data.insert("priority".to_string(), json!("urgent"));

    let err = ArgumentBinder::build(&schema, &data, None).unwrap_err();
    assert_eq!(err.kind, introuter::errors::ErrorKind::SchemaValidation);
}
