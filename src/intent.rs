//! C2 — IntentClassifier: hybrid keyword-then-LLM pipeline (spec §4.2).
//!
//! The rule ladder and its ordering are load-bearing — later rules never re-litigate what
//! an earlier rule already decided. Grounded in
//! `examples/original_source/src/services/intent_detector.py`'s `IntentDetector` for the
//! LLM-fallback shape (system prompt demanding a JSON object, code-fence stripping,
//! brace-range extraction, confidence clamping instead of rejection, falling back to
//! `general_chat` on any detection error) and in `spec.md` §4.2 for the keyword ladder.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::llm::LlmProvider;
use crate::model::{HistoryTurn, Intent, IntentDecision, IntentSource};

/// Which external capabilities are available this run. The classifier never recommends an
/// intent whose handler has nothing to act on (spec §4.2 steps 3–4: "only if a ticketing
/// capability exists" / "only if the retrieval service exists").
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub has_ticket: bool,
    pub has_retrieval: bool,
    pub has_delegation: bool,
}

/// A bounded, insertion-ordered FIFO cache (spec §4.2 "Caching" / §9 design note: "an
/// ordered mapping with a maximum size... no LRU needed").
struct FifoCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, IntentDecision>,
}

impl FifoCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<IntentDecision> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: IntentDecision) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

fn cache_key(input: &str) -> String {
    let normalized = normalize(input);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Keyword/phrase/regex rule tables, built once and reused across classify calls.
struct Rules {
    meta_tooling_phrases: Vec<&'static str>,
    delegation_phrases: Vec<&'static str>,
    jira_keywords: Vec<&'static str>,
    jira_pattern: Regex,
    knowledge_keywords: Vec<&'static str>,
    project_key_pattern: Regex,
    greeting_keywords: Vec<&'static str>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            meta_tooling_phrases: vec![
                "what can you do",
                "how does the ticketing tool work",
                "what is jira integration",
                "tell me about this tool",
                "how do you create tickets",
            ],
            delegation_phrases: vec![
                "delegate this to the agent",
                "ask the other agent",
                "hand this off",
                "use the delegation agent",
            ],
            // Compound phrases, not bare words: a bare "ticket" shouldn't fire on its own
            // (e.g. inside "I have a question about my parking ticket"), but any of these
            // phrases alone is sufficient without also needing the verb+target regex below.
            jira_keywords: vec![
                "create jira", "create issue", "create ticket", "create backlog",
                "create a jira", "create an issue", "create a ticket", "create a backlog",
                "create the jira", "create the issue", "create the ticket",
                "new jira", "new issue", "new ticket", "new backlog",
                "add jira", "add issue", "add ticket",
                "make jira", "make issue", "make ticket",
                "jira ticket", "jira issue", "jira backlog",
                "open jira", "open issue", "open ticket",
                "generate jira", "generate issue", "generate ticket",
                "submit jira", "submit issue", "submit ticket",
            ],
            // verb ∈ {create, make, open, new, add, generate, submit} + optional article + target
            jira_pattern: Regex::new(
                r"(?i)\b(create|make|open|new|add|generate|submit)\b(\s+(a|an|the))?\s+(jira|ticket|issue|backlog)",
            )
            .expect("valid jira pattern"),
            knowledge_keywords: vec![
                "acceptance criteria",
                "business value",
                "show me the",
                "confluence page",
                "ticket details",
                "lookup",
            ],
            project_key_pattern: Regex::new(r"[A-Z]{2,}-\d+").expect("valid project key pattern"),
            greeting_keywords: vec!["hello", "hi", "hey", "good morning", "good afternoon", "thanks", "thank you"],
        }
    }
}

/// C2: classifies user input into an [`Intent`] via keyword rules then an LLM fallback.
pub struct IntentClassifier {
    rules: Rules,
    cache: Mutex<FifoCache>,
    llm: Option<Arc<dyn LlmProvider>>,
    use_llm: bool,
    llm_timeout: Duration,
    confidence_threshold: f32,
    llm_temperature: f32,
}

impl IntentClassifier {
    pub fn new(
        llm: Option<Arc<dyn LlmProvider>>,
        use_llm: bool,
        llm_timeout: Duration,
        confidence_threshold: f32,
        llm_temperature: f32,
        cache_capacity: usize,
    ) -> Self {
        Self {
            rules: Rules::default(),
            cache: Mutex::new(FifoCache::new(cache_capacity)),
            llm,
            use_llm,
            llm_timeout,
            confidence_threshold,
            llm_temperature,
        }
    }

    /// Run the full pipeline (spec §4.2 steps 1–7).
    pub async fn classify(
        &self,
        user_input: &str,
        _context: &[HistoryTurn],
        capabilities: Capabilities,
    ) -> IntentDecision {
        let lower = normalize(user_input);

        // Step 1: exclusion rules.
        if self.rules.meta_tooling_phrases.iter().any(|p| lower.contains(p)) {
            return IntentDecision {
                intent: Intent::GeneralChat,
                confidence: 1.0,
                reason: "matched a meta-tooling question phrase".to_string(),
                source: IntentSource::Keyword,
            };
        }

        // Step 2: delegation keywords.
        if capabilities.has_delegation && self.rules.delegation_phrases.iter().any(|p| lower.contains(p)) {
            return IntentDecision {
                intent: Intent::AgentDelegation,
                confidence: 1.0,
                reason: "matched a delegation phrase".to_string(),
                source: IntentSource::Keyword,
            };
        }

        // Step 3: Jira creation rules. A compound-phrase keyword hit is sufficient on its
        // own; so is a verb+target regex match on its own (spec §4.2 rule 3: "Membership in
        // an enumerated keyword set *or* regex match").
        if capabilities.has_ticket {
            let keyword_hit = self.rules.jira_keywords.iter().any(|k| lower.contains(k));
            let pattern_hit = self.rules.jira_pattern.is_match(&lower);
            if keyword_hit || pattern_hit {
                return IntentDecision {
                    intent: Intent::JiraCreation,
                    confidence: 1.0,
                    reason: "matched a jira creation keyword phrase or verb+target pattern".to_string(),
                    source: IntentSource::Keyword,
                };
            }
        }

        // Step 4: knowledge-lookup rules.
        if capabilities.has_retrieval {
            let keyword_hit = self.rules.knowledge_keywords.iter().any(|k| lower.contains(k));
            let project_key_hit = self.rules.project_key_pattern.is_match(user_input) && !self.rules.jira_pattern.is_match(&lower);
            if keyword_hit || project_key_hit {
                return IntentDecision {
                    intent: Intent::RagQuery,
                    confidence: 1.0,
                    reason: "matched retrieval keyword or project-key reference".to_string(),
                    source: IntentSource::Keyword,
                };
            }
        }

        // Step 5: greeting rules.
        if self.rules.greeting_keywords.iter().any(|k| lower.contains(k)) {
            return IntentDecision {
                intent: Intent::GeneralChat,
                confidence: 1.0,
                reason: "matched a greeting keyword".to_string(),
                source: IntentSource::Keyword,
            };
        }

        // Step 6: LLM fallback.
        if self.use_llm {
            if let Some(decision) = self.classify_via_llm(user_input).await {
                return decision;
            }
        }

        // Step 7: default.
        IntentDecision {
            intent: Intent::GeneralChat,
            confidence: 0.0,
            reason: "no rule matched; defaulted".to_string(),
            source: IntentSource::Default,
        }
    }

    async fn classify_via_llm(&self, user_input: &str) -> Option<IntentDecision> {
        let llm = self.llm.as_ref()?;

        let key = cache_key(user_input);
        if let Some(mut cached) = self.cache.lock().await.get(&key) {
            cached.source = IntentSource::Cache;
            return Some(cached);
        }

        let system_prompt = "You are an expert intent classifier for a chatbot system. \
             Analyze the user's input and determine their intent. Return a JSON object with \
             'intent', 'confidence' (0.0-1.0), and 'reasoning' fields. Available intents: \
             jira_creation, rag_query, general_chat, agent_delegation. Be precise and confident \
             in your classification.";

        let call = llm.generate(system_prompt, user_input, self.llm_temperature, llm.supports_json_mode());

        let raw = match tokio::time::timeout(self.llm_timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("IntentClassifier::classify_via_llm: provider error: {}", e);
                return None;
            }
            Err(_) => {
                log::warn!("IntentClassifier::classify_via_llm: timed out after {:?}", self.llm_timeout);
                return None;
            }
        };

        let parsed = parse_llm_intent_response(&raw)?;

        let confidence = parsed.confidence.clamp(0.0, 1.0);
        let intent = match Intent::parse(&parsed.intent) {
            Some(intent) => intent,
            None => {
                log::warn!(
                    "IntentClassifier::classify_via_llm: unsupported intent '{}', defaulting to general_chat",
                    parsed.intent
                );
                Intent::GeneralChat
            }
        };

        if confidence < self.confidence_threshold {
            return Some(IntentDecision {
                intent: Intent::GeneralChat,
                confidence,
                reason: parsed.reasoning,
                source: IntentSource::Llm,
            });
        }

        let decision = IntentDecision {
            intent,
            confidence,
            reason: parsed.reasoning,
            source: IntentSource::Llm,
        };
        self.cache.lock().await.insert(key, decision.clone());
        Some(decision)
    }
}

struct LlmIntentResponse {
    intent: String,
    confidence: f32,
    reasoning: String,
}

/// Parse the LLM's intent-detection response, tolerating code fences and leading/trailing
/// prose around the JSON object (mirrors `IntentDetector._parse_llm_response`).
fn parse_llm_intent_response(response: &str) -> Option<LlmIntentResponse> {
    let mut cleaned = response.trim().to_string();

    if cleaned.starts_with("```") {
        cleaned = cleaned
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let cleaned = cleaned.trim();
    let json_slice = if cleaned.starts_with('{') {
        cleaned.to_string()
    } else {
        let start = cleaned.find('{')?;
        let end = cleaned.rfind('}')? + 1;
        if end <= start {
            return None;
        }
        cleaned[start..end].to_string()
    };

    let value: serde_json::Value = serde_json::from_str(&json_slice).ok()?;
    let intent = value.get("intent")?.as_str()?.to_lowercase();
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.7) as f32;
    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or("intent detected based on user input analysis")
        .to_string();

    Some(LlmIntentResponse {
        intent,
        confidence,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubLlm {
        response: String,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _temperature: f32,
            _json_mode: bool,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
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

    fn caps(ticket: bool, retrieval: bool, delegation: bool) -> Capabilities {
        Capabilities {
            has_ticket: ticket,
            has_retrieval: retrieval,
            has_delegation: delegation,
        }
    }

    #[tokio::test]
    async fn keyword_rule_detects_jira_creation() {
        let classifier = IntentClassifier::new(None, false, Duration::from_secs(5), 0.7, 0.1, 100);
        let decision = classifier
            .classify("create a jira ticket: integrate MCP server", &[], caps(true, false, false))
            .await;
        assert_eq!(decision.intent, Intent::JiraCreation);
        assert_eq!(decision.source, IntentSource::Keyword);
    }

    #[tokio::test]
    async fn jira_creation_does_not_fire_without_ticket_capability() {
        let classifier = IntentClassifier::new(None, false, Duration::from_secs(5), 0.7, 0.1, 100);
        let decision = classifier
            .classify("create a jira ticket: integrate MCP server", &[], caps(false, false, false))
            .await;
        assert_eq!(decision.intent, Intent::GeneralChat);
    }

    #[tokio::test]
    async fn project_key_reference_routes_to_rag_query() {
        let classifier = IntentClassifier::new(None, false, Duration::from_secs(5), 0.7, 0.1, 100);
        let decision = classifier
            .classify("what was the acceptance criteria for PROJ-123?", &[], caps(true, true, false))
            .await;
        assert_eq!(decision.intent, Intent::RagQuery);
    }

    #[tokio::test]
    async fn llm_fallback_used_when_no_keyword_matches() {
        let stub = Arc::new(StubLlm {
            response: r#"{"intent":"general_chat","confidence":0.82,"reasoning":"assistance"}"#.to_string(),
            calls: AtomicUsize::new(0),
        });
        let classifier = IntentClassifier::new(Some(stub.clone()), true, Duration::from_secs(5), 0.7, 0.1, 100);
        let decision = classifier
            .classify("Could you handle my request regarding account settings?", &[], caps(true, true, false))
            .await;
        assert_eq!(decision.intent, Intent::GeneralChat);
        assert_eq!(decision.source, IntentSource::Llm);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        // Second identical call must hit the cache, not the provider.
        let decision2 = classifier
            .classify("Could you handle my request regarding account settings?", &[], caps(true, true, false))
            .await;
        assert_eq!(decision2.source, IntentSource::Cache);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn low_confidence_llm_result_defaults_to_general_chat() {
        let stub = Arc::new(StubLlm {
            response: r#"{"intent":"jira_creation","confidence":0.3,"reasoning":"unsure"}"#.to_string(),
            calls: AtomicUsize::new(0),
        });
        let classifier = IntentClassifier::new(Some(stub), true, Duration::from_secs(5), 0.7, 0.1, 100);
        let decision = classifier.classify("maybe file something?", &[], caps(true, false, false)).await;
        assert_eq!(decision.intent, Intent::GeneralChat);
    }

    #[tokio::test]
    async fn fifo_cache_evicts_oldest_entry_beyond_capacity() {
        let mut cache = FifoCache::new(2);
        cache.insert(
            "a".to_string(),
            IntentDecision {
                intent: Intent::GeneralChat,
                confidence: 1.0,
                reason: "x".to_string(),
                source: IntentSource::Llm,
            },
        );
        cache.insert(
            "b".to_string(),
            IntentDecision {
                intent: Intent::GeneralChat,
                confidence: 1.0,
                reason: "x".to_string(),
                source: IntentSource::Llm,
            },
        );
        cache.insert(
            "c".to_string(),
            IntentDecision {
                intent: Intent::GeneralChat,
                confidence: 1.0,
                reason: "x".to_string(),
                source: IntentSource::Llm,
            },
        );
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn parses_code_fenced_json_response() {
        let raw = "```json\n{\"intent\": \"general_chat\", \"confidence\": 0.9, \"reasoning\": \"ok\"}\n```";
        let parsed = parse_llm_intent_response(raw).unwrap();
        assert_eq!(parsed.intent, "general_chat");
    }
}
