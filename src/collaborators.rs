//! Optional collaborator contracts (spec §1 Non-goals, §6).
//!
//! The core treats retrieval, memory, and agent delegation as pure boundary contracts: no
//! indexing algorithm, no memory-store engine, no delegation-agent implementation lives
//! here. Only the trait plus a trivial in-memory test double ships with the crate.

use std::error::Error;

use async_trait::async_trait;

/// A retrieved document chunk.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f32,
    pub metadata: std::collections::BTreeMap<String, String>,
}

/// Retrieval/RAG collaborator (spec §6). Optional — `rag_query` only routes here when
/// configured.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn get_context(&self, query: &str, top_k: usize) -> Result<Option<String>, Box<dyn Error + Send + Sync>>;
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, Box<dyn Error + Send + Sync>>;
}

/// Memory-store collaborator (spec §6). Optional; the core never persists `AgentState`
/// itself (spec §3 Lifecycle: "No AgentState persists between requests").
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn create_conversation(&self, id: &str, title: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn append_message(&self, conv_id: &str, role: &str, content: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn get_conversation(&self, id: &str) -> Result<Vec<(String, String)>, Box<dyn Error + Send + Sync>>;
}

/// Delegation-agent collaborator invoked by the `agent_delegation` handler when
/// `AGENT_DELEGATION_ENABLED` is set and the delegation keyword rule fires.
#[async_trait]
pub trait DelegationAgent: Send + Sync {
    async fn delegate(&self, user_input: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Trivial in-memory test double for [`MemoryStore`].
#[cfg(test)]
pub mod test_doubles {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryStore {
        conversations: Mutex<std::collections::HashMap<String, (String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl MemoryStore for InMemoryStore {
        async fn create_conversation(&self, id: &str, title: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.conversations
                .lock()
                .await
                .insert(id.to_string(), (title.to_string(), Vec::new()));
            Ok(())
        }

        async fn append_message(&self, conv_id: &str, role: &str, content: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
            let mut guard = self.conversations.lock().await;
            let entry = guard
                .entry(conv_id.to_string())
                .or_insert_with(|| (String::new(), Vec::new()));
            entry.1.push((role.to_string(), content.to_string()));
            Ok(())
        }

        async fn get_conversation(&self, id: &str) -> Result<Vec<(String, String)>, Box<dyn Error + Send + Sync>> {
            Ok(self
                .conversations
                .lock()
                .await
                .get(id)
                .map(|(_, msgs)| msgs.clone())
                .unwrap_or_default())
        }
    }
}
