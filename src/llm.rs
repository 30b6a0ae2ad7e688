//! The LLM provider collaborator contract (spec §6).
//!
//! The core depends only on the synchronous-shaped `Generate(system_prompt, user_prompt,
//! temperature, json_mode) -> text` signature; which vendor/SDK backs it is swappable.
//! Provider-specific SDK boilerplate is explicitly out of scope (spec §1) — this module
//! defines the trait boundary plus one concrete binding ([`crate::clients::openai::OpenAiProvider`])
//! so the contract is exercised end to end.

use std::error::Error;

use async_trait::async_trait;

/// A swappable text-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Synchronous request/response completion. Implementations are responsible for their
    /// own timeout handling internally is NOT required — callers (the intent classifier,
    /// the ticket-content generator) wrap calls in `tokio::time::timeout` themselves per
    /// spec §5's deadline model.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        json_mode: bool,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Whether this provider can be asked to constrain output to strict JSON.
    fn supports_json_mode(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str;
}
