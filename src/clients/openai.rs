//! OpenAI Chat Completions binding for [`LlmProvider`].
//!
//! Built the way the teacher's `send_with_native_tools` builds its request: a manual
//! `reqwest` POST with a hand-assembled JSON body and a hand-parsed JSON response, reusing
//! the process-wide [`get_shared_http_client`]. No SDK dependency — the native tool-calling
//! machinery the teacher's SDK client exists for is out of scope here (spec §1: the LLM is
//! only ever asked for plain completions, never to select a tool itself).

use std::error::Error;

use async_trait::async_trait;
use serde_json::json;

use crate::clients::common::get_shared_http_client;
use crate::llm::LlmProvider;

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        json_mode: bool,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let resp = get_shared_http_client()
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            log::error!("OpenAiProvider::generate: HTTP {} from {}: {}", status, url, text);
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(format!("openai auth error: HTTP {}", status).into());
            }
            if status.as_u16() == 429 {
                return Err(format!("openai rate limited: HTTP {}", status).into());
            }
            return Err(format!("openai HTTP {}: {}", status, text).into());
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)?;
        let content = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or("openai response missing choices[0].message.content")?;

        Ok(content.to_string())
    }

    fn supports_json_mode(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_reflects_constructor() {
        let provider = OpenAiProvider::new("sk-test", "gpt-4.1-nano");
        assert_eq!(provider.model_name(), "gpt-4.1-nano");
        assert!(provider.supports_json_mode());
    }
}
