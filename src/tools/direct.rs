//! Direct-API collaborator clients: in-process HTTP calls against the ticketing/wiki vendor
//! APIs, used when no remote tool matches or the remote attempt needs a fallback (spec §6
//! "Direct APIs").
//!
//! Built the way the teacher's `clients/common.rs` builds HTTP calls: the shared
//! process-wide `reqwest::Client` from [`crate::clients::common::get_shared_http_client`],
//! manual JSON body construction, manual status-code interpretation. [`DirectApiBackend`] is
//! the seam: [`ToolDispatcher`](crate::tools::dispatcher::ToolDispatcher) depends on the
//! trait, not on [`DirectApiClient`] directly, so tests can substitute a fake backend instead
//! of performing real outbound HTTP calls (spec §9 design note on collaborator stubs).

use std::error::Error;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::clients::common::get_shared_http_client;

/// Credentials and endpoint for one Atlassian-shaped tenant (spec §6).
#[derive(Debug, Clone)]
pub struct DirectApiConfig {
    pub base_url: String,
    pub auth_user: String,
    pub auth_token: String,
}

/// The direct-API surface [`ToolDispatcher`](crate::tools::dispatcher::ToolDispatcher)
/// depends on. [`DirectApiClient`] is the real `reqwest`-backed implementation; tests
/// substitute a fake/closure-based double instead.
#[async_trait]
pub trait DirectApiBackend: Send + Sync {
    async fn create_ticket(&self, project_key: &str, fields: &Value) -> Result<Value, Box<dyn Error + Send + Sync>>;

    async fn create_wiki_page(&self, space_key: &str, title: &str, html_body: &str) -> Result<Value, Box<dyn Error + Send + Sync>>;

    async fn tenant_info(&self) -> Result<Value, Box<dyn Error + Send + Sync>>;

    async fn space_info(&self, key: &str) -> Result<Value, Box<dyn Error + Send + Sync>>;

    /// The configured tenant base URL, for callers that need to build absolute links from a
    /// relative `_links.webui` path in a parsed response.
    fn base_url(&self) -> &str;
}

pub struct DirectApiClient {
    config: DirectApiConfig,
}

impl DirectApiClient {
    pub fn new(config: DirectApiConfig) -> Self {
        Self { config }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn parse_response(resp: reqwest::Response) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            log::error!("DirectApiClient: HTTP {} : {}", status, text);
            let value: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({"error": text}));
            return Ok(attach_status(value, status.as_u16()));
        }

        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({"success": true, "raw": text})))
    }
}

#[async_trait]
impl DirectApiBackend for DirectApiClient {
    /// `POST {base}/rest/api/2/issue`.
    async fn create_ticket(&self, project_key: &str, fields: &Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let mut body = fields.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.entry("project").or_insert_with(|| json!({"key": project_key}));
        }

        let url = format!("{}/rest/api/2/issue", self.base());
        let resp = get_shared_http_client()
            .post(&url)
            .basic_auth(&self.config.auth_user, Some(&self.config.auth_token))
            .json(&json!({"fields": body}))
            .send()
            .await?;

        Self::parse_response(resp).await
    }

    /// `POST {base}/wiki/rest/api/content`, body as `body.storage.value` / `storage`.
    async fn create_wiki_page(&self, space_key: &str, title: &str, html_body: &str) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/wiki/rest/api/content", self.base());
        let payload = json!({
            "type": "page",
            "title": title,
            "space": {"key": space_key},
            "body": {"storage": {"value": html_body, "representation": "storage"}},
        });

        let resp = get_shared_http_client()
            .post(&url)
            .basic_auth(&self.config.auth_user, Some(&self.config.auth_token))
            .json(&payload)
            .send()
            .await?;

        Self::parse_response(resp).await
    }

    /// `GET {base}/_edge/tenant_info` → `{cloudId, ...}`.
    async fn tenant_info(&self) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/_edge/tenant_info", self.base());
        let resp = get_shared_http_client()
            .get(&url)
            .basic_auth(&self.config.auth_user, Some(&self.config.auth_token))
            .send()
            .await?;
        Self::parse_response(resp).await
    }

    /// `GET {base}/wiki/rest/api/space/{key}` → `{id, key, ...}`.
    async fn space_info(&self, key: &str) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/wiki/rest/api/space/{}", self.base(), key);
        let resp = get_shared_http_client()
            .get(&url)
            .basic_auth(&self.config.auth_user, Some(&self.config.auth_token))
            .send()
            .await?;
        Self::parse_response(resp).await
    }

    fn base_url(&self) -> &str {
        self.base()
    }
}

fn attach_status(mut value: Value, status: u16) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("success").or_insert(json!(false));
        obj.entry("status").or_insert(json!(status));
    }
    value
}
