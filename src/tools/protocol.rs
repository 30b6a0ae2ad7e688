//! Shared tool-call shapes: the kind-filtered name-pattern search and the `ToolProtocol`
//! trait both the remote and direct clients are dispatched behind.
//!
//! Grounded in `examples/CloudLLM-ai-cloudllm/src/cloudllm/tool_protocol.rs`'s
//! `ToolProtocol` trait shape and `tool_protocols.rs`'s registry-search pattern, re-expressed
//! against the stdio transport spec.md §6 names instead of the teacher's HTTP one.

use std::error::Error;

use async_trait::async_trait;

use crate::model::ToolDescriptor;

/// The operation kind a caller wants performed, used to filter a remote tool registry by
/// name (spec §4.4 "Tool selection contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    CreateTicket,
    CreateWikiPage,
    FetchWikiPage,
    GetAccessibleResources,
    GetSpaces,
}

impl ToolKind {
    /// Ordered name patterns to search a registry for, most-specific first.
    fn name_patterns(&self) -> &'static [&'static str] {
        match self {
            ToolKind::CreateTicket => &["createJiraIssue", "create_issue", "createIssue", "jira_create"],
            ToolKind::CreateWikiPage => &["createConfluencePage", "create_page", "createPage", "confluence_create"],
            ToolKind::FetchWikiPage => &["getConfluencePage", "get_page", "getPage", "confluence_get"],
            ToolKind::GetAccessibleResources => &["getAccessibleAtlassianResources"],
            ToolKind::GetSpaces => &["getConfluenceSpaces"],
        }
    }

    /// Substrings that disqualify a candidate regardless of a name-pattern hit (spec §4.4:
    /// "a ticket-kind search must reject tools whose names contain `wiki`/`page`
    /// substrings, and vice versa").
    fn excluded_substrings(&self) -> &'static [&'static str] {
        match self {
            ToolKind::CreateTicket => &["wiki", "page", "confluence"],
            ToolKind::CreateWikiPage | ToolKind::FetchWikiPage => &["issue", "ticket", "jira"],
            ToolKind::GetAccessibleResources | ToolKind::GetSpaces => &[],
        }
    }

    fn matches(&self, candidate_name: &str) -> bool {
        let lower = candidate_name.to_lowercase();
        if self.excluded_substrings().iter().any(|s| lower.contains(&s.to_lowercase())) {
            return false;
        }
        self.name_patterns().iter().any(|p| lower.contains(&p.to_lowercase()))
    }

    /// Search `registry` for the best match of this kind, applying the final safety
    /// re-check against the kind before returning (spec §4.4: "A final safety check
    /// re-validates the chosen tool's name against the kind before invocation").
    pub fn find_in<'a>(&self, registry: &'a [ToolDescriptor]) -> Option<&'a ToolDescriptor> {
        let candidate = registry.iter().find(|t| self.matches(&t.name))?;
        self.matches(&candidate.name).then_some(candidate)
    }
}

/// Abstracts over "a remote tool server" vs "an in-process direct API client" — both speak
/// this shape (spec §4.4: "Both return a ToolResult").
#[async_trait]
pub trait ToolProtocol: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Box<dyn Error + Send + Sync>>;

    /// Returns the raw response text/JSON on success; the caller (the dispatcher) is
    /// responsible for running it through `response_parser`.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value, Box<dyn Error + Send + Sync>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_kind_rejects_wiki_named_tools() {
        assert!(!ToolKind::CreateTicket.matches("createConfluencePage"));
        assert!(ToolKind::CreateTicket.matches("createJiraIssue"));
    }

    #[test]
    fn wiki_kind_rejects_ticket_named_tools() {
        assert!(!ToolKind::CreateWikiPage.matches("createJiraIssue"));
        assert!(ToolKind::CreateWikiPage.matches("createConfluencePage"));
    }

    #[test]
    fn find_in_returns_none_when_no_candidate_matches() {
        let registry = vec![ToolDescriptor {
            name: "unrelatedTool".to_string(),
            description: String::new(),
            input_schema: crate::model::InputSchema::default(),
        }];
        assert!(ToolKind::CreateTicket.find_in(&registry).is_none());
    }
}
