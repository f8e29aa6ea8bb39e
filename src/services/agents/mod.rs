use crate::core::error::AgentError;
use crate::core::state::{Character, Outline};
use crate::services::llm::LlmClient;
use crate::services::queue::TaskPayload;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub mod chapter;
pub mod character;
pub mod outline;
pub mod registry;

pub use chapter::ChapterAgent;
pub use character::CharacterAgent;
pub use outline::OutlineAgent;
pub use registry::AgentRegistry;

pub const OUTLINE_AGENT: &str = "outline_agent";
pub const CHARACTER_AGENT: &str = "character_agent";
pub const CHAPTER_AGENT: &str = "chapter_agent";

#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    Outline(Outline),
    Characters(Vec<Character>),
    Chapter(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Completed(AgentOutput),
    Failed(AgentError),
}

impl From<Result<AgentOutput, AgentError>> for TaskResult {
    fn from(result: Result<AgentOutput, AgentError>) -> Self {
        match result {
            Ok(output) => TaskResult::Completed(output),
            Err(e) => TaskResult::Failed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentMessage {
    pub from: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub agent: String,
    pub response: String,
}

/// A stage worker. `execute_task` turns one payload into generated content;
/// `communicate` is a side channel that only acknowledges.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    async fn execute_task(&self, payload: &TaskPayload) -> TaskResult;
    fn communicate(&self, message: &AgentMessage) -> Ack;
}

/// Calls the backend and maps errors and blank replies to
/// `AgentError::Generation`.
pub(crate) async fn generate(
    llm: &dyn LlmClient,
    agent: &str,
    system: &str,
    prompt: &str,
) -> Result<String, AgentError> {
    match llm.chat(system, prompt).await {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => Err(AgentError::Generation {
            agent: agent.to_string(),
            reason: "empty response".to_string(),
        }),
        Err(e) => Err(AgentError::Generation {
            agent: agent.to_string(),
            reason: format!("{:#}", e),
        }),
    }
}

pub(crate) fn parse_structured<T: DeserializeOwned>(
    agent: &str,
    what: &str,
    response: &str,
) -> Result<T, AgentError> {
    let clean_json = strip_code_blocks(response);
    serde_json::from_str(&clean_json).map_err(|e| AgentError::Parse {
        agent: agent.to_string(),
        reason: format!("Failed to decode JSON response for {}: {}", what, e),
        raw: response.to_string(),
    })
}

/// Returns the body of the first fenced block, dropping any prose around it
/// and a language tag in any case. Unfenced text is only trimmed.
pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    let Some(start) = s.find("```") else {
        return s.to_string();
    };

    let body = &s[start + 3..];
    let tag_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let body = match body[tag_len..].chars().next() {
        Some(c) if tag_len > 0 && c.is_whitespace() => &body[tag_len..],
        _ => body,
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}
