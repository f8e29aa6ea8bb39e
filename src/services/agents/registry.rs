use super::{
    Ack, Agent, AgentMessage, ChapterAgent, CharacterAgent, OutlineAgent, TaskResult,
};
use crate::core::error::AgentError;
use crate::services::llm::LlmClient;
use crate::services::queue::TaskPayload;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Box<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outline, character and chapter workers sharing one backend.
    pub fn with_default_agents(llm: Arc<dyn LlmClient>, language: &str) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(OutlineAgent::new(llm.clone(), language)));
        registry.register(Box::new(CharacterAgent::new(llm.clone(), language)));
        registry.register(Box::new(ChapterAgent::new(llm, language)));
        registry
    }

    /// Registers under `agent.name()`, replacing any previous holder.
    pub fn register(&mut self, agent: Box<dyn Agent>) {
        self.agents.insert(agent.name().to_string(), agent);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Agent> {
        self.agents.get(name).map(|a| a.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub async fn dispatch(&self, name: &str, payload: &TaskPayload) -> TaskResult {
        match self.get(name) {
            Some(agent) => agent.execute_task(payload).await,
            None => TaskResult::Failed(AgentError::NotFound(name.to_string())),
        }
    }

    pub fn send_message(&self, name: &str, message: &AgentMessage) -> Result<Ack, AgentError> {
        self.get(name)
            .map(|agent| agent.communicate(message))
            .ok_or_else(|| AgentError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::agents::testing::FixedLlm;
    use crate::services::agents::{AgentOutput, CHAPTER_AGENT, CHARACTER_AGENT, OUTLINE_AGENT};
    use crate::services::queue::OutlineTaskPayload;

    fn outline_payload() -> TaskPayload {
        TaskPayload::Outline(OutlineTaskPayload {
            prompt: "p".to_string(),
        })
    }

    #[test]
    fn test_default_agents_registered() {
        let registry = AgentRegistry::with_default_agents(Arc::new(FixedLlm::ok("")), "zh");
        assert!(registry.contains(OUTLINE_AGENT));
        assert!(registry.contains(CHARACTER_AGENT));
        assert!(registry.contains(CHAPTER_AGENT));
        assert!(!registry.contains("world_agent"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_agent() {
        let registry = AgentRegistry::new();
        let result = registry.dispatch("world_agent", &outline_payload()).await;
        assert_eq!(result, TaskResult::Failed(AgentError::NotFound("world_agent".to_string())));
        assert_eq!(
            AgentError::NotFound("world_agent".to_string()).to_string(),
            "Agent world_agent not found."
        );
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_agent() {
        let reply = r#"{"title": "T", "logline": "L", "chapters": [{"title": "a", "summary": "b"}]}"#;
        let registry = AgentRegistry::with_default_agents(Arc::new(FixedLlm::ok(reply)), "zh");
        let result = registry.dispatch(OUTLINE_AGENT, &outline_payload()).await;
        assert!(matches!(result, TaskResult::Completed(AgentOutput::Outline(_))));
    }

    #[test]
    fn test_send_message() {
        let registry = AgentRegistry::with_default_agents(Arc::new(FixedLlm::ok("")), "zh");
        let message = AgentMessage {
            from: "workflow".to_string(),
            content: "characters ready".to_string(),
        };
        let ack = registry.send_message(CHAPTER_AGENT, &message).unwrap();
        assert_eq!(ack.agent, CHAPTER_AGENT);

        let err = registry.send_message("nobody", &message).unwrap_err();
        assert!(matches!(err, AgentError::NotFound(_)));
    }
}
