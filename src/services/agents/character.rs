use super::{generate, parse_structured, Ack, Agent, AgentMessage, AgentOutput, TaskResult, CHARACTER_AGENT};
use crate::core::error::AgentError;
use crate::core::state::Character;
use crate::services::llm::LlmClient;
use crate::services::queue::{CharacterTaskPayload, TaskPayload};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a character designer for novels. Respond only with valid JSON.";

// Models sometimes wrap the array in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum CharacterList {
    Bare(Vec<Character>),
    Wrapped { characters: Vec<Character> },
}

pub struct CharacterAgent {
    llm: Arc<dyn LlmClient>,
    language: String,
}

impl CharacterAgent {
    pub fn new(llm: Arc<dyn LlmClient>, language: &str) -> Self {
        Self {
            llm,
            language: language.to_string(),
        }
    }

    fn build_prompt(&self, task: &CharacterTaskPayload) -> String {
        let chapters_str = task
            .outline
            .chapters
            .iter()
            .enumerate()
            .map(|(i, c)| format!("- Chapter {}: {} - {}", i + 1, c.title, c.summary))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Based on the following story prompt and outline, generate a list of detailed character profiles.\n\
            For each character, include:\n\
            - name\n\
            - personality traits (3-5 adjectives)\n\
            - brief background story (2-3 sentences)\n\
            - key role in the story\n\
            - any unique physical traits or quirks\n\
            Write every value in this language: {}.\n\n\
            Story Prompt: {}\n\n\
            Story Outline:\n\
            Title: {}\n\
            Logline: {}\n\
            Chapters:\n{}\n\n\
            Return only a JSON array:\n\
            [ {{ \"name\": \"...\", \"personality\": [\"...\"], \"background\": \"...\", \
            \"role\": \"...\", \"unique_traits\": \"...\" }} ]",
            self.language,
            task.prompt,
            task.outline.title,
            task.outline.logline,
            chapters_str,
        )
    }

    async fn run(&self, task: &CharacterTaskPayload) -> Result<AgentOutput, AgentError> {
        log::info!("{} is generating characters for: {}", CHARACTER_AGENT, task.outline.title);
        let response =
            generate(self.llm.as_ref(), CHARACTER_AGENT, SYSTEM_PROMPT, &self.build_prompt(task)).await?;

        let characters = match parse_structured::<CharacterList>(CHARACTER_AGENT, "characters", &response)? {
            CharacterList::Bare(list) | CharacterList::Wrapped { characters: list } => list,
        };

        log::info!("{} generated {} characters.", CHARACTER_AGENT, characters.len());
        Ok(AgentOutput::Characters(characters))
    }
}

#[async_trait]
impl Agent for CharacterAgent {
    fn name(&self) -> &str {
        CHARACTER_AGENT
    }

    async fn execute_task(&self, payload: &TaskPayload) -> TaskResult {
        match payload {
            TaskPayload::Characters(task) => self.run(task).await.into(),
            other => TaskResult::Failed(AgentError::UnexpectedPayload {
                agent: CHARACTER_AGENT.to_string(),
                stage: other.stage(),
            }),
        }
    }

    fn communicate(&self, message: &AgentMessage) -> Ack {
        log::info!("{} received message from {}: {}", CHARACTER_AGENT, message.from, message.content);
        Ack {
            agent: CHARACTER_AGENT.to_string(),
            response: "Character information received.".to_string(),
        }
    }
}
