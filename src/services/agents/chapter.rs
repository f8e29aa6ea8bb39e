use super::{generate, Ack, Agent, AgentMessage, AgentOutput, TaskResult, CHAPTER_AGENT};
use crate::core::error::AgentError;
use crate::services::llm::LlmClient;
use crate::services::queue::{ChapterTaskPayload, TaskPayload};
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a novelist. Reply with the chapter text only.";

pub struct ChapterAgent {
    llm: Arc<dyn LlmClient>,
    language: String,
}

impl ChapterAgent {
    pub fn new(llm: Arc<dyn LlmClient>, language: &str) -> Self {
        Self {
            llm,
            language: language.to_string(),
        }
    }

    fn build_prompt(&self, task: &ChapterTaskPayload) -> String {
        let cast = match &task.characters {
            Some(characters) if !characters.is_empty() => characters
                .iter()
                .map(|c| {
                    format!(
                        "- {} ({}): {}. {} Traits: {}",
                        c.name,
                        c.role,
                        c.personality.join(", "),
                        c.background,
                        c.unique_traits
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "(no character sheet yet; introduce characters as the story needs)".to_string(),
        };

        format!(
            "Write chapter {} of the novel \"{}\".\n\
            Logline: {}\n\n\
            Chapter title: {}\n\
            Chapter summary: {}\n\n\
            Characters:\n{}\n\n\
            Write in this language: {}. Return only the chapter prose, without headings or commentary.",
            task.position,
            task.novel_title,
            task.logline,
            task.chapter.title,
            task.chapter.summary,
            cast,
            self.language,
        )
    }

    async fn run(&self, task: &ChapterTaskPayload) -> Result<AgentOutput, AgentError> {
        log::info!("{} is writing chapter {}: {}", CHAPTER_AGENT, task.position, task.chapter.title);
        let text = generate(self.llm.as_ref(), CHAPTER_AGENT, SYSTEM_PROMPT, &self.build_prompt(task)).await?;
        Ok(AgentOutput::Chapter(text.trim().to_string()))
    }
}

#[async_trait]
impl Agent for ChapterAgent {
    fn name(&self) -> &str {
        CHAPTER_AGENT
    }

    async fn execute_task(&self, payload: &TaskPayload) -> TaskResult {
        match payload {
            TaskPayload::Chapter(task) => self.run(task).await.into(),
            other => TaskResult::Failed(AgentError::UnexpectedPayload {
                agent: CHAPTER_AGENT.to_string(),
                stage: other.stage(),
            }),
        }
    }

    fn communicate(&self, message: &AgentMessage) -> Ack {
        log::info!("{} received message from {}: {}", CHAPTER_AGENT, message.from, message.content);
        Ack {
            agent: CHAPTER_AGENT.to_string(),
            response: "Chapter request received.".to_string(),
        }
    }
}
