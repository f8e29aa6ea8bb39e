use super::{generate, parse_structured, Ack, Agent, AgentMessage, AgentOutput, TaskResult, OUTLINE_AGENT};
use crate::core::error::AgentError;
use crate::core::state::Outline;
use crate::services::llm::LlmClient;
use crate::services::queue::{OutlineTaskPayload, TaskPayload};
use async_trait::async_trait;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a novel planning assistant. Respond only with valid JSON.";

pub struct OutlineAgent {
    llm: Arc<dyn LlmClient>,
    language: String,
}

impl OutlineAgent {
    pub fn new(llm: Arc<dyn LlmClient>, language: &str) -> Self {
        Self {
            llm,
            language: language.to_string(),
        }
    }

    fn build_prompt(&self, task: &OutlineTaskPayload) -> String {
        format!(
            "Plan a novel based on the following prompt.\n\
            Write every value in this language: {}.\n\n\
            Prompt: {}\n\n\
            Return a single JSON object:\n\
            {{ \"title\": \"...\", \"logline\": \"one sentence\", \
            \"chapters\": [ {{ \"title\": \"...\", \"summary\": \"...\" }} ] }}\n\
            List the chapters in reading order.",
            self.language, task.prompt
        )
    }

    async fn run(&self, task: &OutlineTaskPayload) -> Result<AgentOutput, AgentError> {
        log::info!("{} is generating an outline for: {}", OUTLINE_AGENT, task.prompt);
        let response = generate(self.llm.as_ref(), OUTLINE_AGENT, SYSTEM_PROMPT, &self.build_prompt(task)).await?;

        let outline: Outline = parse_structured(OUTLINE_AGENT, "outline", &response)?;
        if outline.chapters.is_empty() {
            return Err(AgentError::Parse {
                agent: OUTLINE_AGENT.to_string(),
                reason: "Outline contains no chapters".to_string(),
                raw: response,
            });
        }

        log::info!("{} generated outline: {}", OUTLINE_AGENT, outline.title);
        Ok(AgentOutput::Outline(outline))
    }
}

#[async_trait]
impl Agent for OutlineAgent {
    fn name(&self) -> &str {
        OUTLINE_AGENT
    }

    async fn execute_task(&self, payload: &TaskPayload) -> TaskResult {
        match payload {
            TaskPayload::Outline(task) => self.run(task).await.into(),
            other => TaskResult::Failed(AgentError::UnexpectedPayload {
                agent: OUTLINE_AGENT.to_string(),
                stage: other.stage(),
            }),
        }
    }

    fn communicate(&self, message: &AgentMessage) -> Ack {
        log::info!("{} received message from {}: {}", OUTLINE_AGENT, message.from, message.content);
        Ack {
            agent: OUTLINE_AGENT.to_string(),
            response: "Outline request received.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::agents::testing::FixedLlm;

    fn payload(prompt: &str) -> TaskPayload {
        TaskPayload::Outline(OutlineTaskPayload {
            prompt: prompt.to_string(),
        })
    }

    #[tokio::test]
    async fn test_parses_fenced_outline() {
        let llm = Arc::new(FixedLlm::ok(
            "```json\n{\"title\": \"Neon Shadows\", \"logline\": \"A detective uncovers an AI plot.\", \
             \"chapters\": [{\"title\": \"One\", \"summary\": \"Intro\"}, {\"title\": \"Two\", \"summary\": \"Case\"}]}\n```",
        ));
        let prompts = llm.prompts.clone();
        let agent = OutlineAgent::new(llm, "en");

        match agent.execute_task(&payload("cyberpunk detective")).await {
            TaskResult::Completed(AgentOutput::Outline(outline)) => {
                assert_eq!(outline.title, "Neon Shadows");
                assert_eq!(outline.chapters.len(), 2);
                assert_eq!(outline.chapters[1].summary, "Case");
            }
            other => panic!("unexpected result {:?}", other),
        }

        let prompts = prompts.lock().unwrap();
        assert!(prompts[0].contains("cyberpunk detective"));
        assert!(prompts[0].contains("language: en"));
    }

    #[tokio::test]
    async fn test_empty_chapter_list_fails() {
        let agent = OutlineAgent::new(
            Arc::new(FixedLlm::ok(r#"{"title": "T", "logline": "L", "chapters": []}"#)),
            "en",
        );
        let result = agent.execute_task(&payload("p")).await;
        assert!(matches!(result, TaskResult::Failed(AgentError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_wrong_payload_rejected() {
        let agent = OutlineAgent::new(Arc::new(FixedLlm::ok("{}")), "en");
        let chapter = TaskPayload::Chapter(crate::services::queue::ChapterTaskPayload {
            position: 1,
            chapter: crate::core::state::ChapterSummary {
                title: "t".to_string(),
                summary: "s".to_string(),
            },
            novel_title: "T".to_string(),
            logline: "L".to_string(),
            characters: None,
        });
        let result = agent.execute_task(&chapter).await;
        assert_eq!(
            result,
            TaskResult::Failed(AgentError::UnexpectedPayload {
                agent: OUTLINE_AGENT.to_string(),
                stage: "chapter",
            })
        );
    }

    #[test]
    fn test_communicate_acknowledges() {
        let agent = OutlineAgent::new(Arc::new(FixedLlm::ok("")), "en");
        let ack = agent.communicate(&AgentMessage {
            from: "workflow".to_string(),
            content: "hello".to_string(),
        });
        assert_eq!(ack.agent, OUTLINE_AGENT);
    }
}
