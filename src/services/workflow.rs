use crate::core::config::Config;
use crate::core::error::StateError;
use crate::core::io::Storage;
use crate::core::state::{
    Character, Outline, RunManifest, STATUS_CHARACTERS_GENERATED, STATUS_COMPLETED,
    STATUS_INCOMPLETE, STATUS_OUTLINE_GENERATED, STATUS_WRITING,
};
use crate::services::agents::{
    AgentMessage, AgentOutput, AgentRegistry, TaskResult, CHAPTER_AGENT, CHARACTER_AGENT,
    OUTLINE_AGENT,
};
use crate::services::collaboration::{CollaborationStore, CHARACTERS_KEY, NOVEL_OUTLINE_KEY};
use crate::services::llm::LlmClient;
use crate::services::queue::{
    ChapterTaskPayload, CharacterTaskPayload, OutlineTaskPayload, Task, TaskPayload, TaskQueue,
};
use crate::services::story_state::StoryStateManager;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Drives a run: seeds the outline task, dispatches queued tasks one at a
/// time and schedules each stage's follow-up work.
pub struct WorkflowManager {
    prompt: String,
    agents: AgentRegistry,
    state: StoryStateManager,
    collaboration: CollaborationStore,
    queue: TaskQueue,
    manifest: Option<RunManifest>,
    checkpoint_chapters: bool,
    progress: ProgressBar,
}

impl WorkflowManager {
    pub fn new(config: &Config, prompt: &str, llm: Arc<dyn LlmClient>, storage: Arc<dyn Storage>) -> Self {
        let agents = AgentRegistry::with_default_agents(llm, &config.language);
        let state = StoryStateManager::new(storage, config.state_file.clone());
        Self::from_parts(prompt, agents, state).checkpoint_chapters(config.checkpoint_chapters)
    }

    pub fn from_parts(prompt: &str, agents: AgentRegistry, state: StoryStateManager) -> Self {
        Self {
            prompt: prompt.to_string(),
            agents,
            state,
            collaboration: CollaborationStore::new(),
            queue: TaskQueue::new(),
            manifest: None,
            checkpoint_chapters: true,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn checkpoint_chapters(mut self, enabled: bool) -> Self {
        self.checkpoint_chapters = enabled;
        self
    }

    pub fn with_collaboration(mut self, collaboration: CollaborationStore) -> Self {
        self.collaboration = collaboration;
        self
    }

    pub fn with_progress_bar(mut self) -> Result<Self> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(120));
        self.progress = pb;
        Ok(self)
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn story_state(&self) -> &StoryStateManager {
        &self.state
    }

    pub fn collaboration(&self) -> &CollaborationStore {
        &self.collaboration
    }

    pub fn enqueue(&mut self, task: Task) {
        self.queue.enqueue(task);
    }

    pub fn seed(&mut self) {
        log::info!("[Workflow] Step 1: Outline Generation for prompt '{}'", self.prompt);
        self.enqueue(Task::new(
            OUTLINE_AGENT,
            TaskPayload::Outline(OutlineTaskPayload {
                prompt: self.prompt.clone(),
            }),
        ));
    }

    /// Seeds, drains the queue and persists the final snapshot.
    pub async fn run(&mut self) -> Result<()> {
        self.seed();
        self.drain().await?;
        self.finish().await
    }

    /// Continues an earlier run from its saved outline and story state.
    /// Chapters that are missing, or were only drafted before the characters
    /// existed, are written again.
    pub async fn resume(&mut self) -> Result<()> {
        let manifest = self
            .state
            .load_manifest()
            .await?
            .context("No saved outline found; start a new run first")?;
        self.state.restore().await?;
        self.prompt = manifest.prompt.clone();

        let outline = manifest.outline.clone();
        let cast_chapters = manifest.cast_chapters.clone();
        self.manifest = Some(manifest);
        if !self.state.state().overall_progress.outline_generated {
            self.state.record_outline_generated(outline.chapters.len());
        }
        self.collaboration
            .publish(OUTLINE_AGENT, NOVEL_OUTLINE_KEY, serde_json::to_value(&outline)?);

        let characters = self.state.characters();
        if characters.is_empty() {
            log::info!("[Workflow] Resuming from character generation");
            self.enqueue_character_task(&outline);
        } else {
            let pending: Vec<ChapterTaskPayload> =
                ChapterTaskPayload::for_outline(&outline, Some(characters.as_slice()))
                    .filter(|p| !cast_chapters.contains(&p.position))
                    .collect();
            log::info!("[Workflow] Resuming with {} chapters left to write", pending.len());
            for payload in pending {
                self.enqueue(Task::new(CHAPTER_AGENT, TaskPayload::Chapter(payload)));
            }
        }

        self.drain().await?;
        self.finish().await
    }

    async fn drain(&mut self) -> Result<()> {
        while self.step().await?.is_some() {}
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let progress = &self.state.state().overall_progress;
        let (written, total) = (progress.chapters_written, progress.total_chapters);
        if written < total {
            self.state.update_status(STATUS_INCOMPLETE);
            log::warn!("[Workflow] Creative workflow stopped with {}/{} chapters written", written, total);
            self.progress.finish_with_message("Creative workflow incomplete");
        } else {
            self.state.update_status(STATUS_COMPLETED);
            log::info!("[Workflow] Creative workflow completed: {}/{} chapters written", written, total);
            self.progress.finish_with_message("Creative workflow completed");
        }
        self.save_progress().await
    }

    /// Writes the story state, then the run manifest if one exists.
    async fn save_progress(&self) -> Result<()> {
        self.state.persist().await?;
        if let Some(manifest) = &self.manifest {
            self.state.save_manifest(manifest).await?;
        }
        Ok(())
    }

    /// Runs the next queued task. `Ok(None)` once the queue is empty.
    pub async fn step(&mut self) -> Result<Option<TaskResult>> {
        let Some(task) = self.queue.dequeue() else {
            return Ok(None);
        };

        self.progress.set_message(format!(
            "{} ({} queued)",
            task.payload.describe(),
            self.queue.size()
        ));

        let result = self.agents.dispatch(&task.target, &task.payload).await;
        match &result {
            TaskResult::Completed(output) => self.on_completed(&task, output.clone()).await?,
            TaskResult::Failed(err) => {
                log::error!("[Workflow] Task '{}' failed for {}: {}", task.payload.describe(), task.target, err);
            }
        }
        Ok(Some(result))
    }

    async fn on_completed(&mut self, task: &Task, output: AgentOutput) -> Result<()> {
        match (output, &task.payload) {
            (AgentOutput::Outline(outline), _) => self.on_outline(outline).await,
            (AgentOutput::Characters(characters), _) => self.on_characters(characters),
            (AgentOutput::Chapter(content), TaskPayload::Chapter(chapter)) => {
                self.on_chapter(chapter, content).await
            }
            (AgentOutput::Chapter(_), other) => {
                log::warn!("[Workflow] Chapter text returned for a {} task; ignoring", other.stage());
                Ok(())
            }
        }
    }

    async fn on_outline(&mut self, outline: Outline) -> Result<()> {
        self.state.record_outline_generated(outline.chapters.len());
        self.state.update_status(STATUS_OUTLINE_GENERATED);
        self.collaboration
            .publish(OUTLINE_AGENT, NOVEL_OUTLINE_KEY, serde_json::to_value(&outline)?);
        let manifest = RunManifest::new(self.prompt.clone(), outline.clone());
        self.state.save_manifest(&manifest).await?;
        self.manifest = Some(manifest);
        log::info!("[Workflow] Outline generated: {} chapters", outline.chapters.len());

        log::info!("[Workflow] Step 2: Character Generation");
        self.enqueue_character_task(&outline);

        log::info!("[Workflow] Step 3: Chapter Generation");
        for payload in ChapterTaskPayload::for_outline(&outline, None) {
            self.enqueue(Task::new(CHAPTER_AGENT, TaskPayload::Chapter(payload)));
        }
        Ok(())
    }

    fn on_characters(&mut self, characters: Vec<Character>) -> Result<()> {
        log::info!("[Workflow] Generated {} characters.", characters.len());
        self.state.add_characters(characters.clone());
        self.state.update_status(STATUS_CHARACTERS_GENERATED);
        self.collaboration
            .publish(CHARACTER_AGENT, CHARACTERS_KEY, serde_json::to_value(&characters)?);

        let Some(outline) = self.collaboration.read_as::<Outline>(NOVEL_OUTLINE_KEY) else {
            let err = StateError::MissingContext {
                key: NOVEL_OUTLINE_KEY.to_string(),
            };
            log::error!("[Workflow] Cannot schedule chapters with character context: {}", err);
            return Ok(());
        };

        let notice = AgentMessage {
            from: CHARACTER_AGENT.to_string(),
            content: format!("{} characters are available", characters.len()),
        };
        match self.agents.send_message(CHAPTER_AGENT, &notice) {
            Ok(ack) => log::debug!("[Workflow] {} acknowledged: {}", ack.agent, ack.response),
            Err(e) => log::warn!("[Workflow] {}", e),
        }

        log::info!("[Workflow] Resuming Chapter Generation with Character Context");
        for payload in ChapterTaskPayload::for_outline(&outline, Some(characters.as_slice())) {
            self.enqueue(Task::new(CHAPTER_AGENT, TaskPayload::Chapter(payload)));
        }
        Ok(())
    }

    async fn on_chapter(&mut self, task: &ChapterTaskPayload, content: String) -> Result<()> {
        if self.state.has_chapter(task.position) {
            let accepted = self.collaboration.propose_change(
                CHAPTER_AGENT,
                json!({
                    "chapter": task.position,
                    "action": "rewrite",
                    "with_characters": task.characters.is_some(),
                }),
            );
            if !accepted {
                log::info!("[Workflow] Rewrite of chapter {} rejected; keeping existing text", task.position);
                return Ok(());
            }
        }

        self.state.add_chapter(task.position, content);
        self.state.update_status(STATUS_WRITING);
        log::info!("[Workflow] Chapter {} '{}' written.", task.position, task.chapter.title);

        if let Some(manifest) = self.manifest.as_mut() {
            if task.characters.is_some() {
                manifest.cast_chapters.insert(task.position);
            } else {
                manifest.cast_chapters.remove(&task.position);
            }
        }

        if self.checkpoint_chapters {
            self.save_progress().await?;
        }
        Ok(())
    }

    fn enqueue_character_task(&mut self, outline: &Outline) {
        self.enqueue(Task::new(
            CHARACTER_AGENT,
            TaskPayload::Characters(CharacterTaskPayload {
                prompt: self.prompt.clone(),
                outline: outline.clone(),
            }),
        ));
    }
}
