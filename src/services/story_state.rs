use crate::core::error::StateError;
use crate::core::io::Storage;
use crate::core::state::{
    Character, OverallProgress, Plotline, RunManifest, StoryState, World,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MANIFEST_KEY: &str = "novel_outline";

/// Sole writer of the run's `StoryState`.
pub struct StoryStateManager {
    state: StoryState,
    storage: Arc<dyn Storage>,
    state_key: String,
}

impl StoryStateManager {
    pub fn new(storage: Arc<dyn Storage>, state_key: impl Into<String>) -> Self {
        Self {
            state: StoryState::default(),
            storage,
            state_key: state_key.into(),
        }
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    /// Owned copy; later updates do not show up in it.
    pub fn snapshot(&self) -> StoryState {
        self.state.clone()
    }

    pub fn record_outline_generated(&mut self, chapter_count: usize) {
        let progress = &mut self.state.overall_progress;
        progress.outline_generated = true;
        progress.total_chapters = chapter_count;
    }

    /// Upserts by name. A character whose name is already present replaces
    /// the old record whole; the replaced records are returned.
    pub fn add_characters(&mut self, characters: Vec<Character>) -> Vec<Character> {
        let mut replaced = Vec::new();
        for character in characters {
            let name = character.name.clone();
            if let Some(old) = self.state.story_elements.characters.insert(name.clone(), character) {
                log::warn!("Character '{}' already existed and was replaced", name);
                replaced.push(old);
            }
        }
        replaced
    }

    pub fn characters(&self) -> Vec<Character> {
        let mut characters: Vec<Character> =
            self.state.story_elements.characters.values().cloned().collect();
        characters.sort_by(|a, b| a.name.cmp(&b.name));
        characters
    }

    pub fn set_world(&mut self, world: World) {
        self.state.story_elements.world = Some(world);
    }

    pub fn add_plotline(&mut self, plotline: Plotline) {
        self.state
            .story_elements
            .plotlines
            .insert(plotline.name.clone(), plotline);
    }

    /// Returns the previous content when the chapter was already written.
    pub fn add_chapter(&mut self, index: u32, content: String) -> Option<String> {
        let previous = self.state.chapters_content.insert(index, content);
        self.state.current_chapter_index = index;
        self.state.overall_progress.chapters_written = self.state.chapters_content.len();
        previous
    }

    pub fn has_chapter(&self, index: u32) -> bool {
        self.state.chapters_content.contains_key(&index)
    }

    pub fn update_status(&mut self, status: &str) {
        self.state.overall_progress.status = status.to_string();
    }

    pub async fn persist(&self) -> Result<()> {
        let data = serde_json::to_value(&self.state)?;
        self.storage
            .save(&self.state_key, &data)
            .await
            .with_context(|| format!("Failed to persist story state '{}'", self.state_key))
    }

    /// Replaces in-memory state with the saved snapshot. Returns `false` when
    /// nothing was saved yet, leaving the current state untouched.
    pub async fn restore(&mut self) -> Result<bool> {
        match self.storage.load(&self.state_key).await? {
            Some(data) => {
                self.state = rehydrate(&data);
                log::info!("[Persistence] Story state loaded.");
                Ok(true)
            }
            None => {
                log::info!("[Persistence] No saved state found to load.");
                Ok(false)
            }
        }
    }

    pub async fn save_manifest(&self, manifest: &RunManifest) -> Result<()> {
        self.storage
            .save(MANIFEST_KEY, &serde_json::to_value(manifest)?)
            .await
    }

    pub async fn load_manifest(&self) -> Result<Option<RunManifest>> {
        match self.storage.load(MANIFEST_KEY).await? {
            Some(data) => Ok(Some(
                serde_json::from_value(data).context("Saved outline is malformed")?,
            )),
            None => Ok(None),
        }
    }

    pub fn export_text(&self) -> String {
        render_chapters(&self.state.chapters_content)
    }
}

/// Chapters in ascending numeric order, each behind a delimiter line.
pub fn render_chapters(chapters: &BTreeMap<u32, String>) -> String {
    let mut out = String::new();
    for (index, content) in chapters {
        out.push_str(&format!("--- Chapter {} ---\n", index));
        out.push_str(content.trim_end());
        out.push_str("\n\n");
    }
    out
}

fn reconstruct<T: DeserializeOwned>(
    kind: &'static str,
    name: &str,
    raw: &Value,
) -> Result<T, StateError> {
    serde_json::from_value(raw.clone()).map_err(|e| StateError::Reconstruction {
        kind,
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn rehydrate(data: &Value) -> StoryState {
    let mut state = StoryState::default();
    let elements = &data["story_elements"];

    if let Some(raw) = elements.get("world").filter(|w| !w.is_null()) {
        let name = raw["name"].as_str().unwrap_or("<unnamed>");
        match reconstruct::<World>("world", name, raw) {
            Ok(world) => state.story_elements.world = Some(world),
            Err(e) => log::warn!("{}; skipping", e),
        }
    }

    if let Some(map) = elements.get("characters").and_then(Value::as_object) {
        for (name, raw) in map {
            match reconstruct::<Character>("character", name, raw) {
                Ok(c) => {
                    state.story_elements.characters.insert(c.name.clone(), c);
                }
                Err(e) => log::warn!("{}; skipping", e),
            }
        }
    }

    if let Some(map) = elements.get("plotlines").and_then(Value::as_object) {
        for (name, raw) in map {
            match reconstruct::<Plotline>("plotline", name, raw) {
                Ok(p) => {
                    state.story_elements.plotlines.insert(p.name.clone(), p);
                }
                Err(e) => log::warn!("{}; skipping", e),
            }
        }
    }

    if let Some(map) = data.get("chapters_content").and_then(Value::as_object) {
        for (key, raw) in map {
            match (key.parse::<u32>(), raw.as_str()) {
                (Ok(index), Some(text)) => {
                    state.chapters_content.insert(index, text.to_string());
                }
                _ => log::warn!("Chapter entry '{}' is malformed; skipping", key),
            }
        }
    }

    state.current_chapter_index = data["current_chapter_index"]
        .as_u64()
        .and_then(|i| u32::try_from(i).ok())
        .unwrap_or(0);

    state.overall_progress = match data.get("overall_progress") {
        Some(raw) => reconstruct::<OverallProgress>("overall_progress", "overall_progress", raw)
            .unwrap_or_else(|e| {
                log::warn!("{}; using defaults", e);
                OverallProgress::default()
            }),
        None => OverallProgress::default(),
    };
    state.overall_progress.chapters_written = state.chapters_content.len();

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::state::{ChapterSummary, Outline};
    use serde_json::json;

    fn character(name: &str, role: &str) -> Character {
        Character {
            name: name.to_string(),
            personality: vec!["brave".to_string(), "stubborn".to_string()],
            background: format!("{} grew up in the lower city.", name),
            role: role.to_string(),
            unique_traits: "chrome left arm".to_string(),
        }
    }

    fn manager(dir: &std::path::Path) -> StoryStateManager {
        StoryStateManager::new(Arc::new(NativeStorage::new(dir)), "story_state")
    }

    #[test]
    fn test_chapters_written_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());

        assert_eq!(m.state().overall_progress.chapters_written, 0);
        m.add_chapter(1, "A".to_string());
        m.add_chapter(2, "B".to_string());
        assert_eq!(m.state().overall_progress.chapters_written, 2);

        let previous = m.add_chapter(1, "A2".to_string());
        assert_eq!(previous.as_deref(), Some("A"));
        assert_eq!(m.state().overall_progress.chapters_written, 2);
        assert_eq!(m.state().chapters_content.len(), 2);
        assert_eq!(m.state().current_chapter_index, 1);
    }

    #[test]
    fn test_character_upsert_replaces_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());

        assert!(m.add_characters(vec![character("Kai", "detective")]).is_empty());

        let newer = Character {
            personality: vec!["calm".to_string()],
            unique_traits: String::new(),
            ..character("Kai", "informant")
        };
        let replaced = m.add_characters(vec![newer.clone()]);

        assert_eq!(replaced, vec![character("Kai", "detective")]);
        assert_eq!(m.state().story_elements.characters.len(), 1);
        assert_eq!(m.state().story_elements.characters["Kai"], newer);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());
        m.add_chapter(1, "A".to_string());

        let snap = m.snapshot();
        m.add_chapter(2, "B".to_string());
        m.update_status("writing_chapters");

        assert_eq!(snap.chapters_content.len(), 1);
        assert_eq!(snap.overall_progress.status, "initialized");
    }

    #[tokio::test]
    async fn test_persist_restore_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut saved = manager(dir.path());
        saved.record_outline_generated(3);
        saved.add_characters(vec![character("Kai", "detective"), character("Mira", "hacker")]);
        saved.set_world(World {
            name: "Neo Shanghai".to_string(),
            description: "Rain and neon".to_string(),
            rules: vec!["No AI above level 5".to_string()],
        });
        saved.add_plotline(Plotline {
            name: "Conspiracy".to_string(),
            summary: "Corporate AI plot".to_string(),
            key_events: vec!["Break-in".to_string()],
        });
        saved.add_chapter(1, "第一章".to_string());
        saved.add_chapter(2, "第二章".to_string());
        saved.update_status("writing_chapters");

        let snap = saved.snapshot();
        saved.persist().await?;

        let mut fresh = manager(dir.path());
        assert!(fresh.restore().await?);

        assert_eq!(fresh.snapshot(), snap);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_skips_malformed_records() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let doc = json!({
            "story_elements": {
                "world": {"name": "Broken world"},
                "characters": {
                    "Kai": {
                        "name": "Kai",
                        "personality": ["brave"],
                        "background": "b",
                        "role": "detective",
                        "unique_traits": "t"
                    },
                    "Ghost": {"name": "Ghost", "role": "missing fields"}
                },
                "plotlines": {}
            },
            "chapters_content": {"1": "A", "x": "bad key"},
            "current_chapter_index": 1,
            "overall_progress": {
                "outline_generated": true,
                "chapters_written": 7,
                "total_chapters": 3,
                "status": "writing_chapters"
            }
        });
        std::fs::write(dir.path().join("story_state.json"), doc.to_string())?;

        let mut m = manager(dir.path());
        assert!(m.restore().await?);

        let state = m.state();
        assert!(state.story_elements.world.is_none());
        assert_eq!(state.story_elements.characters.len(), 1);
        assert!(state.story_elements.characters.contains_key("Kai"));
        assert_eq!(state.chapters_content.len(), 1);
        // recomputed, not trusted from disk
        assert_eq!(state.overall_progress.chapters_written, 1);
        assert_eq!(state.overall_progress.total_chapters, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_malformed_progress_uses_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let doc = json!({
            "story_elements": {"world": null, "characters": {}, "plotlines": {}},
            "chapters_content": {"1": "A", "2": "B"},
            "current_chapter_index": 2,
            "overall_progress": {"outline_generated": "yes", "status": 5}
        });
        std::fs::write(dir.path().join("story_state.json"), doc.to_string())?;

        let mut m = manager(dir.path());
        assert!(m.restore().await?);

        let progress = &m.state().overall_progress;
        assert!(!progress.outline_generated);
        assert_eq!(progress.total_chapters, 0);
        assert_eq!(progress.status, "initialized");
        assert_eq!(progress.chapters_written, 2);
        assert_eq!(m.state().chapters_content.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_without_saved_state() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut m = manager(dir.path());
        m.add_chapter(1, "kept".to_string());
        assert!(!m.restore().await?);
        assert!(m.has_chapter(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_export_sorts_numerically() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let doc = json!({
            "story_elements": {"world": null, "characters": {}, "plotlines": {}},
            "chapters_content": {"2": "B", "10": "J", "1": "A"},
            "current_chapter_index": 10,
            "overall_progress": {
                "outline_generated": true,
                "chapters_written": 3,
                "total_chapters": 10,
                "status": "completed"
            }
        });
        std::fs::write(dir.path().join("story_state.json"), doc.to_string())?;

        let mut m = manager(dir.path());
        m.restore().await?;

        assert_eq!(
            m.export_text(),
            "--- Chapter 1 ---\nA\n\n--- Chapter 2 ---\nB\n\n--- Chapter 10 ---\nJ\n\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_manifest_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let m = manager(dir.path());
        assert!(m.load_manifest().await?.is_none());

        let mut manifest = RunManifest::new(
            "cyberpunk detective",
            Outline {
                title: "T".to_string(),
                logline: "L".to_string(),
                chapters: vec![ChapterSummary {
                    title: "c".to_string(),
                    summary: "s".to_string(),
                }],
            },
        );
        manifest.cast_chapters.insert(1);
        m.save_manifest(&manifest).await?;
        assert_eq!(m.load_manifest().await?, Some(manifest));
        Ok(())
    }

    #[tokio::test]
    async fn test_manifest_without_cast_chapters_loads() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let doc = json!({
            "prompt": "p",
            "outline": {"title": "T", "logline": "L", "chapters": []}
        });
        std::fs::write(dir.path().join("novel_outline.json"), doc.to_string())?;

        let manifest = manager(dir.path()).load_manifest().await?.unwrap();
        assert!(manifest.cast_chapters.is_empty());
        Ok(())
    }
}
