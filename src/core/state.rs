use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const STATUS_INITIALIZED: &str = "initialized";
pub const STATUS_OUTLINE_GENERATED: &str = "outline_generated";
pub const STATUS_CHARACTERS_GENERATED: &str = "characters_generated";
pub const STATUS_WRITING: &str = "writing_chapters";
pub const STATUS_COMPLETED: &str = "completed";
/// Queue drained with some outline chapters still unwritten.
pub const STATUS_INCOMPLETE: &str = "incomplete";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChapterSummary {
    pub title: String,
    pub summary: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Outline {
    pub title: String,
    pub logline: String,
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Character {
    pub name: String,
    pub personality: Vec<String>,
    pub background: String,
    pub role: String,
    pub unique_traits: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct World {
    pub name: String,
    pub description: String,
    pub rules: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Plotline {
    pub name: String,
    pub summary: String,
    pub key_events: Vec<String>,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct StoryElements {
    pub world: Option<World>,
    pub characters: HashMap<String, Character>,
    pub plotlines: HashMap<String, Plotline>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OverallProgress {
    pub outline_generated: bool,
    pub chapters_written: usize,
    pub total_chapters: usize,
    pub status: String,
}

impl Default for OverallProgress {
    fn default() -> Self {
        Self {
            outline_generated: false,
            chapters_written: 0,
            total_chapters: 0,
            status: STATUS_INITIALIZED.to_string(),
        }
    }
}

/// Aggregate persisted as one snapshot per run.
///
/// `chapters_content` is keyed by 1-based outline position. JSON stores the
/// keys as strings; the `BTreeMap` keeps them in numeric order in memory.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct StoryState {
    pub story_elements: StoryElements,
    pub chapters_content: BTreeMap<u32, String>,
    pub current_chapter_index: u32,
    pub overall_progress: OverallProgress,
}

/// Prompt and outline of a run, saved once the outline exists so the run can
/// be resumed later.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunManifest {
    pub prompt: String,
    pub outline: Outline,
    /// Positions whose current text was written with the character list.
    #[serde(default)]
    pub cast_chapters: BTreeSet<u32>,
}

impl RunManifest {
    pub fn new(prompt: impl Into<String>, outline: Outline) -> Self {
        Self {
            prompt: prompt.into(),
            outline,
            cast_chapters: BTreeSet::new(),
        }
    }
}
