use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::llm::LlmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_data")]
    pub data_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Storage key of the story state snapshot, without extension.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Language the workers are asked to write in.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_checkpoint")]
    pub checkpoint_chapters: bool,

    pub llm: LlmConfig,
}

fn default_data() -> String {
    "data".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_state_file() -> String {
    "story_state".to_string()
}
fn default_language() -> String {
    "zh".to_string()
}
fn default_checkpoint() -> bool {
    true
}

impl Config {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
