use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use novelforge::core::config::{Config, DEFAULT_CONFIG_PATH};
use novelforge::core::io::{NativeStorage, Storage};
use novelforge::services::llm;
use novelforge::services::story_state::StoryStateManager;
use novelforge::services::workflow::WorkflowManager;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "novelforge", about = "Multi-agent novel writing workflow")]
struct Cli {
    #[arg(long, env = "NOVELFORGE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new run from a story prompt
    Start {
        /// e.g. "a cyberpunk detective story"
        prompt: Option<String>,
    },
    /// Continue an interrupted run
    Resume,
    /// Show progress of the saved story
    Status,
    /// Rewrite the saved story state snapshot
    Save,
    /// Load the saved story state and summarize it
    Load,
    /// Write all chapters into one text file
    Export {
        #[arg(long, default_value = "novel.txt")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please ensure '{}' exists with valid LLM settings.", cli.config);
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new(&config.data_folder));

    match cli.command {
        Command::Start { prompt } => {
            let prompt = match prompt {
                Some(p) => p,
                None => inquire::Text::new("Story prompt:").prompt()?,
            };
            println!("Starting creative workflow with prompt: {}", prompt);

            let llm: Arc<dyn llm::LlmClient> = Arc::from(llm::create_llm(&config.llm)?);
            let mut manager = WorkflowManager::new(&config, &prompt, llm, storage).with_progress_bar()?;
            manager.run().await?;
            print_status(manager.story_state());
        }
        Command::Resume => {
            let llm: Arc<dyn llm::LlmClient> = Arc::from(llm::create_llm(&config.llm)?);
            let mut manager = WorkflowManager::new(&config, "", llm, storage).with_progress_bar()?;
            manager.resume().await?;
            print_status(manager.story_state());
        }
        Command::Status => {
            let manager = load_state(&config, storage).await?;
            print_status(&manager);
        }
        Command::Save => {
            let manager = load_state(&config, storage).await?;
            manager.persist().await?;
            println!("Story state saved.");
        }
        Command::Load => {
            let manager = load_state(&config, storage).await?;
            println!(
                "Story state loaded: {} chapters, {} characters.",
                manager.state().chapters_content.len(),
                manager.state().story_elements.characters.len()
            );
        }
        Command::Export { output } => {
            let manager = load_state(&config, storage).await?;
            if manager.state().chapters_content.is_empty() {
                println!("No chapters written yet; nothing to export.");
                return Ok(());
            }
            let out = NativeStorage::new(&config.output_folder);
            out.write_text(&output, &manager.export_text())
                .await
                .with_context(|| format!("Failed to export to {}", output))?;
            println!("Exported to {}", out.base_path().join(&output).display());
        }
    }

    Ok(())
}

async fn load_state(config: &Config, storage: Arc<dyn Storage>) -> Result<StoryStateManager> {
    let mut manager = StoryStateManager::new(storage, config.state_file.clone());
    if !manager.restore().await? {
        println!("No saved story state found in {}.", config.data_folder);
    }
    Ok(manager)
}

fn print_status(manager: &StoryStateManager) {
    let state = manager.state();
    let progress = &state.overall_progress;

    println!("Outline generated: {}", if progress.outline_generated { "yes" } else { "no" });
    println!("Chapters written:  {}/{}", progress.chapters_written, progress.total_chapters);
    println!("Status:            {}", progress.status);

    if let Some(world) = &state.story_elements.world {
        println!("World:             {} - {}", world.name, world.description);
    }
    let characters = manager.characters();
    if !characters.is_empty() {
        let names: Vec<&str> = characters.iter().map(|c| c.name.as_str()).collect();
        println!("Characters:        {}", names.join(", "));
    }
}
