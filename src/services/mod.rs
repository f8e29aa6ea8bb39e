pub mod agents;
pub mod collaboration;
pub mod llm;
pub mod queue;
pub mod story_state;
pub mod workflow;
