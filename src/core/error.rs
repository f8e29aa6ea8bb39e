/// Reasons a dispatched task can fail. Carried inside `TaskResult::Failed`;
/// none of these stop the workflow loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {0} not found.")]
    NotFound(String),
    #[error("{agent}: generation failed: {reason}")]
    Generation { agent: String, reason: String },
    #[error("{agent}: {reason}. Response: {raw}")]
    Parse {
        agent: String,
        reason: String,
        raw: String,
    },
    #[error("{agent} cannot handle a {stage} task")]
    UnexpectedPayload { agent: String, stage: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to reconstruct {kind} '{name}': {reason}")]
    Reconstruction {
        kind: &'static str,
        name: String,
        reason: String,
    },
    #[error("shared context '{key}' is missing")]
    MissingContext { key: String },
}
