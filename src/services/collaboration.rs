use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

pub const NOVEL_OUTLINE_KEY: &str = "novel_outline";
pub const CHARACTERS_KEY: &str = "characters";

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resolution: String,
    pub details: Value,
}

/// Decides on change proposals and conflicts between workers.
///
/// `AcceptAll` is the only policy shipped. A priority or voting strategy can
/// be plugged in through `CollaborationStore::with_policy` without touching
/// the workflow.
pub trait ConflictPolicy: Send + Sync {
    fn accept(&self, source_id: &str, details: &Value) -> bool;
    fn resolve(&self, details: &Value) -> Resolution;
}

#[derive(Debug, Default)]
pub struct AcceptAll;

impl ConflictPolicy for AcceptAll {
    fn accept(&self, _source_id: &str, _details: &Value) -> bool {
        true
    }

    // Not an arbitration algorithm: it always reports that one proposal won.
    fn resolve(&self, details: &Value) -> Resolution {
        Resolution {
            resolution: "accepted_one_proposal".to_string(),
            details: details.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    Proposal {
        source: String,
        details: Value,
        accepted: bool,
    },
    Resolved {
        details: Value,
        resolution: String,
    },
}

/// Per-run blackboard used to hand data from one stage to the next.
pub struct CollaborationStore {
    shared_context: HashMap<String, Value>,
    sources: HashMap<String, String>,
    log: Vec<ChangeRecord>,
    policy: Box<dyn ConflictPolicy>,
}

impl Default for CollaborationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborationStore {
    pub fn new() -> Self {
        Self::with_policy(Box::new(AcceptAll))
    }

    pub fn with_policy(policy: Box<dyn ConflictPolicy>) -> Self {
        Self {
            shared_context: HashMap::new(),
            sources: HashMap::new(),
            log: Vec::new(),
            policy,
        }
    }

    pub fn publish(&mut self, source_id: &str, key: &str, value: Value) {
        self.shared_context.insert(key.to_string(), value);
        self.sources.insert(key.to_string(), source_id.to_string());
        log::info!("[Collaboration] {} shared {}.", source_id, key);
    }

    pub fn read(&self, key: &str) -> Option<&Value> {
        self.shared_context.get(key)
    }

    /// `None` when the key is absent or does not decode as `T`.
    pub fn read_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("[Collaboration] {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.sources.get(key).map(String::as_str)
    }

    pub fn propose_change(&mut self, source_id: &str, details: Value) -> bool {
        let accepted = self.policy.accept(source_id, &details);
        log::info!(
            "[Collaboration] {} proposed change {} ({})",
            source_id,
            details,
            if accepted { "accepted" } else { "rejected" }
        );
        self.log.push(ChangeRecord::Proposal {
            source: source_id.to_string(),
            details,
            accepted,
        });
        accepted
    }

    pub fn resolve_conflict(&mut self, details: Value) -> Resolution {
        log::info!("[Collaboration] Resolving conflict: {}", details);
        let resolution = self.policy.resolve(&details);
        self.log.push(ChangeRecord::Resolved {
            details,
            resolution: resolution.resolution.clone(),
        });
        resolution
    }

    pub fn change_log(&self) -> &[ChangeRecord] {
        &self.log
    }
}
