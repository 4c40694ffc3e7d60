use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A concept ranked within an owner's interest window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptScore {
    pub concept: String,
    pub frequency: u32,
    /// Mean normalized degree of the entities behind this concept.
    pub importance: f32,
    /// 1.0 for today, halving every half-window.
    pub recency: f32,
    pub score: f32,
}

/// Snapshot of what an owner has been reading about. Rebuilt wholesale on
/// every analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestProfile {
    pub owner: String,
    #[serde(skip_serializing, default)]
    pub interest_vector: Vec<f32>,
    pub concepts: Vec<ConceptScore>,
    pub emerging: Vec<String>,
    pub declining: Vec<String>,
    pub stable: Vec<String>,
    pub window_days: u32,
    pub entity_count: u32,
    pub generated_at: DateTime<Utc>,
}

impl InterestProfile {
    pub fn empty(owner: &str, window_days: u32) -> Self {
        Self {
            owner: owner.to_string(),
            interest_vector: Vec::new(),
            concepts: Vec::new(),
            emerging: Vec::new(),
            declining: Vec::new(),
            stable: Vec::new(),
            window_days,
            entity_count: 0,
            generated_at: Utc::now(),
        }
    }
}
