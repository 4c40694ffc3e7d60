//! Reading-interest profiles built from recently extracted entities.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::DatabaseBackend;
use crate::error::{FolioError, Result};
use crate::models::{ConceptScore, EntityType, InterestProfile, MemoryEntity};

use super::similarity::{mean_vector, round_score};

/// Most entities read for one profile.
const MAX_WINDOW_ENTITIES: usize = 5_000;

/// Longest analysis window accepted, one century.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Concepts kept in a profile.
const MAX_CONCEPTS: usize = 20;

const FREQUENCY_WEIGHT: f32 = 0.5;
const IMPORTANCE_WEIGHT: f32 = 0.3;
const RECENCY_WEIGHT: f32 = 0.2;

pub struct InterestAnalyzer {
    db: Arc<dyn DatabaseBackend>,
}

impl InterestAnalyzer {
    pub fn new(db: Arc<dyn DatabaseBackend>) -> Self {
        Self { db }
    }

    /// Rebuilds and stores the owner's profile from entities created in the
    /// last `window_days` days. The previous profile is replaced.
    pub async fn rebuild(&self, owner: &str, window_days: u32) -> Result<InterestProfile> {
        if window_days == 0 || window_days > MAX_WINDOW_DAYS {
            return Err(FolioError::Validation(format!(
                "Interest window must be between 1 and {MAX_WINDOW_DAYS} days"
            )));
        }

        let now = Utc::now();
        let since = now - Duration::days(i64::from(window_days));
        let entities = self
            .db
            .list_entities_since(owner, since, MAX_WINDOW_ENTITIES)
            .await?;

        let profile = analyze(owner, &entities, window_days, now)?;
        self.db.upsert_interest_profile(&profile).await?;

        tracing::info!(
            owner,
            window_days,
            entities = profile.entity_count,
            concepts = profile.concepts.len(),
            emerging = profile.emerging.len(),
            "Interest profile rebuilt"
        );
        Ok(profile)
    }

    pub async fn latest(&self, owner: &str) -> Result<Option<InterestProfile>> {
        self.db.get_interest_profile(owner).await
    }
}

struct ConceptGroup {
    label: String,
    frequency: u32,
    importance_sum: f32,
    newest: DateTime<Utc>,
    older_half: u32,
    newer_half: u32,
}

/// Pure scoring over a window of entities observed at `now`.
pub fn analyze(
    owner: &str,
    entities: &[MemoryEntity],
    window_days: u32,
    now: DateTime<Utc>,
) -> Result<InterestProfile> {
    let mut profile = InterestProfile::empty(owner, window_days);
    profile.generated_at = now;
    profile.entity_count = entities.len() as u32;
    if entities.is_empty() {
        return Ok(profile);
    }

    let vectors: Vec<&[f32]> = entities.iter().map(|e| e.embedding.as_slice()).collect();
    profile.interest_vector = mean_vector(&vectors)?.unwrap_or_default();

    let max_degree = entities.iter().map(|e| e.degree).max().unwrap_or(0);
    let half_window = Duration::days(i64::from(window_days)) / 2;
    let midpoint = now
        .checked_sub_signed(half_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let half_life_days = f64::from(window_days) / 2.0;

    let mut groups: HashMap<String, ConceptGroup> = HashMap::new();
    for entity in entities.iter().filter(|e| e.entity_type == EntityType::Concept) {
        let key = normalize_concept(&entity.text);
        if key.is_empty() {
            continue;
        }
        let importance = if max_degree == 0 {
            0.0
        } else {
            entity.degree as f32 / max_degree as f32
        };

        let group = groups.entry(key).or_insert_with(|| ConceptGroup {
            label: entity.text.clone(),
            frequency: 0,
            importance_sum: 0.0,
            newest: entity.created_at,
            older_half: 0,
            newer_half: 0,
        });
        group.frequency += 1;
        group.importance_sum += importance;
        if entity.created_at > group.newest {
            group.newest = entity.created_at;
        }
        if entity.created_at < midpoint {
            group.older_half += 1;
        } else {
            group.newer_half += 1;
        }
    }

    let max_frequency = groups.values().map(|g| g.frequency).max().unwrap_or(1);
    let mut ranked: Vec<(ConceptScore, u32, u32)> = groups
        .into_values()
        .map(|group| {
            let age_days = (now - group.newest).num_seconds().max(0) as f64 / 86_400.0;
            let recency = 0.5f64.powf(age_days / half_life_days) as f32;
            let importance = group.importance_sum / group.frequency as f32;
            let frequency_norm = group.frequency as f32 / max_frequency as f32;
            let score = FREQUENCY_WEIGHT * frequency_norm
                + IMPORTANCE_WEIGHT * importance
                + RECENCY_WEIGHT * recency;
            (
                ConceptScore {
                    concept: group.label,
                    frequency: group.frequency,
                    importance: round_score(importance),
                    recency: round_score(recency),
                    score: round_score(score),
                },
                group.older_half,
                group.newer_half,
            )
        })
        .collect();

    ranked.sort_by(|(a, _, _), (b, _, _)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.frequency.cmp(&a.frequency))
            .then_with(|| a.concept.cmp(&b.concept))
    });
    ranked.truncate(MAX_CONCEPTS);

    for (concept, older, newer) in ranked {
        match trend(older, newer) {
            Trend::Emerging => profile.emerging.push(concept.concept.clone()),
            Trend::Declining => profile.declining.push(concept.concept.clone()),
            Trend::Stable => profile.stable.push(concept.concept.clone()),
        }
        profile.concepts.push(concept);
    }

    Ok(profile)
}

#[derive(Debug, PartialEq)]
enum Trend {
    Emerging,
    Declining,
    Stable,
}

fn trend(older: u32, newer: u32) -> Trend {
    if newer >= 2 && newer >= older * 2 {
        Trend::Emerging
    } else if older > 0 && older >= newer * 2 {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn normalize_concept(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
