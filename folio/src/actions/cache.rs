use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::config::ActionCacheConfig;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::error::{FolioError, Result};
use crate::intelligence::similarity::{find_similar, round_score};
use crate::llm::{prompts, CompletionOptions, LlmProvider};
use crate::models::{
    ActionCacheEntry, ActionCacheStats, ActionResolution, ReaderAction, ResolutionOutcome,
};

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Lowercased, trimmed, with whitespace runs collapsed to one space.
pub fn normalize_query(query: &str) -> String {
    whitespace_regex()
        .replace_all(query.trim(), " ")
        .to_lowercase()
}

/// Hex SHA-256 of the normalized query. Identical requests share a hash.
pub fn query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")
}

/// Resolves natural-language reader requests to [`ReaderAction`]s, reusing
/// earlier resolutions whose request embedding is close enough.
#[derive(Clone)]
pub struct ActionSemanticCache {
    db: Arc<dyn DatabaseBackend>,
    embeddings: EmbeddingGateway,
    llm: LlmProvider,
    config: ActionCacheConfig,
}

enum Translation {
    Valid(ReaderAction),
    Failed(ActionResolution),
}

impl ActionSemanticCache {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        embeddings: EmbeddingGateway,
        llm: LlmProvider,
        config: ActionCacheConfig,
    ) -> Self {
        Self {
            db,
            embeddings,
            llm,
            config,
        }
    }

    /// Cached action for a similar earlier request, otherwise a fresh
    /// translation that is stored for next time.
    ///
    /// Provider outages and unusable reasoning output come back as a failed
    /// resolution, not an error.
    pub async fn get_or_translate(&self, owner: &str, query: &str) -> Result<ActionResolution> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FolioError::Validation("Action query is empty".to_string()));
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let embedding = match self.embeddings.embed_with_timeout(query, timeout).await {
            Ok(embedding) => embedding,
            Err(e) if e.is_degradable() => {
                tracing::warn!(owner, error = %e, "Action cache bypassed, query could not be embedded");
                return Ok(match self.translate(query).await? {
                    Translation::Valid(action) => {
                        ActionResolution::translated(action, self.config.default_confidence, None)
                    }
                    Translation::Failed(failed) => failed,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(resolution) = self.lookup(owner, &embedding).await? {
            return Ok(resolution);
        }

        let action = match self.translate(query).await? {
            Translation::Valid(action) => action,
            Translation::Failed(failed) => return Ok(failed),
        };

        let entry = ActionCacheEntry::new(owner, query, query_hash(query), embedding, action.clone());
        let entry_id = if self.db.create_action_entry(&entry).await? {
            tracing::debug!(owner, entry_id = %entry.id, action_type = %entry.action_type, "Cached new action");
            Some(entry.id)
        } else {
            tracing::debug!(owner, "Identical query cached concurrently, keeping existing entry");
            None
        };

        Ok(ActionResolution::translated(
            action,
            self.config.default_confidence,
            entry_id,
        ))
    }

    /// Deletes entries not used in the last `max_age_days` days. An age
    /// reaching past the earliest representable date deletes nothing.
    pub async fn clear_old_entries(&self, owner: &str, max_age_days: u32) -> Result<u64> {
        let Some(cutoff) =
            Utc::now().checked_sub_signed(chrono::Duration::days(i64::from(max_age_days)))
        else {
            tracing::debug!(owner, max_age_days, "Cache age reaches before any entry, nothing to clear");
            return Ok(0);
        };
        let deleted = self
            .db
            .delete_action_entries_unused_since(owner, cutoff)
            .await?;
        tracing::info!(owner, max_age_days, deleted, "Cleared idle action cache entries");
        Ok(deleted)
    }

    pub async fn stats(&self, owner: &str) -> Result<ActionCacheStats> {
        self.db.action_cache_stats(owner).await
    }

    async fn lookup(&self, owner: &str, embedding: &[f32]) -> Result<Option<ActionResolution>> {
        let entries = self
            .db
            .list_top_action_entries(owner, self.config.top_n)
            .await?;
        let hits = find_similar(embedding, &entries, self.config.hit_threshold, |e| {
            Some(e.embedding.as_slice())
        })?;

        let Some(best) = hits.first() else {
            tracing::debug!(owner, scanned = entries.len(), "Action cache miss");
            return Ok(None);
        };

        match self.db.record_action_hit(owner, &best.item.id).await? {
            Some(hit_count) => {
                tracing::debug!(
                    owner,
                    entry_id = %best.item.id,
                    similarity = best.similarity,
                    hit_count,
                    "Action cache hit"
                );
                Ok(Some(ActionResolution::cache_hit(
                    best.item,
                    round_score(best.similarity),
                )))
            }
            None => {
                tracing::debug!(owner, entry_id = %best.item.id, "Cached action vanished before hit");
                Ok(None)
            }
        }
    }

    async fn translate(&self, query: &str) -> Result<Translation> {
        let prompt = prompts::action_translation_prompt(query);
        let value = match self
            .llm
            .complete_json(
                &prompt,
                Some(prompts::JSON_SYSTEM_PROMPT),
                Some(&CompletionOptions::deterministic()),
            )
            .await
        {
            Ok(value) => value,
            Err(e) if e.is_degradable() => {
                tracing::warn!(error = %e, "LLM unavailable for action translation");
                return Ok(Translation::Failed(ActionResolution::failed(
                    ResolutionOutcome::Unavailable,
                    e.to_string(),
                )));
            }
            Err(FolioError::Llm(message)) => {
                tracing::warn!(%message, "LLM returned unusable action output");
                return Ok(Translation::Failed(ActionResolution::failed(
                    ResolutionOutcome::InvalidAction,
                    message,
                )));
            }
            Err(e) => return Err(e),
        };

        match ReaderAction::from_value(value) {
            Ok(action) => Ok(Translation::Valid(action)),
            Err(FolioError::InvalidAction(message)) => {
                tracing::warn!(%message, "Translated action failed validation");
                Ok(Translation::Failed(ActionResolution::failed(
                    ResolutionOutcome::InvalidAction,
                    message,
                )))
            }
            Err(e) => Err(e),
        }
    }
}
