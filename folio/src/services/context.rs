use std::collections::HashSet;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::embeddings::EmbeddingGateway;
use crate::error::Result;
use crate::graph::UnifiedGraphEngine;
use crate::intelligence::similarity::{cosine_similarity, round_score};
use crate::models::{ContextBundle, ContextItem, ContextLimits, NodeKind, UnifiedSearchHit};

/// Top memory hits expanded through the graph for related entities.
const RELATED_SEEDS: usize = 3;

/// Assembles bounded prompt context from the unified graph.
pub struct ContextBuilder {
    unified: Arc<UnifiedGraphEngine>,
    embeddings: EmbeddingGateway,
    threshold: f32,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Documents,
    Notes,
    Memories,
    Related,
}

impl ContextBuilder {
    pub fn new(unified: Arc<UnifiedGraphEngine>, embeddings: EmbeddingGateway, threshold: f32) -> Self {
        Self {
            unified,
            embeddings,
            threshold,
        }
    }

    /// Context for `query`. Falls back to the owner's central memories, with
    /// `degraded` set, when the query cannot be embedded.
    pub async fn build(&self, owner: &str, query: &str, limits: ContextLimits) -> Result<ContextBundle> {
        let embedding = match self.embeddings.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) if e.is_degradable() => {
                tracing::warn!(owner, error = %e, "Building degraded context from central memories");
                return self.build_degraded(owner, query, limits).await;
            }
            Err(e) => return Err(e),
        };

        let hits = self
            .unified
            .search_with_embedding(owner, &embedding, usize::MAX, self.threshold)
            .await?;

        let mut documents = Vec::new();
        let mut notes = Vec::new();
        let mut memories = Vec::new();
        for hit in hits {
            let (bucket, cap) = match hit.kind {
                NodeKind::Document => (&mut documents, limits.max_documents),
                NodeKind::Note => (&mut notes, limits.max_notes),
                NodeKind::Memory => (&mut memories, limits.max_memories),
            };
            if bucket.len() < cap {
                bucket.push(item_from_hit(hit));
            }
        }

        let related = if limits.include_related {
            self.related_items(owner, &embedding, &memories, limits.max_memories)
                .await?
        } else {
            Vec::new()
        };

        let bundle = ContextBundle {
            query: query.to_string(),
            documents,
            notes,
            memories,
            related,
            ..Default::default()
        };
        Ok(fit_budget(bundle, limits.max_chars))
    }

    async fn build_degraded(
        &self,
        owner: &str,
        query: &str,
        limits: ContextLimits,
    ) -> Result<ContextBundle> {
        let central = self
            .unified
            .memory_graph()
            .get_central_memories(owner, limits.max_memories)
            .await?;

        let memories = central
            .into_iter()
            .map(|c| ContextItem {
                id: c.entity.id,
                kind: NodeKind::Memory,
                text: c.entity.text,
                score: 0.0,
            })
            .collect();

        let bundle = ContextBundle {
            query: query.to_string(),
            memories,
            degraded: true,
            ..Default::default()
        };
        Ok(fit_budget(bundle, limits.max_chars))
    }

    async fn related_items(
        &self,
        owner: &str,
        query: &[f32],
        memories: &[ContextItem],
        cap: usize,
    ) -> Result<Vec<ContextItem>> {
        let mut seen: HashSet<String> = memories.iter().map(|m| m.id.clone()).collect();
        let mut related = Vec::new();

        for seed in memories.iter().take(RELATED_SEEDS) {
            let graph = self
                .unified
                .memory_graph()
                .get_related_memories(owner, &seed.id, 1)
                .await?;
            for entity in graph.nodes {
                if !seen.insert(entity.id.clone()) {
                    continue;
                }
                let score = round_score(cosine_similarity(query, &entity.embedding)?);
                related.push(ContextItem {
                    id: entity.id,
                    kind: NodeKind::Memory,
                    text: entity.text,
                    score,
                });
            }
        }

        related.sort_by(|a, b| b.score.total_cmp(&a.score));
        related.truncate(cap);
        Ok(related)
    }
}

fn item_from_hit(hit: UnifiedSearchHit) -> ContextItem {
    ContextItem {
        id: hit.id,
        kind: hit.kind,
        text: hit.text,
        score: hit.similarity,
    }
}

fn char_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Keeps the best-ranked items within `max_chars`. Related items rank below
/// every direct hit. A first item that alone exceeds the budget is shortened
/// rather than dropped.
fn fit_budget(mut bundle: ContextBundle, max_chars: usize) -> ContextBundle {
    let mut ranked: Vec<(Section, ContextItem)> = Vec::new();
    ranked.extend(bundle.documents.drain(..).map(|i| (Section::Documents, i)));
    ranked.extend(bundle.notes.drain(..).map(|i| (Section::Notes, i)));
    ranked.extend(bundle.memories.drain(..).map(|i| (Section::Memories, i)));
    ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

    let mut related: Vec<(Section, ContextItem)> =
        bundle.related.drain(..).map(|i| (Section::Related, i)).collect();
    related.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    ranked.extend(related);

    let mut used = 0;
    let mut kept: Vec<(Section, ContextItem)> = Vec::new();
    for (section, mut item) in ranked {
        let len = char_len(&item.text);
        if used + len <= max_chars {
            used += len;
            kept.push((section, item));
        } else if kept.is_empty() && max_chars > 0 {
            item.text = item.text.graphemes(true).take(max_chars).collect();
            used = max_chars;
            bundle.truncated = true;
            kept.push((section, item));
        } else {
            bundle.truncated = true;
        }
    }

    for (section, item) in kept {
        match section {
            Section::Documents => bundle.documents.push(item),
            Section::Notes => bundle.notes.push(item),
            Section::Memories => bundle.memories.push(item),
            Section::Related => bundle.related.push(item),
        }
    }
    bundle.total_chars = used;
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, kind: NodeKind, text: &str, score: f32) -> ContextItem {
        ContextItem {
            id: id.to_string(),
            kind,
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn budget_drops_lowest_ranked_first() {
        let bundle = ContextBundle {
            memories: vec![
                item("m1", NodeKind::Memory, "aaaaa", 0.9),
                item("m2", NodeKind::Memory, "bbbbb", 0.5),
            ],
            notes: vec![item("n1", NodeKind::Note, "ccccc", 0.7)],
            ..Default::default()
        };

        let fitted = fit_budget(bundle, 10);
        assert!(fitted.truncated);
        assert_eq!(fitted.total_chars, 10);
        assert_eq!(fitted.memories.len(), 1);
        assert_eq!(fitted.memories[0].id, "m1");
        assert_eq!(fitted.notes.len(), 1);
    }

    #[test]
    fn related_items_rank_below_direct_hits() {
        let bundle = ContextBundle {
            memories: vec![item("m1", NodeKind::Memory, "aaaa", 0.2)],
            related: vec![item("r1", NodeKind::Memory, "bbbb", 0.99)],
            ..Default::default()
        };

        let fitted = fit_budget(bundle, 6);
        assert_eq!(fitted.memories.len(), 1);
        assert!(fitted.related.is_empty());
    }

    #[test]
    fn oversized_first_item_is_shortened_by_grapheme() {
        let bundle = ContextBundle {
            memories: vec![item("m1", NodeKind::Memory, "héllo wörld", 0.9)],
            ..Default::default()
        };

        let fitted = fit_budget(bundle, 4);
        assert!(fitted.truncated);
        assert_eq!(fitted.memories[0].text, "héll");
        assert_eq!(fitted.total_chars, 4);
    }

    #[test]
    fn everything_fits_untouched() {
        let bundle = ContextBundle {
            documents: vec![item("d1", NodeKind::Document, "Optics", 0.8)],
            ..Default::default()
        };
        let fitted = fit_budget(bundle, 100);
        assert!(!fitted.truncated);
        assert_eq!(fitted.total_chars, 6);
    }
}
