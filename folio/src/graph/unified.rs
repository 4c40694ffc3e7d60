//! Heterogeneous graph over documents, notes and memories.
//!
//! Cross-collection search here is a linear scan over bounded recent windows
//! of each collection. It is the main hotspot for large libraries; a vector
//! index would replace it.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::config::{GraphConfig, SearchConfig};
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::error::Result;
use crate::intelligence::backfill::backfill_note_embeddings;
use crate::intelligence::similarity::{find_similar, round_score};
use crate::models::{
    Document, MemoryEntity, NodeKind, Note, RelatedType, TimelineEntry, UnifiedEdge, UnifiedGraph,
    UnifiedNode, UnifiedSearchHit,
};

use super::engine::MemoryGraphEngine;

/// Upper bound on timeline entries for one concept.
const TIMELINE_LIMIT: usize = 100;

/// Memories attached to one document when it is expanded.
const DOCUMENT_MEMORY_LIMIT: usize = 50;

pub struct UnifiedGraphEngine {
    db: Arc<dyn DatabaseBackend>,
    embeddings: EmbeddingGateway,
    memory_graph: MemoryGraphEngine,
    search: SearchConfig,
}

struct Neighbour {
    kind: NodeKind,
    id: String,
    label: String,
    strength: Option<f32>,
    /// Edge points away from the node being expanded.
    outgoing: bool,
}

#[derive(Default)]
struct Assembly {
    graph: UnifiedGraph,
    seen: HashSet<String>,
    edge_keys: HashSet<(String, String, String)>,
    queue: VecDeque<(NodeKind, String, u32)>,
}

impl Assembly {
    fn push_node(&mut self, node: UnifiedNode) {
        self.seen.insert(node.id.clone());
        self.queue.push_back((node.kind, node.id.clone(), node.depth));
        self.graph.nodes.push(node);
    }

    fn push_edge(&mut self, from_id: String, to_id: String, label: String, strength: Option<f32>) {
        if self
            .edge_keys
            .insert((from_id.clone(), to_id.clone(), label.clone()))
        {
            self.graph.edges.push(UnifiedEdge {
                from_id,
                to_id,
                label,
                strength,
            });
        }
    }
}

impl UnifiedGraphEngine {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        embeddings: EmbeddingGateway,
        graph: GraphConfig,
        search: SearchConfig,
    ) -> Self {
        Self {
            memory_graph: MemoryGraphEngine::new(Arc::clone(&db), graph),
            db,
            embeddings,
            search,
        }
    }

    pub fn memory_graph(&self) -> &MemoryGraphEngine {
        &self.memory_graph
    }

    /// Breadth-first neighbourhood of a document across all three node kinds.
    /// An unknown document yields an empty graph.
    pub async fn get_document_centric_graph(
        &self,
        owner: &str,
        document_id: &str,
        max_depth: u32,
    ) -> Result<UnifiedGraph> {
        let Some(root) = self.db.get_document(owner, document_id).await? else {
            tracing::debug!(owner, document_id, "Document not found for graph");
            return Ok(UnifiedGraph::default());
        };

        let max_depth = max_depth.min(self.memory_graph.config().max_traversal_depth);
        let mut assembly = Assembly::default();
        assembly.graph.root_id = Some(root.id.clone());
        assembly.push_node(document_node(root, 0));

        while let Some((kind, id, depth)) = assembly.queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for neighbour in self.neighbours(owner, kind, &id).await? {
                if !assembly.seen.contains(&neighbour.id) {
                    match self
                        .load_node(owner, neighbour.kind, &neighbour.id, depth + 1)
                        .await?
                    {
                        Some(node) => assembly.push_node(node),
                        None => continue,
                    }
                }
                let (from, to) = if neighbour.outgoing {
                    (id.clone(), neighbour.id)
                } else {
                    (neighbour.id, id.clone())
                };
                assembly.push_edge(from, to, neighbour.label, neighbour.strength);
            }
        }

        tracing::debug!(
            owner,
            document_id,
            nodes = assembly.graph.nodes.len(),
            edges = assembly.graph.edges.len(),
            "Built document graph"
        );
        Ok(assembly.graph)
    }

    /// Embeds `query` once and ranks documents, memories and notes together.
    pub async fn search_across_graphs(
        &self,
        owner: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<UnifiedSearchHit>> {
        let embedding = self.embeddings.embed(query).await?;
        self.search_with_embedding(owner, &embedding, limit, -1.0).await
    }

    /// Ranking over the bounded recent window of each collection, keeping hits
    /// at or above `threshold`.
    pub async fn search_with_embedding(
        &self,
        owner: &str,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<UnifiedSearchHit>> {
        let window = self.search.scan_window;
        let documents = self.db.list_recent_documents(owner, window).await?;
        let memories = self.db.list_recent_entities(owner, window).await?;
        let mut notes = self.db.list_recent_notes(owner, window).await?;
        backfill_note_embeddings(self.db.as_ref(), &self.embeddings, &mut notes).await;

        let mut hits = Vec::new();
        for hit in find_similar(query, &documents, threshold, |d: &Document| {
            d.embedding.as_deref()
        })? {
            hits.push(UnifiedSearchHit {
                id: hit.item.id.clone(),
                kind: NodeKind::Document,
                text: hit.item.embedding_text(),
                similarity: round_score(hit.similarity),
                created_at: hit.item.created_at,
            });
        }
        for hit in find_similar(query, &memories, threshold, |m: &MemoryEntity| {
            Some(m.embedding.as_slice())
        })? {
            hits.push(UnifiedSearchHit {
                id: hit.item.id.clone(),
                kind: NodeKind::Memory,
                text: hit.item.text.clone(),
                similarity: round_score(hit.similarity),
                created_at: hit.item.created_at,
            });
        }
        for hit in find_similar(query, &notes, threshold, |n: &Note| n.embedding.as_deref())? {
            hits.push(UnifiedSearchHit {
                id: hit.item.id.clone(),
                kind: NodeKind::Note,
                text: hit.item.embedding_text(),
                similarity: round_score(hit.similarity),
                created_at: hit.item.created_at,
            });
        }

        let scanned = documents.len() + memories.len() + notes.len();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);

        tracing::debug!(owner, scanned, hits = hits.len(), "Unified search");
        Ok(hits)
    }

    /// Records related to `concept`, oldest first.
    pub async fn get_timeline(&self, owner: &str, concept: &str) -> Result<Vec<TimelineEntry>> {
        let embedding = self.embeddings.embed(concept).await?;
        let hits = self
            .search_with_embedding(owner, &embedding, TIMELINE_LIMIT, self.search.default_threshold)
            .await?;

        let mut timeline: Vec<TimelineEntry> = hits.into_iter().map(TimelineEntry::from).collect();
        timeline.sort_by_key(|entry| entry.created_at);
        Ok(timeline)
    }

    async fn neighbours(&self, owner: &str, kind: NodeKind, id: &str) -> Result<Vec<Neighbour>> {
        let mut out = Vec::new();
        match kind {
            NodeKind::Document => {
                for link in self.db.list_document_links(owner, id).await? {
                    let outgoing = link.from_document_id == id;
                    let other = if outgoing {
                        link.to_document_id
                    } else {
                        link.from_document_id
                    };
                    out.push(Neighbour {
                        kind: NodeKind::Document,
                        id: other,
                        label: "related".to_string(),
                        strength: link.similarity,
                        outgoing,
                    });
                }
                for note in self.db.list_notes_for_document(owner, id).await? {
                    out.push(Neighbour {
                        kind: NodeKind::Note,
                        id: note.id,
                        label: "contains".to_string(),
                        strength: None,
                        outgoing: true,
                    });
                }
                for rel in self
                    .db
                    .list_note_relationships_to(owner, RelatedType::Document, id)
                    .await?
                {
                    out.push(Neighbour {
                        kind: NodeKind::Note,
                        id: rel.note_id,
                        label: rel.relationship_type.to_string(),
                        strength: rel.similarity_score,
                        outgoing: false,
                    });
                }
                for entity in self
                    .db
                    .list_entities_for_document(owner, id, DOCUMENT_MEMORY_LIMIT)
                    .await?
                {
                    out.push(Neighbour {
                        kind: NodeKind::Memory,
                        id: entity.id,
                        label: "mentions".to_string(),
                        strength: None,
                        outgoing: true,
                    });
                }
            }
            NodeKind::Note => {
                for rel in self.db.list_note_relationships(owner, id).await? {
                    out.push(Neighbour {
                        kind: rel.related_type.into(),
                        id: rel.related_id,
                        label: rel.relationship_type.to_string(),
                        strength: rel.similarity_score,
                        outgoing: true,
                    });
                }
            }
            NodeKind::Memory => {
                let edges = self
                    .db
                    .list_relationships_touching(owner, &[id.to_string()])
                    .await?;
                for rel in edges {
                    let Some(other) = rel.other_end(id) else {
                        continue;
                    };
                    out.push(Neighbour {
                        kind: NodeKind::Memory,
                        id: other.to_string(),
                        label: rel.relationship_type.to_string(),
                        strength: Some(rel.strength),
                        outgoing: rel.from_id == id,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn load_node(
        &self,
        owner: &str,
        kind: NodeKind,
        id: &str,
        depth: u32,
    ) -> Result<Option<UnifiedNode>> {
        Ok(match kind {
            NodeKind::Document => self
                .db
                .get_document(owner, id)
                .await?
                .map(|doc| document_node(doc, depth)),
            NodeKind::Note => self.db.get_note(owner, id).await?.map(|note| UnifiedNode {
                label: note.content.clone(),
                description: note.highlight.clone(),
                id: note.id,
                kind: NodeKind::Note,
                depth,
                created_at: note.created_at,
            }),
            NodeKind::Memory => self
                .db
                .get_entity(owner, id)
                .await?
                .map(|entity| UnifiedNode {
                    label: entity.text.clone(),
                    description: Some(entity.entity_type.to_string()),
                    id: entity.id,
                    kind: NodeKind::Memory,
                    depth,
                    created_at: entity.created_at,
                }),
        })
    }
}

fn document_node(doc: Document, depth: u32) -> UnifiedNode {
    UnifiedNode {
        id: doc.id,
        kind: NodeKind::Document,
        label: doc.title,
        description: doc.description,
        depth,
        created_at: doc.created_at,
    }
}
