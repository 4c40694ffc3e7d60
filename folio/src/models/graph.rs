use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::text_enum;
use super::{MemoryEntity, MemoryRelationship, RelatedType};

/// Nodes and edges reached by a memory-graph traversal.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryGraph {
    pub nodes: Vec<MemoryEntity>,
    pub edges: Vec<MemoryRelationship>,
}

impl MemoryGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Shortest path between two entities; empty when unreachable.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPath {
    pub nodes: Vec<MemoryEntity>,
    pub edges: Vec<MemoryRelationship>,
}

impl MemoryPath {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCluster {
    pub seed_id: String,
    pub members: Vec<MemoryEntity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralMemory {
    pub entity: MemoryEntity,
    pub degree: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Note,
    Memory,
}

text_enum!(NodeKind {
    Document => "document",
    Note => "note",
    Memory => "memory",
});

impl From<RelatedType> for NodeKind {
    fn from(related: RelatedType) -> Self {
        match related {
            RelatedType::Document => NodeKind::Document,
            RelatedType::Note => NodeKind::Note,
            RelatedType::Memory => NodeKind::Memory,
        }
    }
}

/// A node of the heterogeneous document/note/memory graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hops from the root document.
    pub depth: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEdge {
    pub from_id: String,
    pub to_id: String,
    /// Relationship label, e.g. `supports`, `references`, `contains`.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedGraph {
    pub root_id: Option<String>,
    pub nodes: Vec<UnifiedNode>,
    pub edges: Vec<UnifiedEdge>,
}

impl UnifiedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&UnifiedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One result of a search spanning documents, notes and memories.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedSearchHit {
    pub id: String,
    pub kind: NodeKind,
    pub text: String,
    pub similarity: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub kind: NodeKind,
    pub text: String,
    pub similarity: f32,
    pub created_at: DateTime<Utc>,
}

impl From<UnifiedSearchHit> for TimelineEntry {
    fn from(hit: UnifiedSearchHit) -> Self {
        Self {
            id: hit.id,
            kind: hit.kind,
            text: hit.text,
            similarity: hit.similarity,
            created_at: hit.created_at,
        }
    }
}
