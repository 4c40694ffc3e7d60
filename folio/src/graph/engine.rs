use std::sync::Arc;

use crate::config::GraphConfig;
use crate::db::DatabaseBackend;
use crate::error::{FolioError, Result};
use crate::models::{
    CentralMemory, MemoryCluster, MemoryEntity, MemoryGraph, MemoryPath, MemoryRelationship,
};

use super::algorithms::{breadth_first, greedy_clusters, shortest_path, Traversal};

/// Traversal, path finding, clustering and centrality over one owner's
/// memory entities.
pub struct MemoryGraphEngine {
    db: Arc<dyn DatabaseBackend>,
    config: GraphConfig,
}

impl MemoryGraphEngine {
    pub fn new(db: Arc<dyn DatabaseBackend>, config: GraphConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Entities within `depth` hops of `seed_id` and the edges walked to reach
    /// them. An unknown seed yields an empty graph.
    pub async fn get_related_memories(
        &self,
        owner: &str,
        seed_id: &str,
        depth: u32,
    ) -> Result<MemoryGraph> {
        let Some(seed) = self.db.get_entity(owner, seed_id).await? else {
            tracing::debug!(owner, seed_id, "Seed memory not found");
            return Ok(MemoryGraph::default());
        };

        let depth = depth.min(self.config.max_traversal_depth);
        if depth == 0 {
            return Ok(MemoryGraph {
                nodes: vec![seed],
                edges: Vec::new(),
            });
        }

        let edges = self.load_edges(owner).await?;
        let traversal = breadth_first(&edges, seed_id, depth);
        self.materialize(owner, traversal, edges)
            .await
            .map(|(nodes, edges)| MemoryGraph { nodes, edges })
    }

    /// Fewest-hop path between two entities, ignoring edge strength.
    pub async fn find_path(&self, owner: &str, from_id: &str, to_id: &str) -> Result<MemoryPath> {
        let endpoints = self
            .db
            .get_entities_by_ids(owner, &[from_id.to_string(), to_id.to_string()])
            .await?;
        let expected = if from_id == to_id { 1 } else { 2 };
        if endpoints.len() < expected {
            return Ok(MemoryPath::default());
        }

        let edges = if from_id == to_id {
            Vec::new()
        } else {
            self.load_edges(owner).await?
        };

        match shortest_path(&edges, from_id, to_id) {
            Some(traversal) => {
                let (nodes, edges) = self.materialize(owner, traversal, edges).await?;
                Ok(MemoryPath { nodes, edges })
            }
            None => Ok(MemoryPath::default()),
        }
    }

    /// Greedy single-pass clusters over the most recent window of entities.
    pub async fn cluster_by_similarity(
        &self,
        owner: &str,
        threshold: f32,
    ) -> Result<Vec<MemoryCluster>> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FolioError::Validation(format!(
                "Cluster threshold must be within [0, 1], got {threshold}"
            )));
        }

        let cap = self.config.cluster_entity_cap;
        let total = self.db.count_entities(owner).await?;
        if total as usize > cap {
            tracing::warn!(
                owner,
                total,
                cap,
                "Entity population exceeds clustering cap; clustering most recent window"
            );
        }

        let entities = self.db.list_recent_entities(owner, cap).await?;
        let groups = greedy_clusters(&entities, threshold, |e| e.embedding.as_slice())?;

        let mut slots: Vec<_> = entities.into_iter().map(Some).collect();
        let clusters = groups
            .into_iter()
            .map(|group| {
                let members: Vec<_> = group.iter().filter_map(|&i| slots[i].take()).collect();
                MemoryCluster {
                    seed_id: members.first().map(|m| m.id.clone()).unwrap_or_default(),
                    members,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(owner, threshold, clusters = clusters.len(), "Clustered memories");
        Ok(clusters)
    }

    /// Entities with the most incident edges.
    pub async fn get_central_memories(&self, owner: &str, limit: usize) -> Result<Vec<CentralMemory>> {
        let entities = self.db.list_entities_by_degree(owner, limit).await?;
        Ok(entities
            .into_iter()
            .map(|entity| CentralMemory {
                degree: entity.degree,
                entity,
            })
            .collect())
    }

    async fn load_edges(&self, owner: &str) -> Result<Vec<MemoryRelationship>> {
        let cap = self.config.max_graph_edges;
        let edges = self.db.list_relationships(owner, cap).await?;
        if edges.len() >= cap {
            tracing::warn!(owner, cap, "Relationship population reached the traversal cap");
        }
        Ok(edges)
    }

    async fn materialize(
        &self,
        owner: &str,
        traversal: Traversal,
        edges: Vec<MemoryRelationship>,
    ) -> Result<(Vec<MemoryEntity>, Vec<MemoryRelationship>)> {
        let nodes = self.db.get_entities_by_ids(owner, &traversal.nodes).await?;
        let mut slots: Vec<_> = edges.into_iter().map(Some).collect();
        let walked = traversal
            .edges
            .iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect();
        Ok((nodes, walked))
    }
}
