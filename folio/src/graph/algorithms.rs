//! Pure graph routines over an in-memory edge list. Edges are treated as
//! undirected for reachability; the stored direction is kept for display.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::intelligence::similarity::cosine_similarity;
use crate::models::MemoryRelationship;

/// Neighbour lists keyed by entity id, each entry carrying the edge index.
pub struct Adjacency<'a> {
    neighbours: HashMap<&'a str, Vec<(&'a str, usize)>>,
}

impl<'a> Adjacency<'a> {
    pub fn build(edges: &'a [MemoryRelationship]) -> Self {
        let mut neighbours: HashMap<&'a str, Vec<(&'a str, usize)>> = HashMap::new();
        for (index, edge) in edges.iter().enumerate() {
            neighbours
                .entry(edge.from_id.as_str())
                .or_default()
                .push((edge.to_id.as_str(), index));
            neighbours
                .entry(edge.to_id.as_str())
                .or_default()
                .push((edge.from_id.as_str(), index));
        }
        Self { neighbours }
    }

    pub fn neighbours(&self, id: &str) -> &[(&'a str, usize)] {
        self.neighbours.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Nodes reached from a seed, in visit order, plus the edges walked to reach them.
#[derive(Debug, Default, PartialEq)]
pub struct Traversal {
    pub nodes: Vec<String>,
    pub edges: Vec<usize>,
}

/// Breadth-first expansion up to `depth` hops. Each node is expanded at most once.
pub fn breadth_first(edges: &[MemoryRelationship], seed: &str, depth: u32) -> Traversal {
    let adjacency = Adjacency::build(edges);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut walked: HashSet<usize> = HashSet::new();
    let mut traversal = Traversal::default();

    let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
    visited.insert(seed);
    traversal.nodes.push(seed.to_string());
    queue.push_back((seed, 0));

    while let Some((current, current_depth)) = queue.pop_front() {
        if current_depth >= depth {
            continue;
        }
        for &(next, edge_index) in adjacency.neighbours(current) {
            if walked.insert(edge_index) {
                traversal.edges.push(edge_index);
            }
            if visited.insert(next) {
                traversal.nodes.push(next.to_string());
                queue.push_back((next, current_depth + 1));
            }
        }
    }

    traversal
}

/// Fewest-hops path between two ids. `None` when unreachable.
pub fn shortest_path(edges: &[MemoryRelationship], from: &str, to: &str) -> Option<Traversal> {
    if from == to {
        return Some(Traversal {
            nodes: vec![from.to_string()],
            edges: Vec::new(),
        });
    }

    let adjacency = Adjacency::build(edges);
    let mut parents: HashMap<&str, (&str, usize)> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::from([from]);
    let mut queue: VecDeque<&str> = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        for &(next, edge_index) in adjacency.neighbours(current) {
            if !visited.insert(next) {
                continue;
            }
            parents.insert(next, (current, edge_index));
            if next == to {
                return Some(unwind(&parents, from, to));
            }
            queue.push_back(next);
        }
    }

    None
}

fn unwind(parents: &HashMap<&str, (&str, usize)>, from: &str, to: &str) -> Traversal {
    let mut nodes = vec![to.to_string()];
    let mut edges = Vec::new();
    let mut cursor = to;
    while cursor != from {
        let Some(&(prev, edge_index)) = parents.get(cursor) else {
            break;
        };
        edges.push(edge_index);
        nodes.push(prev.to_string());
        cursor = prev;
    }
    nodes.reverse();
    edges.reverse();
    Traversal { nodes, edges }
}

/// Single-pass greedy clustering in input order. Each unclustered item seeds
/// a cluster and pulls in every later unclustered item whose similarity to
/// the seed reaches `threshold`. Returns index groups; singletons included.
pub fn greedy_clusters<T, F>(items: &[T], threshold: f32, embedding_of: F) -> Result<Vec<Vec<usize>>>
where
    F: Fn(&T) -> &[f32],
{
    let mut assigned = vec![false; items.len()];
    let mut clusters = Vec::new();

    for seed in 0..items.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];
        let seed_embedding = embedding_of(&items[seed]);

        for candidate in (seed + 1)..items.len() {
            if assigned[candidate] {
                continue;
            }
            if cosine_similarity(seed_embedding, embedding_of(&items[candidate]))? >= threshold {
                assigned[candidate] = true;
                members.push(candidate);
            }
        }
        clusters.push(members);
    }

    Ok(clusters)
}
