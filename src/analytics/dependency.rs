//! Dependency graph: the part of the "blocks" graph reachable from a seed set.
//!
//! This module provides:
//! - [`DependencyGraph`]: petgraph wrapper with Uuid ↔ NodeIndex mapping
//! - [`DependencyGraphBuilder`]: frontier-batched loader bounded by steps and nodes

use crate::error::EngineResult;
use crate::store::{Action, ActionFilter, DependencyFilter, RecordStore};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::AnalyticsConfig;

// ============================================================================
// DependencyGraph: petgraph wrapper with ID mapping
// ============================================================================

/// Directed "blocks" graph: an edge `a → b` means `a` must finish before `b`.
///
/// Nodes are canonical actions. Duplicate edges collapse into one; cycles
/// and self-loops are kept as loaded.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    pub graph: DiGraph<Action, ()>,
    /// Mapping from action id to petgraph NodeIndex
    pub id_to_index: HashMap<Uuid, NodeIndex>,
    truncated: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action. Returns the existing index if it is already present.
    pub fn add_action(&mut self, action: Action) -> NodeIndex {
        if let Some(&idx) = self.id_to_index.get(&action.id) {
            return idx;
        }
        let id = action.id;
        let idx = self.graph.add_node(action);
        self.id_to_index.insert(id, idx);
        idx
    }

    /// Add a "blocks" edge between two loaded actions.
    /// Returns false when either endpoint is missing.
    pub fn add_edge(&mut self, blocker: Uuid, blocked: Uuid) -> bool {
        match (self.id_to_index.get(&blocker), self.id_to_index.get(&blocked)) {
            (Some(&from), Some(&to)) => {
                self.graph.update_edge(from, to, ());
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.id_to_index.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Action> {
        let idx = self.id_to_index.get(&id)?;
        self.graph.node_weight(*idx)
    }

    /// Actions directly blocked by `id`, in edge insertion order
    pub fn blocked_by(&self, id: Uuid) -> Vec<&Action> {
        let Some(&idx) = self.id_to_index.get(&id) else {
            return Vec::new();
        };
        // petgraph walks adjacency lists newest first
        let mut out: Vec<&Action> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| &self.graph[n])
            .collect();
        out.reverse();
        out
    }

    /// Every action transitively blocked by `id`, breadth first, `id` excluded
    pub fn transitively_blocked(&self, id: Uuid) -> Vec<&Action> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for action in self.blocked_by(current) {
                if visited.insert(action.id) {
                    out.push(action);
                    queue.push_back(action.id);
                }
            }
        }
        out
    }

    /// All edges as `(blocker, blocked)` pairs
    pub fn edges(&self) -> Vec<(Uuid, Uuid)> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].id, self.graph[b].id))
            .collect()
    }

    /// Strongly connected components that form a cycle (self-loops included)
    pub fn cycles(&self) -> Vec<Vec<Uuid>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| scc.into_iter().map(|n| self.graph[n].id).collect())
            .collect()
    }

    /// Component id per action; actions sharing an id block each other
    pub fn component_of(&self) -> HashMap<Uuid, usize> {
        let mut out = HashMap::with_capacity(self.node_count());
        for (component, scc) in tarjan_scc(&self.graph).into_iter().enumerate() {
            for n in scc {
                out.insert(self.graph[n].id, component);
            }
        }
        out
    }

    /// The loader stopped at a bound before exhausting the reachable graph
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

// ============================================================================
// DependencyGraphBuilder
// ============================================================================

/// Loads the forward-reachable dependency graph one frontier at a time
#[derive(Clone)]
pub struct DependencyGraphBuilder {
    store: Arc<dyn RecordStore>,
    max_steps: usize,
    max_nodes: usize,
}

impl DependencyGraphBuilder {
    pub fn new(store: Arc<dyn RecordStore>, config: &AnalyticsConfig) -> Self {
        Self {
            store,
            max_steps: config.max_graph_steps,
            max_nodes: config.max_graph_nodes,
        }
    }

    /// Fetch the seed actions, then expand from them.
    ///
    /// Seeds that do not exist are ignored.
    pub async fn load_reachable(&self, seed_ids: &[Uuid]) -> EngineResult<DependencyGraph> {
        if seed_ids.is_empty() {
            return Ok(DependencyGraph::new());
        }
        let seeds = self
            .store
            .find_actions(&ActionFilter::by_ids(seed_ids.to_vec()))
            .await?;
        self.expand(seeds).await
    }

    /// Expand from seed actions already in hand.
    ///
    /// Each step issues one edge query for the whole frontier and one action
    /// query for every blocked id not seen yet. Edges to actions that no
    /// longer exist are dropped.
    pub async fn expand(&self, seeds: Vec<Action>) -> EngineResult<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        let mut frontier = Vec::new();
        for seed in seeds {
            if graph.node_count() >= self.max_nodes {
                warn!(max_nodes = self.max_nodes, "Too many seed actions; graph truncated");
                graph.truncated = true;
                break;
            }
            if !graph.contains(seed.id) {
                frontier.push(seed.id);
                graph.add_action(seed);
            }
        }

        let mut steps = 0;
        while !frontier.is_empty() {
            if steps >= self.max_steps {
                warn!(
                    max_steps = self.max_steps,
                    pending = frontier.len(),
                    "Dependency walk hit the step bound; graph truncated"
                );
                graph.truncated = true;
                break;
            }
            steps += 1;

            let edges = self
                .store
                .find_dependencies(&DependencyFilter::blocked_by(frontier))
                .await?;

            let mut seen = HashSet::new();
            let mut unknown: Vec<Uuid> = edges
                .iter()
                .map(|e| e.blocked_action_id)
                .filter(|id| !graph.contains(*id) && seen.insert(*id))
                .collect();
            let room = self.max_nodes.saturating_sub(graph.node_count());
            if unknown.len() > room {
                warn!(
                    max_nodes = self.max_nodes,
                    dropped = unknown.len() - room,
                    "Dependency walk hit the node bound; graph truncated"
                );
                graph.truncated = true;
                unknown.truncate(room);
            }

            frontier = Vec::new();
            if !unknown.is_empty() {
                for action in self
                    .store
                    .find_actions(&ActionFilter::by_ids(unknown))
                    .await?
                {
                    frontier.push(action.id);
                    graph.add_action(action);
                }
            }
            for edge in &edges {
                graph.add_edge(edge.blocker_action_id, edge.blocked_action_id);
            }
        }

        let cycles = graph.cycles();
        if !cycles.is_empty() {
            warn!(cycles = cycles.len(), "Dependency graph contains cycles");
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            steps,
            truncated = graph.truncated,
            "Loaded reachable dependency graph"
        );
        Ok(graph)
    }
}
