//! Delay cascades: trees of actions held up by overdue actions

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

use super::dependency::DependencyGraph;
use super::models::{Assignee, CascadeNode};
use crate::store::Action;

/// Display data looked up while building trees
#[derive(Debug, Clone)]
pub struct CascadeContext {
    pub now: DateTime<Utc>,
    pub chart_titles: HashMap<Uuid, String>,
    /// Keyed by trimmed email
    pub assignees: HashMap<String, Assignee>,
}

impl CascadeContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            chart_titles: HashMap::new(),
            assignees: HashMap::new(),
        }
    }

    fn assignee(&self, action: &Action) -> Option<Assignee> {
        let email = action.assignee_email()?;
        Some(
            self.assignees
                .get(email)
                .cloned()
                .unwrap_or_else(|| Assignee::unresolved(email)),
        )
    }

    fn node(&self, action: &Action, is_root: bool) -> CascadeNode {
        CascadeNode {
            action_id: action.id,
            title: action.title.clone(),
            status: action.status,
            due_date: action.due_date,
            days_overdue: action.days_overdue(self.now),
            assignee: self.assignee(action),
            chart_id: action.chart_id,
            chart_title: self.chart_titles.get(&action.chart_id).cloned(),
            is_root,
            pruned: false,
            children: Vec::new(),
        }
    }
}

/// Overdue actions that no other overdue action holds up.
///
/// Seeds inside the same dependency cycle block each other symmetrically, so
/// they all stay roots.
pub fn cascade_roots(graph: &DependencyGraph, overdue_ids: &[Uuid]) -> Vec<Uuid> {
    let component = graph.component_of();
    let seeds: Vec<Uuid> = overdue_ids.iter().copied().filter(|id| graph.contains(*id)).collect();
    let mut blocked = HashSet::new();
    for seed in &seeds {
        for action in graph.transitively_blocked(*seed) {
            if action.id != *seed && component.get(&action.id) != component.get(seed) {
                blocked.insert(action.id);
            }
        }
    }
    seeds.into_iter().filter(|id| !blocked.contains(id)).collect()
}

/// Build one cascade tree per root and keep those that block something,
/// most disruptive first.
pub fn build_cascades(
    graph: &DependencyGraph,
    overdue_ids: &[Uuid],
    ctx: &CascadeContext,
) -> Vec<CascadeNode> {
    let mut forest: Vec<CascadeNode> = cascade_roots(graph, overdue_ids)
        .into_iter()
        .filter_map(|root| graph.get(root))
        .map(|root| {
            let mut visited = HashSet::new();
            build_tree(graph, root, true, &mut visited, ctx)
        })
        .filter(|tree| !tree.children.is_empty())
        .collect();

    // stable: equal counts keep root order
    forest.sort_by_key(|tree| std::cmp::Reverse(tree.descendant_count()));
    debug!(
        roots = overdue_ids.len(),
        trees = forest.len(),
        "Built delay cascades"
    );
    forest
}

fn build_tree(
    graph: &DependencyGraph,
    action: &Action,
    is_root: bool,
    visited: &mut HashSet<Uuid>,
    ctx: &CascadeContext,
) -> CascadeNode {
    visited.insert(action.id);
    let mut node = ctx.node(action, is_root);
    for blocked in graph.blocked_by(action.id) {
        if visited.contains(&blocked.id) {
            warn!(
                action_id = %blocked.id,
                blocker = %action.id,
                "Action already in this cascade; pruning the edge"
            );
            node.pruned = true;
        } else {
            node.children
                .push(build_tree(graph, blocked, false, visited, ctx));
        }
    }
    node
}
