//! Reverse index of the chart hierarchy.
//!
//! Charts never store their parent chart. The only structural edge is
//! `action.child_chart_id`, so the index is built once per request from every
//! telescoped action and then answers every depth/descendant query of that
//! request without going back to the store.

use crate::store::Action;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;
use uuid::Uuid;

/// Forward and reverse chart edges derived from telescoped actions
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    /// child chart → chart owning the telescoped action
    parent_of: HashMap<Uuid, Uuid>,
    /// chart → child charts, in action order
    children_of: HashMap<Uuid, Vec<Uuid>>,
    max_depth: usize,
}

impl HierarchyIndex {
    /// Build the index from actions (actions without a child chart are skipped)
    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a Action>, max_depth: usize) -> Self {
        let mut index = Self {
            max_depth,
            ..Default::default()
        };
        for action in actions {
            let Some(child) = action.child_chart_id else {
                continue;
            };
            if let Some(previous) = index.parent_of.insert(child, action.chart_id) {
                if previous != action.chart_id {
                    warn!(
                        chart_id = %child,
                        first_parent = %previous,
                        second_parent = %action.chart_id,
                        "Chart is the child of more than one chart; keeping the last"
                    );
                    if let Some(siblings) = index.children_of.get_mut(&previous) {
                        siblings.retain(|c| *c != child);
                    }
                }
            }
            let siblings = index.children_of.entry(action.chart_id).or_default();
            if !siblings.contains(&child) {
                siblings.push(child);
            }
        }
        index
    }

    /// Owning chart of the action that telescoped `chart_id`
    pub fn parent(&self, chart_id: Uuid) -> Option<Uuid> {
        self.parent_of.get(&chart_id).copied()
    }

    /// Direct child charts
    pub fn children(&self, chart_id: Uuid) -> &[Uuid] {
        self.children_of
            .get(&chart_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Distance to the nearest chart without a parent, counting that chart as 1.
    ///
    /// A revisited chart means the reverse index is cyclic; the walk stops and
    /// reports depth 1.
    pub fn depth(&self, chart_id: Uuid) -> usize {
        match self.walk_up(chart_id) {
            Some(depth) => depth,
            None => {
                warn!(chart_id = %chart_id, "Cycle in chart hierarchy; falling back to depth 1");
                1
            }
        }
    }

    /// Whether walking up from `chart_id` revisits a chart
    pub fn has_cycle_above(&self, chart_id: Uuid) -> bool {
        self.walk_up(chart_id).is_none()
    }

    fn walk_up(&self, chart_id: Uuid) -> Option<usize> {
        let mut visited = HashSet::from([chart_id]);
        let mut current = chart_id;
        let mut depth = 1;
        while let Some(parent) = self.parent(current) {
            if !visited.insert(parent) {
                return None;
            }
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    /// Every chart below `chart_id`, breadth first, the chart itself excluded
    pub fn descendants(&self, chart_id: Uuid) -> Vec<Uuid> {
        self.descendants_with_level(chart_id)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Descendants with their distance below `chart_id` (children are at 1)
    pub fn descendants_with_level(&self, chart_id: Uuid) -> Vec<(Uuid, usize)> {
        let mut visited = HashSet::from([chart_id]);
        let mut out = Vec::new();
        let mut queue = VecDeque::from([(chart_id, 0usize)]);
        while let Some((current, level)) = queue.pop_front() {
            let children = self.children(current);
            if children.is_empty() {
                continue;
            }
            if level >= self.max_depth {
                warn!(
                    chart_id = %chart_id,
                    max_depth = self.max_depth,
                    "Descendant walk hit the depth cap; deeper charts ignored"
                );
                continue;
            }
            for &child in children {
                if visited.insert(child) {
                    out.push((child, level + 1));
                    queue.push_back((child, level + 1));
                }
            }
        }
        out
    }

    /// Number of parent links held by the index
    pub fn len(&self) -> usize {
        self.parent_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_of.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telescoped(owner: Uuid, child: Uuid) -> Action {
        let mut action = Action::new(owner, "telescoped");
        action.child_chart_id = Some(child);
        action
    }

    #[test]
    fn test_depth_counts_hops_from_root() {
        let (r, c1, c2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let actions = vec![telescoped(r, c1), telescoped(c1, c2)];
        let index = HierarchyIndex::from_actions(&actions, 50);

        assert_eq!(index.depth(r), 1);
        assert_eq!(index.depth(c1), 2);
        assert_eq!(index.depth(c2), 3);
        assert_eq!(index.depth(Uuid::new_v4()), 1);
    }

    #[test]
    fn test_depth_cycle_falls_back_to_one() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let actions = vec![telescoped(a, b), telescoped(b, a)];
        let index = HierarchyIndex::from_actions(&actions, 50);
        assert_eq!(index.depth(a), 1);
        assert_eq!(index.depth(b), 1);
        assert!(index.has_cycle_above(a));
    }

    #[test]
    fn test_self_loop_terminates() {
        let a = Uuid::new_v4();
        let index = HierarchyIndex::from_actions(&[telescoped(a, a)], 50);
        assert_eq!(index.depth(a), 1);
        assert!(index.descendants(a).is_empty());
    }

    #[test]
    fn test_descendants_breadth_first() {
        let (r, a, b, c) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let actions = vec![telescoped(r, a), telescoped(r, b), telescoped(a, c)];
        let index = HierarchyIndex::from_actions(&actions, 50);

        assert_eq!(index.descendants(r), vec![a, b, c]);
        assert_eq!(
            index.descendants_with_level(r),
            vec![(a, 1), (b, 1), (c, 2)]
        );
        assert_eq!(index.descendants(a), vec![c]);
        assert!(index.descendants(c).is_empty());
    }

    #[test]
    fn test_descendants_respect_depth_cap() {
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let actions: Vec<Action> = ids.windows(2).map(|w| telescoped(w[0], w[1])).collect();
        let index = HierarchyIndex::from_actions(&actions, 3);
        assert_eq!(index.descendants(ids[0]), ids[1..4].to_vec());
    }

    #[test]
    fn test_duplicate_parent_keeps_last() {
        let (p1, p2, child) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let actions = vec![telescoped(p1, child), telescoped(p2, child)];
        let index = HierarchyIndex::from_actions(&actions, 50);
        assert_eq!(index.parent(child), Some(p2));
        assert!(index.children(p1).is_empty());
        assert_eq!(index.children(p2), &[child]);
    }
}
