//! Hierarchy integration tests
//!
//! Exercise the resolver and the cascading mutations through the public API
//! against generated telescoping trees held in a `MemoryStore`.
//! Run with: cargo test --test hierarchy_tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tension_orchestrator::error::EngineError;
use tension_orchestrator::hierarchy::{
    DeletePolicy, HierarchyConfig, HierarchyMutator, HierarchyResolver, Inconsistency,
};
use tension_orchestrator::store::{Action, ActionRecord, Chart, MemoryStore, RecordStore};
use uuid::Uuid;

/// A generated telescoping tree
struct Tree {
    store: Arc<MemoryStore>,
    workspace_id: Uuid,
    root: Uuid,
    /// Charts by level, root at level 1
    levels: Vec<Vec<Uuid>>,
    /// action id -> child chart id, as seeded
    links: HashMap<Uuid, Uuid>,
    /// chart id -> chart owning its parent action
    parent_chart: HashMap<Uuid, Uuid>,
}

impl Tree {
    fn dyn_store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    fn resolver(&self) -> HierarchyResolver {
        HierarchyResolver::new(self.dyn_store(), HierarchyConfig::default())
    }

    fn mutator(&self, delete_policy: DeletePolicy) -> HierarchyMutator {
        let config = HierarchyConfig {
            delete_policy,
            ..Default::default()
        };
        HierarchyMutator::new(self.dyn_store(), config)
    }

    fn all_charts(&self) -> Vec<Uuid> {
        self.levels.iter().flatten().copied().collect()
    }
}

/// Build a tree `depth` levels deep where every non-leaf chart carries
/// `branching` telescoped actions plus one plain action.
async fn generate_tree(depth: usize, branching: usize) -> Tree {
    let workspace_id = Uuid::new_v4();
    let root = Chart::new(workspace_id, "Root");
    let mut charts = vec![root.clone()];
    let mut actions = Vec::new();
    let mut levels = vec![vec![root.id]];
    let mut links = HashMap::new();
    let mut parent_chart = HashMap::new();

    for level in 1..depth {
        let mut next = Vec::new();
        for &chart_id in &levels[level - 1] {
            actions.push(Action::new(chart_id, "Plain step"));
            for b in 0..branching {
                let mut action = Action::new(chart_id, format!("Step {}.{}", level, b));
                let child = Chart::new_child(workspace_id, format!("Layer {}", level + 1), action.id);
                action.child_chart_id = Some(child.id);
                links.insert(action.id, child.id);
                parent_chart.insert(child.id, chart_id);
                next.push(child.id);
                charts.push(child);
                actions.push(action);
            }
        }
        levels.push(next);
    }

    let mut store = MemoryStore::new();
    for chart in charts {
        store = store.with_chart(chart).await;
    }
    for action in actions {
        store = store.with_action(action).await;
    }

    Tree {
        store: Arc::new(store),
        workspace_id,
        root: root.id,
        levels,
        links,
        parent_chart,
    }
}

async fn child_links(tree: &Tree) -> HashMap<Uuid, Option<Uuid>> {
    let mut out = HashMap::new();
    for action_id in tree.links.keys() {
        let record = tree.store.action_record(*action_id).await.unwrap();
        out.insert(*action_id, record.child_chart_id);
    }
    out
}

// ============================================================================
// Depth and descendants
// ============================================================================

#[tokio::test]
async fn test_telescoping_depth_scenario() {
    let tree = generate_tree(3, 1).await;
    let resolver = tree.resolver();
    let (c1, c2) = (tree.levels[1][0], tree.levels[2][0]);

    assert_eq!(resolver.depth(tree.root).await.unwrap(), 1);
    assert_eq!(resolver.depth(c1).await.unwrap(), 2);
    assert_eq!(resolver.depth(c2).await.unwrap(), 3);

    let descendants: HashSet<Uuid> = resolver.descendants(tree.root).await.unwrap().into_iter().collect();
    assert_eq!(descendants, HashSet::from([c1, c2]));
}

#[tokio::test]
async fn test_depth_is_parent_depth_plus_one() {
    for depth in 1..=5 {
        for branching in 1..=2 {
            let tree = generate_tree(depth, branching).await;
            let resolver = tree.resolver();
            for (child, parent) in &tree.parent_chart {
                let child_depth = resolver.depth(*child).await.unwrap();
                let parent_depth = resolver.depth(*parent).await.unwrap();
                assert_eq!(child_depth, parent_depth + 1, "depth {} branching {}", depth, branching);
            }
            for (level, charts) in tree.levels.iter().enumerate() {
                for chart in charts {
                    assert_eq!(resolver.depth(*chart).await.unwrap(), level + 1);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_descendants_cover_the_whole_tree() {
    let tree = generate_tree(4, 2).await;
    let descendants = tree.resolver().descendants(tree.root).await.unwrap();
    assert_eq!(descendants.len(), tree.all_charts().len() - 1);
    // breadth first: every second-level chart precedes every third-level one
    let pos = |id: &Uuid| descendants.iter().position(|d| d == id).unwrap();
    let last_second = tree.levels[1].iter().map(pos).max().unwrap();
    let first_third = tree.levels[2].iter().map(pos).min().unwrap();
    assert!(last_second < first_third);
}

#[tokio::test]
async fn test_reverse_index_cycle_terminates() {
    let workspace_id = Uuid::new_v4();
    let x = Chart::new(workspace_id, "X");
    let y = Chart::new(workspace_id, "Y");
    let mut into_y = Action::new(x.id, "into Y");
    into_y.child_chart_id = Some(y.id);
    let mut into_x = Action::new(y.id, "into X");
    into_x.child_chart_id = Some(x.id);
    let mut self_loop = Chart::new(workspace_id, "Self");
    let mut into_self = Action::new(self_loop.id, "into self");
    into_self.child_chart_id = Some(self_loop.id);
    self_loop.parent_action_id = Some(into_self.id);

    let store = MemoryStore::new()
        .with_chart(x.clone())
        .await
        .with_chart(y.clone())
        .await
        .with_chart(self_loop.clone())
        .await
        .with_action(into_y)
        .await
        .with_action(into_x)
        .await
        .with_action(into_self)
        .await;
    let resolver = HierarchyResolver::new(Arc::new(store), HierarchyConfig::default());

    assert_eq!(resolver.depth(x.id).await.unwrap(), 1);
    assert_eq!(resolver.depth(self_loop.id).await.unwrap(), 1);
    assert_eq!(resolver.descendants(x.id).await.unwrap(), vec![y.id]);
    assert!(resolver.descendants(self_loop.id).await.unwrap().is_empty());

    let report = resolver.check_consistency(workspace_id).await.unwrap();
    assert!(report
        .issues
        .contains(&Inconsistency::ReverseIndexCycle { chart_id: x.id }));

    // every chart in the loops is its own layer-less group, listed once
    let groups = resolver.project_groups(workspace_id).await.unwrap();
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.layers.is_empty()));
    let masters: HashSet<Uuid> = groups.iter().map(|g| g.master.id).collect();
    assert_eq!(masters, HashSet::from([x.id, y.id, self_loop.id]));
}

#[tokio::test]
async fn test_project_groups_layers() {
    let tree = generate_tree(3, 2).await;
    let groups = tree.resolver().project_groups(tree.workspace_id).await.unwrap();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.master.id, tree.root);
    assert_eq!(group.chart_count(), 7);
    let sizes: Vec<usize> = group.layers.iter().map(|l| l.charts.len()).collect();
    assert_eq!(sizes, vec![2, 4]);
}

// ============================================================================
// Archive / restore
// ============================================================================

#[tokio::test]
async fn test_archive_restore_round_trip_from_root() {
    for depth in 1..=5 {
        for branching in 1..=2 {
            let tree = generate_tree(depth, branching).await;
            let mutator = tree.mutator(DeletePolicy::Orphan);
            let before = child_links(&tree).await;

            let archived = mutator.archive(tree.root).await.unwrap();
            assert_eq!(archived.affected_charts.len(), tree.all_charts().len());
            for chart in tree.all_charts() {
                assert!(tree.store.get_chart(chart).await.unwrap().unwrap().is_archived());
            }
            assert!(child_links(&tree).await.values().all(Option::is_none));

            mutator.restore(tree.root).await.unwrap();
            for chart in tree.all_charts() {
                let chart = tree.store.get_chart(chart).await.unwrap().unwrap();
                assert!(chart.archived_at.is_none(), "depth {} branching {}", depth, branching);
            }
            assert_eq!(child_links(&tree).await, before);
        }
    }
}

#[tokio::test]
async fn test_archive_restore_round_trip_mid_tree() {
    let tree = generate_tree(5, 2).await;
    let mutator = tree.mutator(DeletePolicy::Orphan);
    let before = child_links(&tree).await;
    let target = tree.levels[2][1];

    let archived = mutator.archive(target).await.unwrap();
    // target, 2 children, 4 grandchildren
    assert_eq!(archived.affected_charts.len(), 7);
    // the rest of the tree is untouched
    assert!(tree
        .store
        .get_chart(tree.levels[2][0])
        .await
        .unwrap()
        .unwrap()
        .archived_at
        .is_none());
    assert!(!tree.resolver().descendants(tree.root).await.unwrap().contains(&target));

    let restored = mutator.restore(target).await.unwrap();
    assert_eq!(restored.affected_charts.len(), 7);
    assert_eq!(child_links(&tree).await, before);
    assert_eq!(tree.resolver().depth(target).await.unwrap(), 3);
}

// ============================================================================
// Delete
// ============================================================================

async fn assert_no_references(tree: &Tree, deleted: &[Uuid]) {
    let snapshot = tree.store.snapshot().await;
    for record in snapshot.actions {
        for id in deleted {
            assert_ne!(record.child_chart_id, Some(*id), "action {}", record.title);
            assert_ne!(record.sub_chart_id, Some(*id), "action {}", record.title);
        }
    }
}

#[tokio::test]
async fn test_delete_orphan_severs_all_references() {
    let tree = generate_tree(4, 1).await;
    let target = tree.levels[1][0];
    let below: Vec<Uuid> = tree.levels[2..].iter().flatten().copied().collect();

    let outcome = tree.mutator(DeletePolicy::Orphan).delete(target).await.unwrap();
    assert_eq!(outcome.deleted_charts, vec![target]);
    assert!(tree.store.get_chart(target).await.unwrap().is_none());
    assert_no_references(&tree, &tree.all_charts()[1..]).await;

    // surviving descendants are detached roots reachable by id
    for chart in below {
        let chart = tree.store.get_chart(chart).await.unwrap().unwrap();
        assert!(chart.parent_action_id.is_none());
    }
}

#[tokio::test]
async fn test_delete_cascade_removes_subtree() {
    let tree = generate_tree(4, 2).await;
    let target = tree.levels[1][0];

    let outcome = tree.mutator(DeletePolicy::Cascade).delete(target).await.unwrap();
    // target + 2 children + 4 grandchildren
    assert_eq!(outcome.deleted_charts.len(), 7);
    for chart in &outcome.deleted_charts {
        assert!(tree.store.get_chart(*chart).await.unwrap().is_none());
    }
    assert_no_references(&tree, &outcome.deleted_charts).await;
    // sibling subtree survives with its links
    let sibling = tree.levels[1][1];
    assert_eq!(tree.resolver().descendants(sibling).await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_delete_clears_legacy_sub_chart_pointer() {
    let workspace_id = Uuid::new_v4();
    let parent = Chart::new(workspace_id, "Parent");
    let mut legacy = Action::new(parent.id, "legacy link").to_record();
    let child = Chart::new_child(workspace_id, "Child", legacy.id);
    legacy.sub_chart_id = Some(child.id);
    legacy.has_child_chart = true;

    let store = Arc::new(
        MemoryStore::new()
            .with_chart(parent.clone())
            .await
            .with_chart(child.clone())
            .await,
    );
    store.insert_action(&legacy).await.unwrap();

    let mutator = HierarchyMutator::new(store.clone(), HierarchyConfig::default());
    assert_eq!(mutator.resolver().depth(child.id).await.unwrap(), 2);
    mutator.delete(child.id).await.unwrap();

    let record: ActionRecord = store.action_record(legacy.id).await.unwrap();
    assert!(record.child_chart_id.is_none());
    assert!(record.sub_chart_id.is_none());
    assert!(!record.has_child_chart);
}

#[tokio::test]
async fn test_delete_keeps_current_link_over_stale_legacy_pointer() {
    let workspace_id = Uuid::new_v4();
    let parent = Chart::new(workspace_id, "Parent");
    let mut action = Action::new(parent.id, "re-telescoped").to_record();
    let live = Chart::new_child(workspace_id, "Live", action.id);
    let stale = Chart::new_child(workspace_id, "Stale", action.id);
    action.child_chart_id = Some(live.id);
    action.sub_chart_id = Some(stale.id);
    action.has_child_chart = true;

    let store = Arc::new(
        MemoryStore::new()
            .with_chart(parent)
            .await
            .with_chart(live.clone())
            .await
            .with_chart(stale.clone())
            .await,
    );
    store.insert_action(&action).await.unwrap();

    let mutator = HierarchyMutator::new(store.clone(), HierarchyConfig::default());
    mutator.delete(stale.id).await.unwrap();

    let record = store.action_record(action.id).await.unwrap();
    assert!(record.sub_chart_id.is_none());
    assert_eq!(record.child_chart_id, Some(live.id));
    // no stored pointer names the deleted chart
    let snapshot = store.snapshot().await;
    assert!(snapshot
        .actions
        .iter()
        .all(|a| a.child_chart_id != Some(stale.id) && a.sub_chart_id != Some(stale.id)));
    assert_eq!(mutator.resolver().depth(live.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_unknown_chart_is_reported() {
    let tree = generate_tree(2, 1).await;
    let mutator = tree.mutator(DeletePolicy::Orphan);
    let missing = Uuid::new_v4();
    assert!(matches!(
        mutator.archive(missing).await,
        Err(EngineError::ChartNotFound(id)) if id == missing
    ));
    assert!(mutator.delete(missing).await.unwrap_err().is_not_found());
}

// ============================================================================
// Telescope
// ============================================================================

#[tokio::test]
async fn test_telescope_then_resolve() {
    let tree = generate_tree(2, 1).await;
    let mutator = tree.mutator(DeletePolicy::Orphan);
    let leaf = tree.levels[1][0];
    let step = Action::new(leaf, "Ship it");
    tree.store.insert_action(&step.to_record()).await.unwrap();

    let child = mutator.telescope(step.id, "Shipping plan").await.unwrap();
    assert_eq!(child.workspace_id, tree.workspace_id);
    assert_eq!(child.parent_action_id, Some(step.id));
    assert_eq!(mutator.resolver().depth(child.id).await.unwrap(), 3);

    let again = mutator.telescope(step.id, "Duplicate").await;
    assert!(matches!(
        again,
        Err(EngineError::AlreadyTelescoped { action_id, chart_id })
            if action_id == step.id && chart_id == child.id
    ));

    let report = mutator.resolver().check_consistency(tree.workspace_id).await.unwrap();
    assert!(report.is_consistent(), "{:?}", report.issues);
}
