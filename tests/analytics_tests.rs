//! Dashboard analytics integration tests
//!
//! Seed a `MemoryStore` (directly or through a JSON snapshot on disk) and
//! drive `DashboardEngine` through `AppState`, the way the CLI does.
//! Run with: cargo test --test analytics_tests

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tension_orchestrator::analytics::{DashboardFilter, RecommendationKind};
use tension_orchestrator::store::{
    Action, ActionDependency, ActionRecord, ActionStatus, Chart, MemoryStore, Profile, Snapshot,
};
use tension_orchestrator::{AppState, Config};
use uuid::Uuid;

fn due(chart_id: Uuid, title: &str, offset_days: i64, now: DateTime<Utc>) -> Action {
    let mut action = Action::new(chart_id, title);
    action.due_date = Some(now + Duration::days(offset_days));
    action
}

async fn state_with(store: MemoryStore) -> AppState {
    AppState::new(Arc::new(store), Config::default())
}

// ============================================================================
// Delay cascades
// ============================================================================

#[tokio::test]
async fn test_simple_chain_scenario() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Release");
    let a = due(chart.id, "A", -3, now);
    let b = due(chart.id, "B", 2, now);
    let c = Action::new(chart.id, "C");

    let store = MemoryStore::new()
        .with_chart(chart.clone())
        .await
        .with_action(a.clone())
        .await
        .with_action(b.clone())
        .await
        .with_action(c.clone())
        .await
        .with_dependency(a.id, b.id)
        .await
        .with_dependency(b.id, c.id)
        .await;
    let state = state_with(store).await;
    let filter = DashboardFilter::workspace(workspace_id);

    let forest = state.dashboard().cascade_forest(&filter, now).await.unwrap();
    assert_eq!(forest.len(), 1);
    let root = &forest[0];
    assert_eq!(root.action_id, a.id);
    assert_eq!(root.days_overdue, Some(3));
    assert_eq!(root.chart_title.as_deref(), Some("Release"));
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].action_id, b.id);
    assert_eq!(root.children[0].children[0].action_id, c.id);
    assert_eq!(root.descendant_count(), 2);

    let insights = state.dashboard().insights(&filter, now).await.unwrap();
    assert_eq!(insights.delay_impacts.len(), 1);
    assert_eq!(insights.delay_impacts[0].blocked_actions.len(), 2);
    assert!(insights.dependency_cycles.is_empty());
    assert!(!insights.graph_truncated);

    let kinds: Vec<RecommendationKind> = insights.recommendations.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecommendationKind::CriticalBlocker,
            RecommendationKind::DeadlineApproaching
        ]
    );
    assert_eq!(insights.recommendations[0].detail, "3 days overdue, blocking 2 actions");
    assert_eq!(insights.recommendations[1].detail, "Due in 2 days");
}

#[tokio::test]
async fn test_mutual_block_scenario_terminates() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Loop");
    let x = due(chart.id, "X", -1, now);
    let y = Action::new(chart.id, "Y");

    let store = MemoryStore::new()
        .with_chart(chart)
        .await
        .with_action(x.clone())
        .await
        .with_action(y.clone())
        .await
        .with_dependency(x.id, y.id)
        .await
        .with_dependency(y.id, x.id)
        .await;
    let state = state_with(store).await;
    let filter = DashboardFilter::workspace(workspace_id);

    let insights = state.dashboard().insights(&filter, now).await.unwrap();
    assert_eq!(insights.cascades.len(), 1);
    let tree = &insights.cascades[0];
    assert_eq!(tree.action_id, x.id);
    let y_node = &tree.children[0];
    assert_eq!(y_node.action_id, y.id);
    // the edge back to X is cut, so Y ends the tree
    assert!(y_node.children.is_empty());
    assert!(y_node.pruned);
    assert_eq!(tree.descendant_count(), 1);
    assert_eq!(insights.dependency_cycles.len(), 1);
}

#[tokio::test]
async fn test_overdue_leaf_is_not_a_cascade() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Solo");
    let late = due(chart.id, "Late", -5, now);
    let store = MemoryStore::new()
        .with_chart(chart)
        .await
        .with_action(late.clone())
        .await;
    let state = state_with(store).await;
    let filter = DashboardFilter::workspace(workspace_id);

    assert!(state.dashboard().cascade_forest(&filter, now).await.unwrap().is_empty());
    let overdue = state.dashboard().overdue_actions(&filter, now).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].days_overdue, 5);
}

#[tokio::test]
async fn test_graph_bounds_from_config() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Long chain");
    let mut store = MemoryStore::new().with_chart(chart.clone()).await;
    let first = due(chart.id, "step 0", -2, now);
    let mut prev = first.id;
    store = store.with_action(first).await;
    for i in 1..20 {
        let next = Action::new(chart.id, format!("step {}", i));
        let id = next.id;
        store = store.with_action(next).await.with_dependency(prev, id).await;
        prev = id;
    }

    let mut config = Config::default();
    config.analytics.max_graph_nodes = 5;
    let state = AppState::new(Arc::new(store), config);
    let insights = state
        .dashboard()
        .insights(&DashboardFilter::workspace(workspace_id), now)
        .await
        .unwrap();
    assert!(insights.graph_truncated);
    assert!(insights.cascades[0].descendant_count() < 5);
}

// ============================================================================
// Aggregation over a snapshot
// ============================================================================

fn raw(chart_id: Uuid, title: &str, status: Option<&str>, is_completed: Option<bool>) -> ActionRecord {
    let mut record = Action::new(chart_id, title).to_record();
    record.status = status.map(str::to_string);
    record.is_completed = is_completed;
    record
}

#[tokio::test]
async fn test_snapshot_status_normalization_and_rollups() {
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Legacy data");
    let mut owned = raw(chart.id, "owned", Some("in_progress"), None);
    owned.assigned_to = Some(" ana@example.com ".into());

    let snapshot = Snapshot {
        charts: vec![chart.clone()],
        actions: vec![
            raw(chart.id, "legacy done", None, Some(true)),
            raw(chart.id, "legacy open", None, Some(false)),
            raw(chart.id, "no flags", None, None),
            raw(chart.id, "garbage", Some("blocked-ish"), Some(true)),
            owned,
        ],
        profiles: vec![Profile::new("ana@example.com", "Ana")],
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let state = AppState::from_snapshot(&path, Config::default()).unwrap();
    let filter = DashboardFilter::workspace(workspace_id);

    let counts = state.dashboard().status_distribution(&filter).await.unwrap();
    assert_eq!(counts.total, 5);
    assert_eq!(counts.done, 1);
    assert_eq!(counts.not_started, 3);
    assert_eq!(counts.in_progress, 1);

    let rollups = state.dashboard().chart_rollups(&filter).await.unwrap();
    assert_eq!(rollups.len(), 1);
    assert_eq!(rollups[0].title, "Legacy data");
    assert_eq!(rollups[0].assignees.len(), 1);
    assert_eq!(rollups[0].assignees[0].display_name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_missing_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppState::from_snapshot(&dir.path().join("absent.json"), Config::default());
    assert!(result.is_err());
}

// ============================================================================
// Scoping and stats
// ============================================================================

#[tokio::test]
async fn test_chart_scope_follows_telescoped_children() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let root = Chart::new(workspace_id, "Root");
    let other = Chart::new(workspace_id, "Other");
    let mut step = Action::new(root.id, "Plan");
    let child = Chart::new_child(workspace_id, "Plan detail", step.id);
    step.child_chart_id = Some(child.id);
    let late_in_child = due(child.id, "late in child", -1, now);
    let late_elsewhere = due(other.id, "late elsewhere", -1, now);

    let store = MemoryStore::new()
        .with_chart(root.clone())
        .await
        .with_chart(other)
        .await
        .with_chart(child)
        .await
        .with_action(step)
        .await
        .with_action(late_in_child.clone())
        .await
        .with_action(late_elsewhere)
        .await;
    let state = state_with(store).await;

    let scoped = DashboardFilter::workspace(workspace_id).with_chart(root.id);
    let overdue = state.dashboard().overdue_actions(&scoped, now).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].action.action_id, late_in_child.id);
    assert_eq!(overdue[0].chart_title.as_deref(), Some("Plan detail"));

    let stats = state
        .dashboard()
        .stats(&DashboardFilter::workspace(workspace_id), now)
        .await
        .unwrap();
    assert_eq!(stats.active_charts, 3);
    assert_eq!(stats.overdue_actions, 2);
    assert_eq!(stats.counts.total, 3);
}

#[tokio::test]
async fn test_archiving_hides_actions_from_dashboard() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Shelved");
    let mut done = due(chart.id, "finished", -2, now);
    done.status = ActionStatus::Done;
    let late = due(chart.id, "late", -2, now);

    let store = MemoryStore::new()
        .with_chart(chart.clone())
        .await
        .with_action(done)
        .await
        .with_action(late)
        .await;
    let state = state_with(store).await;
    let filter = DashboardFilter::workspace(workspace_id);

    let before = state.dashboard().stats(&filter, now).await.unwrap();
    assert_eq!(before.overdue_actions, 1);
    assert!((before.completion_rate - 0.5).abs() < f64::EPSILON);

    state.mutator().archive(chart.id).await.unwrap();
    let after = state.dashboard().stats(&filter, now).await.unwrap();
    assert_eq!(after.active_charts, 0);
    assert_eq!(after.archived_charts, 1);
    assert_eq!(after.overdue_actions, 0);
    assert_eq!(after.counts.total, 0);
}

#[tokio::test]
async fn test_dependency_edges_round_trip_through_snapshot() {
    let now = Utc::now();
    let workspace_id = Uuid::new_v4();
    let chart = Chart::new(workspace_id, "Edges");
    let blocker = due(chart.id, "blocker", -1, now);
    let blocked = Action::new(chart.id, "blocked");

    let snapshot = Snapshot {
        charts: vec![chart],
        actions: vec![blocker.to_record(), blocked.to_record()],
        dependencies: vec![ActionDependency::new(blocker.id, blocked.id)],
        ..Default::default()
    };
    let store = MemoryStore::from_snapshot(snapshot);
    let state = state_with(store).await;

    let impacts = state
        .dashboard()
        .delay_impacts(&DashboardFilter::workspace(workspace_id), now)
        .await
        .unwrap();
    assert_eq!(impacts.len(), 1);
    assert_eq!(impacts[0].blocked_actions[0].action_id, blocked.id);
}
