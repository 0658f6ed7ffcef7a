//! Test helper factories and seeded store builders
//!
//! Provides convenience functions for creating charts and actions with
//! sensible defaults, plus pre-seeded `MemoryStore` fixtures.
#![allow(dead_code)]

use crate::store::{Action, ActionStatus, Chart, MemoryStore};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

// ============================================================================
// Test data factories
// ============================================================================

/// Create a root chart in a workspace
pub fn test_chart(workspace_id: Uuid, title: &str) -> Chart {
    Chart::new(workspace_id, title)
}

/// Create a chart last updated `days` days before `now`
pub fn stale_chart(workspace_id: Uuid, title: &str, days: i64, now: DateTime<Utc>) -> Chart {
    let mut chart = Chart::new(workspace_id, title);
    chart.created_at = now - Duration::days(days + 1);
    chart.updated_at = now - Duration::days(days);
    chart
}

/// Create a not-started action attached directly to a chart
pub fn test_action(chart_id: Uuid, title: &str) -> Action {
    Action::new(chart_id, title)
}

/// Create an action telescoped into `child_chart_id`
pub fn telescoped_action(chart_id: Uuid, title: &str, child_chart_id: Uuid) -> Action {
    let mut action = Action::new(chart_id, title);
    action.child_chart_id = Some(child_chart_id);
    action
}

/// Create an action due `days` days in the past (negative = in the future)
pub fn overdue_action(chart_id: Uuid, title: &str, days: i64, now: DateTime<Utc>) -> Action {
    let mut action = Action::new(chart_id, title);
    action.due_date = Some(now - Duration::days(days));
    action
}

/// Create an action due in `days` days
pub fn due_in(chart_id: Uuid, title: &str, days: i64, now: DateTime<Utc>) -> Action {
    let mut action = Action::new(chart_id, title);
    action.due_date = Some(now + Duration::days(days));
    action
}

/// Set status and assignee in one go
pub fn with_owner(mut action: Action, status: ActionStatus, email: &str) -> Action {
    action.status = status;
    action.assigned_to = Some(email.to_string());
    action
}

// ============================================================================
// Seeded stores
// ============================================================================

/// Ids of the fixture built by [`telescoping_tree`]
#[derive(Debug, Clone, Copy)]
pub struct TreeIds {
    pub workspace_id: Uuid,
    pub root: Uuid,
    pub a1: Uuid,
    pub c1: Uuid,
    pub a2: Uuid,
    pub c2: Uuid,
}

/// Root chart R with action A1 telescoped into C1, whose action A2 is
/// telescoped into C2
pub async fn telescoping_tree() -> (MemoryStore, TreeIds) {
    let ws = Uuid::new_v4();
    let root = test_chart(ws, "Root");
    let mut a1 = test_action(root.id, "A1");
    let c1 = Chart::new_child(ws, "C1", a1.id);
    a1.child_chart_id = Some(c1.id);
    let mut a2 = test_action(c1.id, "A2");
    let c2 = Chart::new_child(ws, "C2", a2.id);
    a2.child_chart_id = Some(c2.id);

    let ids = TreeIds {
        workspace_id: ws,
        root: root.id,
        a1: a1.id,
        c1: c1.id,
        a2: a2.id,
        c2: c2.id,
    };
    let store = MemoryStore::new()
        .with_chart(root)
        .await
        .with_chart(c1)
        .await
        .with_chart(c2)
        .await
        .with_action(a1)
        .await
        .with_action(a2)
        .await;
    (store, ids)
}
