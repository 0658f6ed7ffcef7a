//! Query filters for `RecordStore::find_*`
//!
//! Every field is optional; `None` means "no constraint". Id lists are the
//! batched form: one query for a whole frontier instead of one per node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{Action, ActionDependency, ActionRecord, Chart};

/// Filter over charts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartFilter {
    pub workspace_id: Option<Uuid>,
    /// In-list on chart id
    pub ids: Option<Vec<Uuid>>,
    /// `Some(false)` = active only, `Some(true)` = archived only
    pub archived: Option<bool>,
    /// In-list on `parent_action_id`
    pub parent_action_ids: Option<Vec<Uuid>>,
    /// `Some(false)` = root charts only, `Some(true)` = telescoped charts only
    pub has_parent_action: Option<bool>,
    /// Strictly before
    pub updated_before: Option<DateTime<Utc>>,
}

impl ChartFilter {
    pub fn workspace(workspace_id: Uuid) -> Self {
        Self {
            workspace_id: Some(workspace_id),
            ..Default::default()
        }
    }

    pub fn by_ids(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn active(mut self) -> Self {
        self.archived = Some(false);
        self
    }

    pub fn matches(&self, chart: &Chart) -> bool {
        if self.workspace_id.is_some_and(|ws| ws != chart.workspace_id) {
            return false;
        }
        if let Some(ref ids) = self.ids {
            if !ids.contains(&chart.id) {
                return false;
            }
        }
        if let Some(archived) = self.archived {
            if chart.is_archived() != archived {
                return false;
            }
        }
        if let Some(ref parents) = self.parent_action_ids {
            match chart.parent_action_id {
                Some(pid) if parents.contains(&pid) => {}
                _ => return false,
            }
        }
        if let Some(has_parent) = self.has_parent_action {
            if chart.parent_action_id.is_some() != has_parent {
                return false;
            }
        }
        if let Some(before) = self.updated_before {
            if chart.updated_at >= before {
                return false;
            }
        }
        true
    }
}

/// Filter over actions (applied to the normalized form)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionFilter {
    /// Matches actions whose owning chart lives in this workspace
    pub workspace_id: Option<Uuid>,
    pub ids: Option<Vec<Uuid>>,
    pub chart_ids: Option<Vec<Uuid>>,
    pub tension_ids: Option<Vec<Uuid>>,
    /// `Some(false)` = attached directly to the chart
    pub has_tension: Option<bool>,
    /// Null / not-null on `child_chart_id`
    pub has_child_chart: Option<bool>,
    /// In-list on either stored child pointer, so a legacy `sub_chart_id`
    /// shadowed by a newer `child_chart_id` still matches
    pub references_chart_ids: Option<Vec<Uuid>>,
    pub has_due_date: Option<bool>,
    /// Strictly before
    pub due_before: Option<DateTime<Utc>>,
    /// On or after
    pub due_on_or_after: Option<DateTime<Utc>>,
}

impl ActionFilter {
    pub fn by_ids(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Some(ids),
            ..Default::default()
        }
    }

    pub fn in_charts(chart_ids: Vec<Uuid>) -> Self {
        Self {
            chart_ids: Some(chart_ids),
            ..Default::default()
        }
    }

    pub fn workspace(workspace_id: Uuid) -> Self {
        Self {
            workspace_id: Some(workspace_id),
            ..Default::default()
        }
    }

    /// Actions whose stored child pointers name any of `chart_ids`
    pub fn referencing(chart_ids: Vec<Uuid>) -> Self {
        Self {
            references_chart_ids: Some(chart_ids),
            ..Default::default()
        }
    }

    pub fn telescoped(mut self) -> Self {
        self.has_child_chart = Some(true);
        self
    }

    /// Constraints that need the stored record rather than the normalized form
    pub fn matches_record(&self, record: &ActionRecord) -> bool {
        self.references_chart_ids
            .as_ref()
            .map_or(true, |charts| record.references_any(charts))
    }

    /// Everything except `workspace_id`, which needs the owning chart, and
    /// `references_chart_ids`, see [`ActionFilter::matches_record`]
    pub fn matches(&self, action: &Action) -> bool {
        if let Some(ref ids) = self.ids {
            if !ids.contains(&action.id) {
                return false;
            }
        }
        if let Some(ref charts) = self.chart_ids {
            if !charts.contains(&action.chart_id) {
                return false;
            }
        }
        if let Some(ref tensions) = self.tension_ids {
            match action.tension_id {
                Some(tid) if tensions.contains(&tid) => {}
                _ => return false,
            }
        }
        if let Some(has_tension) = self.has_tension {
            if action.tension_id.is_some() != has_tension {
                return false;
            }
        }
        if let Some(has_child) = self.has_child_chart {
            if action.has_child_chart() != has_child {
                return false;
            }
        }
        if let Some(has_due) = self.has_due_date {
            if action.due_date.is_some() != has_due {
                return false;
            }
        }
        if let Some(before) = self.due_before {
            if !action.due_date.is_some_and(|due| due < before) {
                return false;
            }
        }
        if let Some(after) = self.due_on_or_after {
            if !action.due_date.is_some_and(|due| due >= after) {
                return false;
            }
        }
        true
    }
}

/// Filter over dependency edges
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyFilter {
    pub blocker_ids: Option<Vec<Uuid>>,
    pub blocked_ids: Option<Vec<Uuid>>,
}

impl DependencyFilter {
    pub fn blocked_by(blocker_ids: Vec<Uuid>) -> Self {
        Self {
            blocker_ids: Some(blocker_ids),
            blocked_ids: None,
        }
    }

    pub fn matches(&self, dep: &ActionDependency) -> bool {
        if let Some(ref blockers) = self.blocker_ids {
            if !blockers.contains(&dep.blocker_action_id) {
                return false;
            }
        }
        if let Some(ref blocked) = self.blocked_ids {
            if !blocked.contains(&dep.blocked_action_id) {
                return false;
            }
        }
        true
    }
}
