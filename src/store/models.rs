//! Record models: charts, tensions, actions, dependencies and profiles
//!
//! Actions are persisted as [`ActionRecord`], which still carries the legacy
//! `is_completed` flag and `sub_chart_id` pointer. Everything above the store
//! works with the canonical [`Action`], produced by [`ActionRecord::normalize`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Chart
// ============================================================================

/// A structural-tension chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// The action that telescoped this chart into existence (None for a root chart)
    #[serde(default)]
    pub parent_action_id: Option<Uuid>,
    /// Null while the chart is active
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chart {
    /// Create a new root chart
    pub fn new(workspace_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            title: title.into(),
            due_date: None,
            parent_action_id: None,
            archived_at: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a chart telescoped out of `parent_action_id`
    pub fn new_child(workspace_id: Uuid, title: impl Into<String>, parent_action_id: Uuid) -> Self {
        Self {
            parent_action_id: Some(parent_action_id),
            ..Self::new(workspace_id, title)
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Whole days elapsed since the last update
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_days().max(0)
    }
}

// ============================================================================
// Tension
// ============================================================================

/// A named gap-to-close grouping actions inside a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tension {
    pub id: Uuid,
    pub chart_id: Uuid,
    pub title: String,
    /// Optional area tag (e.g. "health", "career")
    #[serde(default)]
    pub area: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tension {
    pub fn new(chart_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            chart_id,
            title: title.into(),
            area: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Action
// ============================================================================

/// Status of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    NotStarted,
    InProgress,
    Done,
    OnHold,
    Cancelled,
}

impl ActionStatus {
    /// Reconcile a stored status string and the legacy completion flag.
    ///
    /// An absent status falls back to `is_completed`; an unknown status is
    /// treated as not started.
    pub fn normalize(status: Option<&str>, is_completed: Option<bool>) -> Self {
        match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Self::parse(raw).unwrap_or(Self::NotStarted),
            None if is_completed == Some(true) => Self::Done,
            None => Self::NotStarted,
        }
    }

    /// Parse a status name, accepting snake_case, kebab-case and spaces
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "on_hold" => Some(Self::OnHold),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::OnHold => "on_hold",
            Self::Cancelled => "cancelled",
        }
    }

    /// Done or cancelled: no longer able to slip
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical action, as seen by the hierarchy and analytics engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    /// Chart owning the action (directly or through its tension)
    pub chart_id: Uuid,
    /// None when the action hangs directly off the chart
    pub tension_id: Option<Uuid>,
    pub title: String,
    pub status: ActionStatus,
    pub due_date: Option<DateTime<Utc>>,
    /// Assignee email, resolved against profiles for display
    pub assigned_to: Option<String>,
    /// Chart this action was telescoped into
    pub child_chart_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    /// Create a not-started action attached directly to a chart
    pub fn new(chart_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            chart_id,
            tension_id: None,
            title: title.into(),
            status: ActionStatus::NotStarted,
            due_date: None,
            assigned_to: None,
            child_chart_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_child_chart(&self) -> bool {
        self.child_chart_id.is_some()
    }

    /// Past due and still open
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_finished() && self.due_date.is_some_and(|due| due < now)
    }

    /// `ceil((now - due) / 1 day)` for a due date in the past
    pub fn days_overdue(&self, now: DateTime<Utc>) -> Option<i64> {
        let due = self.due_date.filter(|due| *due < now)?;
        Some(ceil_days((now - due).num_seconds()))
    }

    /// `ceil((due - now) / 1 day)` for a due date not yet passed
    pub fn days_until_due(&self, now: DateTime<Utc>) -> Option<i64> {
        let due = self.due_date.filter(|due| *due >= now)?;
        Some(ceil_days((due - now).num_seconds()))
    }

    /// Assignee email with surrounding whitespace removed
    pub fn assignee_email(&self) -> Option<&str> {
        self.assigned_to
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Convert back into the stored form, dropping the legacy fields
    pub fn to_record(&self) -> ActionRecord {
        ActionRecord {
            id: self.id,
            chart_id: self.chart_id,
            tension_id: self.tension_id,
            title: self.title.clone(),
            status: Some(self.status.as_str().to_string()),
            is_completed: Some(self.status == ActionStatus::Done),
            due_date: self.due_date,
            assigned_to: self.assigned_to.clone(),
            child_chart_id: self.child_chart_id,
            sub_chart_id: None,
            has_child_chart: self.child_chart_id.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

fn ceil_days(seconds: i64) -> i64 {
    (seconds + SECONDS_PER_DAY - 1).div_euclid(SECONDS_PER_DAY)
}

/// Action as persisted, including legacy fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub chart_id: Uuid,
    #[serde(default)]
    pub tension_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Legacy completion flag, superseded by `status`
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub child_chart_id: Option<Uuid>,
    /// Legacy child pointer, superseded by `child_chart_id`
    #[serde(default)]
    pub sub_chart_id: Option<Uuid>,
    #[serde(default)]
    pub has_child_chart: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionRecord {
    /// Reconcile legacy fields into the canonical action
    pub fn normalize(&self) -> Action {
        Action {
            id: self.id,
            chart_id: self.chart_id,
            tension_id: self.tension_id,
            title: self.title.clone(),
            status: ActionStatus::normalize(self.status.as_deref(), self.is_completed),
            due_date: self.due_date,
            assigned_to: self.assigned_to.clone(),
            child_chart_id: self.child_chart_id.or(self.sub_chart_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Set or clear the child chart link, keeping the legacy fields in step
    pub fn set_child_chart(&mut self, child_chart_id: Option<Uuid>) {
        self.child_chart_id = child_chart_id;
        self.sub_chart_id = None;
        self.has_child_chart = child_chart_id.is_some();
    }

    /// Whether either the current or the legacy child pointer names one of
    /// `chart_ids`
    pub fn references_any(&self, chart_ids: &[Uuid]) -> bool {
        [self.child_chart_id, self.sub_chart_id]
            .into_iter()
            .flatten()
            .any(|id| chart_ids.contains(&id))
    }

    /// Clear each child pointer that names one of `chart_ids`; a pointer to
    /// any other chart is kept
    pub fn drop_chart_refs(&mut self, chart_ids: &[Uuid]) {
        if self.child_chart_id.is_some_and(|id| chart_ids.contains(&id)) {
            self.child_chart_id = None;
        }
        if self.sub_chart_id.is_some_and(|id| chart_ids.contains(&id)) {
            self.sub_chart_id = None;
        }
        self.has_child_chart = self.child_chart_id.or(self.sub_chart_id).is_some();
    }
}

// ============================================================================
// Dependencies and profiles
// ============================================================================

/// Directed "blocks" edge: the blocker must finish before the blocked action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDependency {
    pub id: Uuid,
    pub blocker_action_id: Uuid,
    pub blocked_action_id: Uuid,
}

impl ActionDependency {
    pub fn new(blocker_action_id: Uuid, blocked_action_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            blocker_action_id,
            blocked_action_id,
        }
    }
}

/// A user profile, used to resolve assignee emails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Profile {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name: Some(display_name.into()),
        }
    }
}
