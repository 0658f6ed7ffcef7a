//! Data models for dashboard analytics
//!
//! Every type here is a plain serializable result; the computations live in
//! the sibling modules.

use crate::store::{Action, ActionStatus, Chart};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// Thresholds and caps for dashboard computations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Days without update before a chart counts as stale (default: 7)
    pub stale_after_days: i64,
    /// Staleness that earns a recommendation (default: 14)
    pub stale_critical_days: i64,
    /// Horizon of the upcoming-deadline list (default: 7)
    pub upcoming_window_days: i64,
    /// Deadlines this close earn a recommendation (default: 3)
    pub deadline_urgent_days: i64,
    pub max_delay_impacts: usize,
    pub max_upcoming: usize,
    pub max_stale: usize,
    /// Stale chart cap used by the insights view (default: 5)
    pub max_stale_insights: usize,
    pub max_recommendations: usize,
    /// Maximum frontier expansions of the dependency graph walk (default: 64)
    pub max_graph_steps: usize,
    /// Maximum nodes held by the dependency graph (default: 2000)
    pub max_graph_nodes: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            stale_after_days: 7,
            stale_critical_days: 14,
            upcoming_window_days: 7,
            deadline_urgent_days: 3,
            max_delay_impacts: 5,
            max_upcoming: 10,
            max_stale: 10,
            max_stale_insights: 5,
            max_recommendations: 5,
            max_graph_steps: 64,
            max_graph_nodes: 2000,
        }
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Inclusive due-date range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Already-resolved scope of a dashboard request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub workspace_id: Uuid,
    /// Restrict to this chart and its descendants
    #[serde(default)]
    pub chart_id: Option<Uuid>,
    /// Restrict deadline and overdue lists to actions due in this range
    #[serde(default)]
    pub due_range: Option<DateRange>,
}

impl DashboardFilter {
    pub fn workspace(workspace_id: Uuid) -> Self {
        Self {
            workspace_id,
            chart_id: None,
            due_range: None,
        }
    }

    pub fn with_chart(mut self, chart_id: Uuid) -> Self {
        self.chart_id = Some(chart_id);
        self
    }

    pub fn with_due_range(mut self, range: DateRange) -> Self {
        self.due_range = Some(range);
        self
    }

    /// Whether an action's due date passes the range (no range = everything)
    pub fn due_in_range(&self, action: &Action) -> bool {
        match (&self.due_range, action.due_date) {
            (None, _) => true,
            (Some(range), Some(due)) => range.contains(due),
            (Some(_), None) => false,
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Action counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub done: usize,
    pub in_progress: usize,
    pub on_hold: usize,
    pub not_started: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: ActionStatus) {
        self.total += 1;
        match status {
            ActionStatus::Done => self.done += 1,
            ActionStatus::InProgress => self.in_progress += 1,
            ActionStatus::OnHold => self.on_hold += 1,
            ActionStatus::NotStarted => self.not_started += 1,
            ActionStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        self.total += other.total;
        self.done += other.done;
        self.in_progress += other.in_progress;
        self.on_hold += other.on_hold;
        self.not_started += other.not_started;
        self.cancelled += other.cancelled;
    }

    /// Share of done actions, 0.0 when empty
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

impl FromIterator<ActionStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = ActionStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}

/// Assignee identity resolved from an email string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Trimmed email as written on the action
    pub email: String,
    /// Matching profile, when one exists
    pub profile_id: Option<Uuid>,
    pub display_name: Option<String>,
}

impl Assignee {
    /// Unresolved assignee (no matching profile)
    pub fn unresolved(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            profile_id: None,
            display_name: None,
        }
    }

    /// Display name when known, email otherwise
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Per-chart summary for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRollup {
    pub chart_id: Uuid,
    pub title: String,
    pub counts: StatusCounts,
    pub assignees: Vec<Assignee>,
}

// ============================================================================
// Cascades and rankings
// ============================================================================

/// A node of a delay cascade tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeNode {
    pub action_id: Uuid,
    pub title: String,
    pub status: ActionStatus,
    pub due_date: Option<DateTime<Utc>>,
    /// Absent on actions not yet overdue
    pub days_overdue: Option<i64>,
    pub assignee: Option<Assignee>,
    pub chart_id: Uuid,
    pub chart_title: Option<String>,
    pub is_root: bool,
    /// At least one edge from this node was cut because its target already
    /// appears in this tree
    #[serde(default)]
    pub pruned: bool,
    pub children: Vec<CascadeNode>,
}

impl CascadeNode {
    /// `Σ (1 + descendant_count(child))` over the built tree
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// Reference to an action inside a ranked list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRef {
    pub action_id: Uuid,
    pub title: String,
    pub chart_id: Uuid,
    pub status: ActionStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
}

impl From<&Action> for ActionRef {
    fn from(action: &Action) -> Self {
        Self {
            action_id: action.id,
            title: action.title.clone(),
            chart_id: action.chart_id,
            status: action.status,
            due_date: action.due_date,
            assigned_to: action.assignee_email().map(str::to_string),
        }
    }
}

/// An overdue action and everything it transitively holds up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayImpact {
    pub action: ActionRef,
    pub days_overdue: i64,
    pub blocked_actions: Vec<ActionRef>,
    /// Distinct assignees of the blocked actions
    pub affected_people: Vec<String>,
}

/// An unfinished action due within the upcoming window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingDeadline {
    pub action: ActionRef,
    pub chart_title: Option<String>,
    pub days_until_due: i64,
}

/// A chart not updated for a while
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleChart {
    pub chart_id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub days_since_update: i64,
}

impl StaleChart {
    pub fn from_chart(chart: &Chart, now: DateTime<Utc>) -> Self {
        Self {
            chart_id: chart.id,
            title: chart.title.clone(),
            updated_at: chart.updated_at,
            days_since_update: chart.days_since_update(now),
        }
    }
}

/// An unfinished action past its due date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueAction {
    pub action: ActionRef,
    pub chart_title: Option<String>,
    pub days_overdue: i64,
}

/// Recommendation kinds; the variant fixes the priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    CriticalBlocker,
    DeadlineApproaching,
    StaleChart,
}

impl RecommendationKind {
    /// 1 is most urgent
    pub fn priority(&self) -> u8 {
        match self {
            Self::CriticalBlocker => 1,
            Self::DeadlineApproaching => 2,
            Self::StaleChart => 3,
        }
    }
}

/// A single suggested next step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: u8,
    pub title: String,
    pub detail: String,
    /// Action the recommendation is about (blockers and deadlines)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<Uuid>,
    /// Chart the recommendation is about
    pub chart_id: Uuid,
}

// ============================================================================
// Request results
// ============================================================================

/// Headline numbers of a dashboard scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub active_charts: usize,
    pub archived_charts: usize,
    pub counts: StatusCounts,
    pub overdue_actions: usize,
    pub upcoming_deadlines: usize,
    pub stale_charts: usize,
    pub completion_rate: f64,
    pub computed_at: DateTime<Utc>,
}

/// Everything the insights view shows, computed in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardInsights {
    pub delay_impacts: Vec<DelayImpact>,
    pub cascades: Vec<CascadeNode>,
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
    pub stale_charts: Vec<StaleChart>,
    pub recommendations: Vec<Recommendation>,
    /// Strongly connected components found in the dependency graph
    #[serde(default)]
    pub dependency_cycles: Vec<Vec<Uuid>>,
    /// The dependency walk stopped at a bound before exhausting the graph
    #[serde(default)]
    pub graph_truncated: bool,
    pub computed_at: DateTime<Utc>,
}
