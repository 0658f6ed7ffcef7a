//! Hierarchy data models and configuration

use crate::error::CascadeOperation;
use crate::store::{Action, Chart, Tension};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// What `delete` does with the descendants of the deleted chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Sever every reference and delete only the target; descendants survive
    /// as detached root charts reachable by id
    #[default]
    Orphan,
    /// Delete the target and every descendant chart
    Cascade,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "orphan" => Ok(Self::Orphan),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!(
                "unknown delete policy '{}' (expected 'orphan' or 'cascade')",
                other
            )),
        }
    }
}

/// Tuning for hierarchy walks and mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Maximum number of levels followed by descendant walks
    pub max_depth: usize,
    pub delete_policy: DeletePolicy,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_depth: 50,
            delete_policy: DeletePolicy::Orphan,
        }
    }
}

// ============================================================================
// Read models
// ============================================================================

/// Lightweight chart reference for display lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRef {
    pub id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Chart> for ChartRef {
    fn from(chart: &Chart) -> Self {
        Self {
            id: chart.id,
            title: chart.title.clone(),
            updated_at: chart.updated_at,
        }
    }
}

/// A tension with its actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensionDetails {
    pub tension: Tension,
    pub actions: Vec<Action>,
}

/// A chart with its tensions and directly attached actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDetails {
    pub chart: Chart,
    pub depth: usize,
    pub tensions: Vec<TensionDetails>,
    /// Actions with no tension
    pub direct_actions: Vec<Action>,
}

/// All charts at one depth below a master chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub depth: usize,
    /// Most recently updated first
    pub charts: Vec<ChartRef>,
}

/// A depth-1 chart with its descendants bucketed by depth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub master: ChartRef,
    /// Ordered by depth, starting at 2
    pub layers: Vec<Layer>,
}

impl ProjectGroup {
    pub fn chart_count(&self) -> usize {
        1 + self.layers.iter().map(|l| l.charts.len()).sum::<usize>()
    }
}

// ============================================================================
// Mutation results
// ============================================================================

/// What a cascade changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub chart_id: Uuid,
    pub operation: CascadeOperation,
    /// Target chart followed by its descendants
    pub affected_charts: Vec<Uuid>,
    /// Actions whose child chart link was severed or re-established
    pub updated_actions: Vec<Uuid>,
    /// Charts removed from the store
    #[serde(default)]
    pub deleted_charts: Vec<Uuid>,
    /// Charts that lost their `parent_action_id`
    #[serde(default)]
    pub detached_charts: Vec<Uuid>,
}

impl MutationOutcome {
    pub(crate) fn new(chart_id: Uuid, operation: CascadeOperation, affected: Vec<Uuid>) -> Self {
        Self {
            chart_id,
            operation,
            affected_charts: affected,
            updated_actions: Vec::new(),
            deleted_charts: Vec::new(),
            detached_charts: Vec::new(),
        }
    }
}

// ============================================================================
// Consistency checks
// ============================================================================

/// A broken cross-reference between charts and actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    /// Chart's `parent_action_id` names an action that does not exist
    MissingParentAction { chart_id: Uuid, action_id: Uuid },
    /// Active chart's parent action points at another chart (or none)
    ParentActionMismatch {
        chart_id: Uuid,
        action_id: Uuid,
        child_chart_id: Option<Uuid>,
    },
    /// Action's `child_chart_id` names a chart that does not exist
    DanglingChildChart { action_id: Uuid, chart_id: Uuid },
    /// Walking up from this chart revisits a chart
    ReverseIndexCycle { chart_id: Uuid },
}

/// Result of a workspace consistency check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub charts_checked: usize,
    pub actions_checked: usize,
    pub issues: Vec<Inconsistency>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}
