//! Hierarchy resolver: depth, descendants, chart details and consistency checks.
//!
//! Every walk is level-batched: one `find_*` call per frontier, never one per
//! chart. Depth queries go through a [`HierarchyIndex`] built once per call.

use crate::error::{EngineError, EngineResult};
use crate::store::{Action, ActionFilter, Chart, ChartFilter, RecordStore};
use futures::TryFutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::groups::build_project_groups;
use super::index::HierarchyIndex;
use super::models::{
    ChartDetails, ConsistencyReport, HierarchyConfig, Inconsistency, ProjectGroup, TensionDetails,
};

/// Read-only view of the chart tree of a workspace
#[derive(Clone)]
pub struct HierarchyResolver {
    store: Arc<dyn RecordStore>,
    config: HierarchyConfig,
}

impl HierarchyResolver {
    pub fn new(store: Arc<dyn RecordStore>, config: HierarchyConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Build the reverse index from every telescoped action of the workspace
    pub async fn load_index(&self, workspace_id: Uuid) -> EngineResult<HierarchyIndex> {
        let actions = self
            .store
            .find_actions(&ActionFilter::workspace(workspace_id).telescoped())
            .await?;
        let index = HierarchyIndex::from_actions(&actions, self.config.max_depth);
        debug!(
            workspace_id = %workspace_id,
            links = index.len(),
            "Built hierarchy index"
        );
        Ok(index)
    }

    /// Depth of a chart; root charts (and unknown charts) are at depth 1
    pub async fn depth(&self, chart_id: Uuid) -> EngineResult<usize> {
        let Some(chart) = self.store.get_chart(chart_id).await? else {
            return Ok(1);
        };
        let index = self.load_index(chart.workspace_id).await?;
        Ok(index.depth(chart_id))
    }

    /// Every live chart below `chart_id`, breadth first.
    ///
    /// Follows `child_chart_id` forward edges one level at a time, so charts
    /// cut off by an archive are not returned.
    pub async fn descendants(&self, chart_id: Uuid) -> EngineResult<Vec<Uuid>> {
        let mut visited = HashSet::from([chart_id]);
        let mut out = Vec::new();
        let mut frontier = vec![chart_id];
        let mut level = 0;

        while !frontier.is_empty() {
            if level >= self.config.max_depth {
                warn!(
                    chart_id = %chart_id,
                    max_depth = self.config.max_depth,
                    "Descendant walk hit the depth cap; deeper charts ignored"
                );
                break;
            }
            let actions = self
                .store
                .find_actions(&ActionFilter::in_charts(frontier).telescoped())
                .await?;
            frontier = actions
                .iter()
                .filter_map(|a| a.child_chart_id)
                .filter(|child| visited.insert(*child))
                .collect();
            out.extend(frontier.iter().copied());
            level += 1;
        }

        debug!(chart_id = %chart_id, descendants = out.len(), levels = level, "Resolved descendants");
        Ok(out)
    }

    /// Every chart below `chart_id` found through `parent_action_id`
    /// back-references, archived charts included.
    ///
    /// This is the only way to find a subtree whose forward edges were
    /// severed by an archive.
    pub async fn descendants_via_back_refs(&self, chart_id: Uuid) -> EngineResult<Vec<Chart>> {
        let mut visited = HashSet::from([chart_id]);
        let mut out = Vec::new();
        let mut frontier = vec![chart_id];
        let mut level = 0;

        while !frontier.is_empty() {
            if level >= self.config.max_depth {
                warn!(
                    chart_id = %chart_id,
                    max_depth = self.config.max_depth,
                    "Back-reference walk hit the depth cap; deeper charts ignored"
                );
                break;
            }
            let action_ids: Vec<Uuid> = self
                .store
                .find_actions(&ActionFilter::in_charts(frontier))
                .await?
                .into_iter()
                .map(|a| a.id)
                .collect();
            if action_ids.is_empty() {
                break;
            }
            let children = self
                .store
                .find_charts(&ChartFilter {
                    parent_action_ids: Some(action_ids),
                    ..Default::default()
                })
                .await?;
            frontier = Vec::new();
            for child in children {
                if visited.insert(child.id) {
                    frontier.push(child.id);
                    out.push(child);
                }
            }
            level += 1;
        }
        Ok(out)
    }

    /// A chart with its tensions, their actions and its direct actions.
    ///
    /// Returns `None` when the chart does not exist.
    pub async fn chart_details(&self, chart_id: Uuid) -> EngineResult<Option<ChartDetails>> {
        let Some(chart) = self.store.get_chart(chart_id).await? else {
            return Ok(None);
        };
        let chart_ids = [chart_id];
        let actions_filter = ActionFilter::in_charts(chart_ids.to_vec());
        let (tensions, actions, index) = tokio::try_join!(
            self.store.find_tensions(&chart_ids).err_into::<EngineError>(),
            self.store.find_actions(&actions_filter).err_into::<EngineError>(),
            self.load_index(chart.workspace_id),
        )?;

        let mut by_tension: HashMap<Uuid, Vec<Action>> = HashMap::new();
        let mut direct_actions = Vec::new();
        for action in actions {
            match action.tension_id {
                Some(tid) => by_tension.entry(tid).or_default().push(action),
                None => direct_actions.push(action),
            }
        }
        let tensions = tensions
            .into_iter()
            .map(|tension| TensionDetails {
                actions: by_tension.remove(&tension.id).unwrap_or_default(),
                tension,
            })
            .collect();
        if !by_tension.is_empty() {
            warn!(
                chart_id = %chart_id,
                tensions = by_tension.len(),
                "Actions reference tensions outside their chart; listing them as direct"
            );
            direct_actions.extend(by_tension.into_values().flatten());
        }

        Ok(Some(ChartDetails {
            depth: index.depth(chart_id),
            chart,
            tensions,
            direct_actions,
        }))
    }

    /// Active charts of the workspace grouped under their depth-1 masters
    pub async fn project_groups(&self, workspace_id: Uuid) -> EngineResult<Vec<ProjectGroup>> {
        let charts_filter = ChartFilter::workspace(workspace_id).active();
        let (charts, index) = tokio::try_join!(
            self.store.find_charts(&charts_filter).err_into::<EngineError>(),
            self.load_index(workspace_id),
        )?;
        Ok(build_project_groups(&charts, &index))
    }

    /// Check the mutual back-reference between charts and actions
    pub async fn check_consistency(&self, workspace_id: Uuid) -> EngineResult<ConsistencyReport> {
        let charts_filter = ChartFilter::workspace(workspace_id);
        let actions_filter = ActionFilter::workspace(workspace_id);
        let (charts, actions) = tokio::try_join!(
            self.store.find_charts(&charts_filter),
            self.store.find_actions(&actions_filter),
        )?;

        let mut actions_by_id: HashMap<Uuid, Action> =
            actions.iter().map(|a| (a.id, a.clone())).collect();
        let mut chart_ids: HashSet<Uuid> = charts.iter().map(|c| c.id).collect();

        // Parent actions and child charts may live in another workspace
        let foreign_actions: Vec<Uuid> = charts
            .iter()
            .filter_map(|c| c.parent_action_id)
            .filter(|id| !actions_by_id.contains_key(id))
            .collect();
        let foreign_charts: Vec<Uuid> = actions
            .iter()
            .filter_map(|a| a.child_chart_id)
            .filter(|id| !chart_ids.contains(id))
            .collect();
        if !foreign_actions.is_empty() {
            for action in self
                .store
                .find_actions(&ActionFilter::by_ids(foreign_actions))
                .await?
            {
                actions_by_id.insert(action.id, action);
            }
        }
        if !foreign_charts.is_empty() {
            for chart in self
                .store
                .find_charts(&ChartFilter::by_ids(foreign_charts))
                .await?
            {
                chart_ids.insert(chart.id);
            }
        }

        let mut issues = Vec::new();
        for chart in &charts {
            let Some(action_id) = chart.parent_action_id else {
                continue;
            };
            match actions_by_id.get(&action_id) {
                None => issues.push(Inconsistency::MissingParentAction {
                    chart_id: chart.id,
                    action_id,
                }),
                // Archived charts legitimately lose their forward edge
                Some(action) if !chart.is_archived() && action.child_chart_id != Some(chart.id) => {
                    issues.push(Inconsistency::ParentActionMismatch {
                        chart_id: chart.id,
                        action_id,
                        child_chart_id: action.child_chart_id,
                    })
                }
                Some(_) => {}
            }
        }
        for action in &actions {
            if let Some(child) = action.child_chart_id {
                if !chart_ids.contains(&child) {
                    issues.push(Inconsistency::DanglingChildChart {
                        action_id: action.id,
                        chart_id: child,
                    });
                }
            }
        }

        let index = HierarchyIndex::from_actions(&actions, self.config.max_depth);
        for chart in &charts {
            if index.has_cycle_above(chart.id) {
                issues.push(Inconsistency::ReverseIndexCycle { chart_id: chart.id });
            }
        }

        if !issues.is_empty() {
            warn!(
                workspace_id = %workspace_id,
                issues = issues.len(),
                "Chart hierarchy has inconsistent references"
            );
        }
        Ok(ConsistencyReport {
            charts_checked: charts.len(),
            actions_checked: actions.len(),
            issues,
        })
    }
}
