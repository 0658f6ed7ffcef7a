//! Dashboard engine: request-scoped analytics over a [`DashboardFilter`].
//!
//! Each call resolves its scope (workspace, or one chart and its descendants),
//! fetches charts and actions concurrently, and runs the pure computations of
//! the sibling modules over them. Nothing is cached between calls.

use crate::error::{EngineError, EngineResult};
use crate::hierarchy::{HierarchyConfig, HierarchyResolver};
use crate::store::{Action, ActionFilter, Chart, ChartFilter, RecordStore};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::aggregation::{count_statuses, distinct_emails, AggregationBuilder};
use super::cascade::{build_cascades, CascadeContext};
use super::dependency::{DependencyGraph, DependencyGraphBuilder};
use super::models::{
    AnalyticsConfig, CascadeNode, ChartRollup, DashboardFilter, DashboardInsights,
    DashboardStats, DelayImpact, OverdueAction, Recommendation, StaleChart, StatusCounts,
    UpcomingDeadline,
};
use super::ranking;

// ============================================================================
// Scope
// ============================================================================

/// Records visible to one request
#[derive(Debug, Default)]
struct Scope {
    /// Charts in scope, archived included, most recently updated first
    charts: Vec<Chart>,
    /// Actions of active charts in scope
    actions: Vec<Action>,
    chart_titles: HashMap<Uuid, String>,
}

impl Scope {
    fn active_charts(&self) -> impl Iterator<Item = &Chart> {
        self.charts.iter().filter(|c| !c.is_archived())
    }
}

/// Everything derived from the overdue seeds of a scope
struct DelayAnalysis {
    overdue: Vec<Action>,
    graph: DependencyGraph,
    context: CascadeContext,
}

// ============================================================================
// Engine
// ============================================================================

/// Computes dashboard data straight from a [`RecordStore`]
#[derive(Clone)]
pub struct DashboardEngine {
    store: Arc<dyn RecordStore>,
    config: AnalyticsConfig,
    resolver: HierarchyResolver,
    aggregation: AggregationBuilder,
    graph_builder: DependencyGraphBuilder,
}

impl DashboardEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        config: AnalyticsConfig,
        hierarchy: HierarchyConfig,
    ) -> Self {
        Self {
            resolver: HierarchyResolver::new(store.clone(), hierarchy),
            aggregation: AggregationBuilder::new(store.clone()),
            graph_builder: DependencyGraphBuilder::new(store.clone(), &config),
            store,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    async fn load_scope(&self, filter: &DashboardFilter) -> EngineResult<Scope> {
        let (charts, actions) = match filter.chart_id {
            Some(chart_id) => {
                let mut ids = vec![chart_id];
                ids.extend(self.resolver.descendants(chart_id).await?);
                let charts_filter = ChartFilter {
                    workspace_id: Some(filter.workspace_id),
                    ids: Some(ids.clone()),
                    ..Default::default()
                };
                let actions_filter = ActionFilter {
                    workspace_id: Some(filter.workspace_id),
                    ..ActionFilter::in_charts(ids)
                };
                tokio::try_join!(
                    self.store.find_charts(&charts_filter),
                    self.store.find_actions(&actions_filter),
                )?
            }
            None => {
                let charts_filter = ChartFilter::workspace(filter.workspace_id);
                let actions_filter = ActionFilter::workspace(filter.workspace_id);
                tokio::try_join!(
                    self.store.find_charts(&charts_filter),
                    self.store.find_actions(&actions_filter),
                )?
            }
        };

        let active: HashSet<Uuid> = charts
            .iter()
            .filter(|c| !c.is_archived())
            .map(|c| c.id)
            .collect();
        let actions: Vec<Action> = actions
            .into_iter()
            .filter(|a| active.contains(&a.chart_id))
            .collect();
        let chart_titles = charts.iter().map(|c| (c.id, c.title.clone())).collect();
        debug!(
            workspace_id = %filter.workspace_id,
            chart_id = ?filter.chart_id,
            charts = charts.len(),
            actions = actions.len(),
            "Loaded dashboard scope"
        );
        Ok(Scope {
            charts,
            actions,
            chart_titles,
        })
    }

    /// Load the dependency graph reachable from the overdue actions of the
    /// scope, then resolve display data for every node in it
    async fn analyze_delays(
        &self,
        scope: &Scope,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<DelayAnalysis> {
        let overdue: Vec<Action> = scope
            .actions
            .iter()
            .filter(|a| a.is_overdue(now) && filter.due_in_range(a))
            .cloned()
            .collect();
        let graph = self.graph_builder.expand(overdue.clone()).await?;

        // Dependencies cross chart boundaries; fetch titles the scope lacks
        let nodes: Vec<&Action> = graph.graph.node_weights().collect();
        let mut missing = HashSet::new();
        let missing_charts: Vec<Uuid> = nodes
            .iter()
            .map(|a| a.chart_id)
            .filter(|id| !scope.chart_titles.contains_key(id) && missing.insert(*id))
            .collect();
        let emails = distinct_emails(nodes.iter().copied());

        let fetch_charts = async {
            let charts = if missing_charts.is_empty() {
                Vec::new()
            } else {
                self.store
                    .find_charts(&ChartFilter::by_ids(missing_charts.clone()))
                    .await?
            };
            Ok::<_, EngineError>(charts)
        };
        let (extra_charts, assignees) =
            tokio::try_join!(fetch_charts, self.aggregation.assignees(&emails))?;

        let mut context = CascadeContext::new(now);
        context.chart_titles = scope.chart_titles.clone();
        context
            .chart_titles
            .extend(extra_charts.into_iter().map(|c| (c.id, c.title)));
        context.assignees = assignees.into_iter().map(|a| (a.email.clone(), a)).collect();

        Ok(DelayAnalysis {
            overdue,
            graph,
            context,
        })
    }

    fn in_range(&self, scope: &Scope, filter: &DashboardFilter) -> Vec<Action> {
        scope
            .actions
            .iter()
            .filter(|a| filter.due_in_range(a))
            .cloned()
            .collect()
    }

    // ========================================================================
    // Public computations
    // ========================================================================

    /// Action counts by status across the scope
    pub async fn status_distribution(&self, filter: &DashboardFilter) -> EngineResult<StatusCounts> {
        let scope = self.load_scope(filter).await?;
        Ok(count_statuses(&scope.actions))
    }

    /// Per-chart counts and assignees for every active chart in scope
    pub async fn chart_rollups(&self, filter: &DashboardFilter) -> EngineResult<Vec<ChartRollup>> {
        let scope = self.load_scope(filter).await?;
        let ids: Vec<Uuid> = scope.active_charts().map(|c| c.id).collect();
        self.aggregation
            .rollups_from(&ids, &scope.charts, &scope.actions)
            .await
    }

    pub async fn stale_charts(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<StaleChart>> {
        let scope = self.load_scope(filter).await?;
        Ok(ranking::stale_charts(
            &scope.charts,
            now,
            self.config.stale_after_days,
            self.config.max_stale,
        ))
    }

    pub async fn upcoming_deadlines(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<UpcomingDeadline>> {
        let scope = self.load_scope(filter).await?;
        Ok(ranking::upcoming_deadlines(
            &self.in_range(&scope, filter),
            &scope.chart_titles,
            now,
            self.config.upcoming_window_days,
            self.config.max_upcoming,
        ))
    }

    pub async fn overdue_actions(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<OverdueAction>> {
        let scope = self.load_scope(filter).await?;
        Ok(ranking::overdue_actions(
            &self.in_range(&scope, filter),
            &scope.chart_titles,
            now,
        ))
    }

    pub async fn delay_impacts(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<DelayImpact>> {
        let scope = self.load_scope(filter).await?;
        let delays = self.analyze_delays(&scope, filter, now).await?;
        Ok(ranking::delay_impacts(
            &delays.graph,
            &delays.overdue,
            now,
            self.config.max_delay_impacts,
        ))
    }

    pub async fn cascade_forest(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<CascadeNode>> {
        let scope = self.load_scope(filter).await?;
        let delays = self.analyze_delays(&scope, filter, now).await?;
        let seeds: Vec<Uuid> = delays.overdue.iter().map(|a| a.id).collect();
        Ok(build_cascades(&delays.graph, &seeds, &delays.context))
    }

    pub async fn recommendations(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Recommendation>> {
        Ok(self.insights(filter, now).await?.recommendations)
    }

    /// Every insights list computed from a single scope load and graph walk
    pub async fn insights(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<DashboardInsights> {
        let scope = self.load_scope(filter).await?;
        let delays = self.analyze_delays(&scope, filter, now).await?;
        let seeds: Vec<Uuid> = delays.overdue.iter().map(|a| a.id).collect();

        let delay_impacts = ranking::delay_impacts(
            &delays.graph,
            &delays.overdue,
            now,
            self.config.max_delay_impacts,
        );
        let cascades = build_cascades(&delays.graph, &seeds, &delays.context);
        let upcoming_deadlines = ranking::upcoming_deadlines(
            &self.in_range(&scope, filter),
            &scope.chart_titles,
            now,
            self.config.upcoming_window_days,
            self.config.max_upcoming,
        );
        let stale_charts = ranking::stale_charts(
            &scope.charts,
            now,
            self.config.stale_after_days,
            self.config.max_stale_insights,
        );
        let recommendations = ranking::rank_recommendations(
            &delay_impacts,
            &upcoming_deadlines,
            &stale_charts,
            &self.config,
        );

        Ok(DashboardInsights {
            delay_impacts,
            cascades,
            upcoming_deadlines,
            stale_charts,
            recommendations,
            dependency_cycles: delays.graph.cycles(),
            graph_truncated: delays.graph.is_truncated(),
            computed_at: now,
        })
    }

    /// Headline numbers; lists are counted without their display caps
    pub async fn stats(
        &self,
        filter: &DashboardFilter,
        now: DateTime<Utc>,
    ) -> EngineResult<DashboardStats> {
        let scope = self.load_scope(filter).await?;
        let counts = count_statuses(&scope.actions);
        let in_range = self.in_range(&scope, filter);
        let active_charts = scope.active_charts().count();

        Ok(DashboardStats {
            active_charts,
            archived_charts: scope.charts.len() - active_charts,
            overdue_actions: ranking::overdue_actions(&in_range, &scope.chart_titles, now).len(),
            upcoming_deadlines: ranking::upcoming_deadlines(
                &in_range,
                &scope.chart_titles,
                now,
                self.config.upcoming_window_days,
                usize::MAX,
            )
            .len(),
            stale_charts: ranking::stale_charts(
                &scope.charts,
                now,
                self.config.stale_after_days,
                usize::MAX,
            )
            .len(),
            completion_rate: counts.completion_rate(),
            counts,
            computed_at: now,
        })
    }
}
