//! Per-chart status counts and assignee rosters

use crate::error::EngineResult;
use crate::store::{Action, ActionFilter, Chart, ChartFilter, Profile, RecordStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::models::{Assignee, ChartRollup, StatusCounts};

/// Count actions by (already normalized) status
pub fn count_statuses<'a>(actions: impl IntoIterator<Item = &'a Action>) -> StatusCounts {
    actions.into_iter().map(|a| a.status).collect()
}

/// Distinct trimmed assignee emails in first-seen order
pub fn distinct_emails<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Vec<String> {
    let mut seen = HashSet::new();
    actions
        .into_iter()
        .filter_map(Action::assignee_email)
        .filter(|email| seen.insert(*email))
        .map(str::to_string)
        .collect()
}

/// Resolve emails against profiles; matching is exact on the trimmed email.
///
/// Emails without a profile are kept as unresolved assignees.
pub fn resolve_assignees(emails: &[String], profiles: &[Profile]) -> Vec<Assignee> {
    let by_email: HashMap<&str, &Profile> =
        profiles.iter().map(|p| (p.email.trim(), p)).collect();
    emails
        .iter()
        .map(|email| match by_email.get(email.as_str()) {
            Some(profile) => Assignee {
                email: email.clone(),
                profile_id: Some(profile.id),
                display_name: profile.display_name.clone(),
            },
            None => Assignee::unresolved(email.clone()),
        })
        .collect()
}

/// Builds chart rollups with batched store access
#[derive(Clone)]
pub struct AggregationBuilder {
    store: Arc<dyn RecordStore>,
}

impl AggregationBuilder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Look up every distinct email once
    pub async fn assignees(&self, emails: &[String]) -> EngineResult<Vec<Assignee>> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = self.store.find_profiles_by_email(emails).await?;
        Ok(resolve_assignees(emails, &profiles))
    }

    /// Rollups for the given charts, in the order given.
    ///
    /// Unknown chart ids are skipped.
    pub async fn rollups(&self, chart_ids: &[Uuid]) -> EngineResult<Vec<ChartRollup>> {
        if chart_ids.is_empty() {
            return Ok(Vec::new());
        }
        let charts_filter = ChartFilter::by_ids(chart_ids.to_vec());
        let actions_filter = ActionFilter::in_charts(chart_ids.to_vec());
        let (charts, actions) = tokio::try_join!(
            self.store.find_charts(&charts_filter),
            self.store.find_actions(&actions_filter),
        )?;
        self.rollups_from(chart_ids, &charts, &actions).await
    }

    /// Rollups over records already fetched by the caller
    pub(crate) async fn rollups_from(
        &self,
        chart_ids: &[Uuid],
        charts: &[Chart],
        actions: &[Action],
    ) -> EngineResult<Vec<ChartRollup>> {
        let mut by_chart: HashMap<Uuid, Vec<&Action>> = HashMap::new();
        for action in actions {
            by_chart.entry(action.chart_id).or_default().push(action);
        }
        let emails = distinct_emails(actions.iter());
        let roster: HashMap<String, Assignee> = self
            .assignees(&emails)
            .await?
            .into_iter()
            .map(|a| (a.email.clone(), a))
            .collect();

        let titles: HashMap<Uuid, &str> = charts.iter().map(|c| (c.id, c.title.as_str())).collect();
        let rollups: Vec<ChartRollup> = chart_ids
            .iter()
            .filter_map(|id| {
                let title = titles.get(id)?;
                let chart_actions = by_chart.get(id).map(Vec::as_slice).unwrap_or_default();
                Some(ChartRollup {
                    chart_id: *id,
                    title: title.to_string(),
                    counts: count_statuses(chart_actions.iter().copied()),
                    assignees: distinct_emails(chart_actions.iter().copied())
                        .into_iter()
                        .filter_map(|email| roster.get(&email).cloned())
                        .collect(),
                })
            })
            .collect();
        debug!(charts = rollups.len(), actions = actions.len(), "Built chart rollups");
        Ok(rollups)
    }
}
