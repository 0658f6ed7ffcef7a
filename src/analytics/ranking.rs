//! Ranked dashboard lists and the recommendation merge.
//!
//! Recommendations are bucket-then-truncate: every candidate gets the fixed
//! priority of its kind, the merged list is stable-sorted by priority and cut
//! to the configured size. No weighted score is involved.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::dependency::DependencyGraph;
use super::models::{
    ActionRef, AnalyticsConfig, DelayImpact, OverdueAction, Recommendation, RecommendationKind,
    StaleChart, UpcomingDeadline,
};
use crate::store::{Action, Chart};

/// Overdue actions with the unfinished actions they transitively block,
/// most blocking first. Actions blocking nothing are left out.
pub fn delay_impacts(
    graph: &DependencyGraph,
    overdue: &[Action],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<DelayImpact> {
    let mut impacts: Vec<DelayImpact> = overdue
        .iter()
        .filter_map(|action| {
            let blocked: Vec<&Action> = graph
                .transitively_blocked(action.id)
                .into_iter()
                .filter(|b| b.id != action.id && !b.status.is_finished())
                .collect();
            if blocked.is_empty() {
                return None;
            }
            let mut seen = HashSet::new();
            let affected_people = blocked
                .iter()
                .filter_map(|b| b.assignee_email())
                .filter(|email| seen.insert(*email))
                .map(str::to_string)
                .collect();
            Some(DelayImpact {
                action: ActionRef::from(action),
                days_overdue: action.days_overdue(now).unwrap_or(0),
                blocked_actions: blocked.into_iter().map(ActionRef::from).collect(),
                affected_people,
            })
        })
        .collect();
    impacts.sort_by_key(|impact| std::cmp::Reverse(impact.blocked_actions.len()));
    impacts.truncate(limit);
    impacts
}

/// Unfinished actions due between now and `window_days` from now, soonest first
pub fn upcoming_deadlines(
    actions: &[Action],
    chart_titles: &HashMap<Uuid, String>,
    now: DateTime<Utc>,
    window_days: i64,
    limit: usize,
) -> Vec<UpcomingDeadline> {
    let horizon = now + Duration::days(window_days);
    let mut upcoming: Vec<UpcomingDeadline> = actions
        .iter()
        .filter(|a| !a.status.is_finished())
        .filter(|a| a.due_date.is_some_and(|due| due <= horizon))
        .filter_map(|a| {
            Some(UpcomingDeadline {
                days_until_due: a.days_until_due(now)?,
                chart_title: chart_titles.get(&a.chart_id).cloned(),
                action: ActionRef::from(a),
            })
        })
        .collect();
    upcoming.sort_by(|a, b| {
        a.days_until_due
            .cmp(&b.days_until_due)
            .then_with(|| a.action.due_date.cmp(&b.action.due_date))
    });
    upcoming.truncate(limit);
    upcoming
}

/// Unfinished actions past due, most overdue first
pub fn overdue_actions(
    actions: &[Action],
    chart_titles: &HashMap<Uuid, String>,
    now: DateTime<Utc>,
) -> Vec<OverdueAction> {
    let mut overdue: Vec<OverdueAction> = actions
        .iter()
        .filter(|a| a.is_overdue(now))
        .filter_map(|a| {
            Some(OverdueAction {
                days_overdue: a.days_overdue(now)?,
                chart_title: chart_titles.get(&a.chart_id).cloned(),
                action: ActionRef::from(a),
            })
        })
        .collect();
    overdue.sort_by_key(|o| std::cmp::Reverse(o.days_overdue));
    overdue
}

/// Active charts not updated for `stale_after_days` or more, stalest first
pub fn stale_charts(
    charts: &[Chart],
    now: DateTime<Utc>,
    stale_after_days: i64,
    limit: usize,
) -> Vec<StaleChart> {
    let mut stale: Vec<StaleChart> = charts
        .iter()
        .filter(|c| !c.is_archived())
        .map(|c| StaleChart::from_chart(c, now))
        .filter(|s| s.days_since_update >= stale_after_days)
        .collect();
    stale.sort_by(|a, b| {
        b.days_since_update
            .cmp(&a.days_since_update)
            .then_with(|| a.updated_at.cmp(&b.updated_at))
    });
    stale.truncate(limit);
    stale
}

/// Merge the three candidate kinds into one bounded, priority-ordered list
pub fn rank_recommendations(
    impacts: &[DelayImpact],
    upcoming: &[UpcomingDeadline],
    stale: &[StaleChart],
    config: &AnalyticsConfig,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for impact in impacts.iter().filter(|i| !i.blocked_actions.is_empty()) {
        let kind = RecommendationKind::CriticalBlocker;
        recommendations.push(Recommendation {
            kind,
            priority: kind.priority(),
            title: format!("Unblock \"{}\"", impact.action.title),
            detail: format!(
                "{} overdue, blocking {} action{}",
                plural_days(impact.days_overdue),
                impact.blocked_actions.len(),
                if impact.blocked_actions.len() == 1 { "" } else { "s" }
            ),
            action_id: Some(impact.action.action_id),
            chart_id: impact.action.chart_id,
        });
    }

    for deadline in upcoming
        .iter()
        .filter(|d| (0..=config.deadline_urgent_days).contains(&d.days_until_due))
    {
        let kind = RecommendationKind::DeadlineApproaching;
        let detail = if deadline.days_until_due == 0 {
            "Due today".to_string()
        } else {
            format!("Due in {}", plural_days(deadline.days_until_due))
        };
        recommendations.push(Recommendation {
            kind,
            priority: kind.priority(),
            title: format!("Finish \"{}\"", deadline.action.title),
            detail,
            action_id: Some(deadline.action.action_id),
            chart_id: deadline.action.chart_id,
        });
    }

    for chart in stale
        .iter()
        .filter(|s| s.days_since_update >= config.stale_critical_days)
    {
        let kind = RecommendationKind::StaleChart;
        recommendations.push(Recommendation {
            kind,
            priority: kind.priority(),
            title: format!("Review \"{}\"", chart.title),
            detail: format!("Not updated for {}", plural_days(chart.days_since_update)),
            action_id: None,
            chart_id: chart.chart_id,
        });
    }

    recommendations.sort_by_key(|r| r.priority);
    recommendations.truncate(config.max_recommendations);
    recommendations
}

fn plural_days(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}
