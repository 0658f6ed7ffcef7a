//! Cascading hierarchy mutations: archive, restore, delete and telescope.
//!
//! Each operation computes its full write set first, then hands it to
//! [`RecordStore::commit`] as one atomic [`WriteBatch`]. A failed commit means
//! nothing changed, so every operation is safe to retry.

use crate::error::{CascadeOperation, EngineError, EngineResult};
use crate::events::{ChartEvent, EventEmitter};
use crate::store::{ActionFilter, ActionPatch, Chart, ChartPatch, RecordStore, WriteBatch};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{DeletePolicy, HierarchyConfig, MutationOutcome};
use super::resolver::HierarchyResolver;

/// Applies cascades to a chart and every chart below it
pub struct HierarchyMutator {
    store: Arc<dyn RecordStore>,
    resolver: HierarchyResolver,
    config: HierarchyConfig,
    event_emitter: Option<Arc<dyn EventEmitter>>,
}

impl HierarchyMutator {
    /// Create a new HierarchyMutator
    pub fn new(store: Arc<dyn RecordStore>, config: HierarchyConfig) -> Self {
        Self {
            resolver: HierarchyResolver::new(store.clone(), config.clone()),
            store,
            config,
            event_emitter: None,
        }
    }

    /// Emit change events after every successful cascade (builder pattern)
    pub fn with_event_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.event_emitter = Some(emitter);
        self
    }

    pub fn resolver(&self) -> &HierarchyResolver {
        &self.resolver
    }

    /// Publish a committed cascade (no-op if event_emitter is None)
    fn emit(&self, workspace_id: Uuid, outcome: &MutationOutcome) {
        if let Some(emitter) = &self.event_emitter {
            emitter.emit(ChartEvent::new(workspace_id, outcome.clone()));
        }
    }

    async fn require_chart(&self, chart_id: Uuid) -> EngineResult<Chart> {
        self.store
            .get_chart(chart_id)
            .await?
            .ok_or(EngineError::ChartNotFound(chart_id))
    }

    async fn commit(
        &self,
        chart_id: Uuid,
        operation: CascadeOperation,
        batch: WriteBatch,
    ) -> EngineResult<()> {
        self.store
            .commit(batch)
            .await
            .map_err(|source| EngineError::CascadeFailed {
                chart_id,
                operation,
                source,
            })
    }

    // ========================================================================
    // Archive
    // ========================================================================

    /// Archive a chart and its live descendants.
    ///
    /// Actions pointing into the archived set lose their child chart link;
    /// the charts keep `parent_action_id` so `restore` can re-link them.
    pub async fn archive(&self, chart_id: Uuid) -> EngineResult<MutationOutcome> {
        let chart = self.require_chart(chart_id).await?;
        let mut affected = vec![chart_id];
        affected.extend(self.resolver.descendants(chart_id).await?);

        let linking = self
            .store
            .find_actions(&ActionFilter::referencing(affected.clone()))
            .await?;

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for id in &affected {
            batch.update_chart(*id, ChartPatch::archive(now));
        }
        for action in &linking {
            batch.update_action(action.id, ActionPatch::sever_refs_to(affected.clone()));
        }
        self.commit(chart_id, CascadeOperation::Archive, batch).await?;

        let mut outcome = MutationOutcome::new(chart_id, CascadeOperation::Archive, affected);
        outcome.updated_actions = linking.iter().map(|a| a.id).collect();
        info!(
            chart_id = %chart_id,
            affected = outcome.affected_charts.len(),
            severed = outcome.updated_actions.len(),
            "Archived chart subtree"
        );
        self.emit(chart.workspace_id, &outcome);
        Ok(outcome)
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Restore a chart and every chart below it.
    ///
    /// The subtree is found through `parent_action_id`, since archive cut the
    /// forward edges. Each chart re-links to its own parent action; a parent
    /// action that is gone, or that now points at another chart, is dropped
    /// from the chart instead.
    pub async fn restore(&self, chart_id: Uuid) -> EngineResult<MutationOutcome> {
        let chart = self.require_chart(chart_id).await?;
        let mut charts = vec![chart.clone()];
        charts.extend(self.resolver.descendants_via_back_refs(chart_id).await?);

        let parent_ids: Vec<Uuid> = charts.iter().filter_map(|c| c.parent_action_id).collect();
        let parents: HashMap<Uuid, _> = if parent_ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_actions(&ActionFilter::by_ids(parent_ids))
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };

        let mut outcome = MutationOutcome::new(
            chart_id,
            CascadeOperation::Restore,
            charts.iter().map(|c| c.id).collect(),
        );
        let mut batch = WriteBatch::new();
        for c in &charts {
            let mut patch = ChartPatch::unarchive();
            if let Some(action_id) = c.parent_action_id {
                match parents.get(&action_id) {
                    Some(action)
                        if action.child_chart_id.is_none()
                            || action.child_chart_id == Some(c.id) =>
                    {
                        batch.update_action(action_id, ActionPatch::link_child(c.id));
                        outcome.updated_actions.push(action_id);
                    }
                    Some(action) => {
                        warn!(
                            chart_id = %c.id,
                            action_id = %action_id,
                            linked_chart = ?action.child_chart_id,
                            "Parent action was re-telescoped elsewhere; detaching restored chart"
                        );
                        patch = patch.detach_parent();
                        outcome.detached_charts.push(c.id);
                    }
                    None => {
                        warn!(
                            chart_id = %c.id,
                            action_id = %action_id,
                            "Parent action no longer exists; detaching restored chart"
                        );
                        patch = patch.detach_parent();
                        outcome.detached_charts.push(c.id);
                    }
                }
            }
            batch.update_chart(c.id, patch);
        }
        self.commit(chart_id, CascadeOperation::Restore, batch).await?;

        info!(
            chart_id = %chart_id,
            affected = outcome.affected_charts.len(),
            relinked = outcome.updated_actions.len(),
            detached = outcome.detached_charts.len(),
            "Restored chart subtree"
        );
        self.emit(chart.workspace_id, &outcome);
        Ok(outcome)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Delete a chart, severing every action that references it or any of
    /// its descendants.
    ///
    /// With [`DeletePolicy::Orphan`] the descendants survive as detached root
    /// charts; with [`DeletePolicy::Cascade`] they are deleted too.
    pub async fn delete(&self, chart_id: Uuid) -> EngineResult<MutationOutcome> {
        let chart = self.require_chart(chart_id).await?;
        let (forward, back_refs) = tokio::try_join!(
            self.resolver.descendants(chart_id),
            self.resolver.descendants_via_back_refs(chart_id),
        )?;

        let mut seen = HashSet::from([chart_id]);
        let mut affected = vec![chart_id];
        for id in forward.into_iter().chain(back_refs.into_iter().map(|c| c.id)) {
            if seen.insert(id) {
                affected.push(id);
            }
        }

        let deleted: Vec<Uuid> = match self.config.delete_policy {
            DeletePolicy::Orphan => vec![chart_id],
            DeletePolicy::Cascade => affected.clone(),
        };
        let deleted_set: HashSet<Uuid> = deleted.iter().copied().collect();

        // Matches legacy sub_chart_id pointers even when a newer
        // child_chart_id shadows them
        let referencing = self
            .store
            .find_actions(&ActionFilter::referencing(affected.clone()))
            .await?;

        let mut outcome = MutationOutcome::new(chart_id, CascadeOperation::Delete, affected.clone());
        let mut batch = WriteBatch::new();
        for action in referencing
            .iter()
            .filter(|a| !deleted_set.contains(&a.chart_id))
        {
            batch.update_action(action.id, ActionPatch::sever_refs_to(affected.clone()));
            outcome.updated_actions.push(action.id);
        }
        for id in affected.iter().filter(|id| !deleted_set.contains(id)) {
            batch.update_chart(*id, ChartPatch::default().detach_parent());
            outcome.detached_charts.push(*id);
        }
        for id in &deleted {
            batch.delete_chart(*id);
        }
        self.commit(chart_id, CascadeOperation::Delete, batch).await?;
        outcome.deleted_charts = deleted;

        info!(
            chart_id = %chart_id,
            policy = ?self.config.delete_policy,
            deleted = outcome.deleted_charts.len(),
            detached = outcome.detached_charts.len(),
            severed = outcome.updated_actions.len(),
            "Deleted chart"
        );
        self.emit(chart.workspace_id, &outcome);
        Ok(outcome)
    }

    // ========================================================================
    // Telescope
    // ========================================================================

    /// Turn an action into a link to a new child chart
    pub async fn telescope(&self, action_id: Uuid, title: &str) -> EngineResult<Chart> {
        let action = self
            .store
            .get_action(action_id)
            .await?
            .ok_or(EngineError::ActionNotFound(action_id))?;
        if let Some(existing) = action.child_chart_id {
            return Err(EngineError::AlreadyTelescoped {
                action_id,
                chart_id: existing,
            });
        }
        let owner = self.require_chart(action.chart_id).await?;

        let child = Chart::new_child(owner.workspace_id, title, action_id);
        let mut batch = WriteBatch::new();
        batch
            .insert_chart(child.clone())
            .update_action(action_id, ActionPatch::link_child(child.id));
        self.commit(owner.id, CascadeOperation::Telescope, batch).await?;

        info!(
            action_id = %action_id,
            parent_chart = %owner.id,
            chart_id = %child.id,
            "Telescoped action into child chart"
        );
        let mut outcome = MutationOutcome::new(child.id, CascadeOperation::Telescope, vec![child.id]);
        outcome.updated_actions.push(action_id);
        self.emit(owner.workspace_id, &outcome);
        Ok(child)
    }
}
