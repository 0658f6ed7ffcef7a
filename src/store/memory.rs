//! In-memory implementation of RecordStore.
//!
//! Backs the CLI (loaded from a JSON snapshot) and the test suites.
//! All tables live behind one `tokio::sync::RwLock` so that `commit` can
//! validate and apply a whole batch under a single write lock.

use crate::error::{RecordKind, StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::batch::{ActionPatch, ChartPatch, Write, WriteBatch};
use super::filters::{ActionFilter, ChartFilter, DependencyFilter};
use super::models::*;
use super::traits::RecordStore;

/// Serializable dump of every record kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub charts: Vec<Chart>,
    pub tensions: Vec<Tension>,
    pub actions: Vec<ActionRecord>,
    pub dependencies: Vec<ActionDependency>,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    charts: HashMap<Uuid, Chart>,
    tensions: HashMap<Uuid, Tension>,
    actions: HashMap<Uuid, ActionRecord>,
    /// Action ids in insertion order
    action_order: Vec<Uuid>,
    dependencies: Vec<ActionDependency>,
    profiles: HashMap<Uuid, Profile>,
}

impl Tables {
    fn apply(&mut self, write: Write) -> StoreResult<()> {
        match write {
            Write::InsertChart(chart) => {
                if self.charts.contains_key(&chart.id) {
                    return Err(StoreError::Rejected(format!(
                        "chart {} already exists",
                        chart.id
                    )));
                }
                self.charts.insert(chart.id, chart);
            }
            Write::UpdateChart { id, patch } => {
                let chart = self.charts.get_mut(&id).ok_or(StoreError::NotFound {
                    kind: RecordKind::Chart,
                    id,
                })?;
                apply_chart_patch(chart, patch);
            }
            Write::UpdateAction { id, patch } => {
                let record = self.actions.get_mut(&id).ok_or(StoreError::NotFound {
                    kind: RecordKind::Action,
                    id,
                })?;
                apply_action_patch(record, patch);
            }
            Write::DeleteChart(id) => {
                if self.charts.remove(&id).is_none() {
                    return Err(StoreError::NotFound {
                        kind: RecordKind::Chart,
                        id,
                    });
                }
                self.tensions.retain(|_, t| t.chart_id != id);
                let removed: HashSet<Uuid> = self
                    .actions
                    .values()
                    .filter(|a| a.chart_id == id)
                    .map(|a| a.id)
                    .collect();
                self.actions.retain(|aid, _| !removed.contains(aid));
                self.action_order.retain(|aid| !removed.contains(aid));
                self.dependencies.retain(|d| {
                    !removed.contains(&d.blocker_action_id) && !removed.contains(&d.blocked_action_id)
                });
            }
        }
        Ok(())
    }

    fn insert_action(&mut self, record: ActionRecord) {
        if !self.actions.contains_key(&record.id) {
            self.action_order.push(record.id);
        }
        self.actions.insert(record.id, record);
    }
}

fn apply_chart_patch(chart: &mut Chart, patch: ChartPatch) {
    if let Some(archived_at) = patch.archived_at {
        chart.archived_at = archived_at;
    }
    if let Some(parent) = patch.parent_action_id {
        chart.parent_action_id = parent;
    }
}

fn apply_action_patch(record: &mut ActionRecord, patch: ActionPatch) {
    if !patch.drop_refs.is_empty() {
        record.drop_chart_refs(&patch.drop_refs);
    }
    if let Some(child) = patch.child_chart_id {
        record.set_child_chart(Some(child));
    }
}

/// In-memory record store
pub struct MemoryStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Build a store holding every record of the snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut tables = Tables::default();
        for chart in snapshot.charts {
            tables.charts.insert(chart.id, chart);
        }
        for tension in snapshot.tensions {
            tables.tensions.insert(tension.id, tension);
        }
        for record in snapshot.actions {
            tables.insert_action(record);
        }
        tables.dependencies = snapshot.dependencies;
        for profile in snapshot.profiles {
            tables.profiles.insert(profile.id, profile);
        }
        debug!(
            charts = tables.charts.len(),
            actions = tables.actions.len(),
            dependencies = tables.dependencies.len(),
            "Loaded snapshot into memory store"
        );
        Self {
            tables: RwLock::new(tables),
            available: AtomicBool::new(true),
        }
    }

    /// Read a JSON snapshot from disk
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Dump the current content (actions in stored form)
    pub async fn snapshot(&self) -> Snapshot {
        let t = self.tables.read().await;
        Snapshot {
            charts: t.charts.values().cloned().collect(),
            tensions: t.tensions.values().cloned().collect(),
            actions: t
                .action_order
                .iter()
                .filter_map(|id| t.actions.get(id).cloned())
                .collect(),
            dependencies: t.dependencies.clone(),
            profiles: t.profiles.values().cloned().collect(),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw stored record, legacy fields included
    pub async fn action_record(&self, id: Uuid) -> Option<ActionRecord> {
        self.tables.read().await.actions.get(&id).cloned()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".into()))
        }
    }

    // ========================================================================
    // Builder / seeding methods
    // ========================================================================

    /// Seed a chart into the store.
    pub async fn with_chart(self, chart: Chart) -> Self {
        self.tables.write().await.charts.insert(chart.id, chart);
        self
    }

    /// Seed a tension into the store.
    pub async fn with_tension(self, tension: Tension) -> Self {
        self.tables.write().await.tensions.insert(tension.id, tension);
        self
    }

    /// Seed an action into the store.
    pub async fn with_action(self, action: Action) -> Self {
        self.tables.write().await.insert_action(action.to_record());
        self
    }

    /// Seed a "blocks" edge into the store.
    pub async fn with_dependency(self, blocker: Uuid, blocked: Uuid) -> Self {
        self.tables
            .write()
            .await
            .dependencies
            .push(ActionDependency::new(blocker, blocked));
        self
    }

    /// Seed a profile into the store.
    pub async fn with_profile(self, profile: Profile) -> Self {
        self.tables.write().await.profiles.insert(profile.id, profile);
        self
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_chart(&self, id: Uuid) -> StoreResult<Option<Chart>> {
        self.ensure_available()?;
        Ok(self.tables.read().await.charts.get(&id).cloned())
    }

    async fn find_charts(&self, filter: &ChartFilter) -> StoreResult<Vec<Chart>> {
        self.ensure_available()?;
        let t = self.tables.read().await;
        let mut charts: Vec<Chart> = t
            .charts
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        charts.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(charts)
    }

    async fn insert_chart(&self, chart: &Chart) -> StoreResult<()> {
        self.ensure_available()?;
        self.tables.write().await.charts.insert(chart.id, chart.clone());
        Ok(())
    }

    async fn find_tensions(&self, chart_ids: &[Uuid]) -> StoreResult<Vec<Tension>> {
        self.ensure_available()?;
        let t = self.tables.read().await;
        let mut tensions: Vec<Tension> = t
            .tensions
            .values()
            .filter(|tn| chart_ids.contains(&tn.chart_id))
            .cloned()
            .collect();
        tensions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tensions)
    }

    async fn insert_tension(&self, tension: &Tension) -> StoreResult<()> {
        self.ensure_available()?;
        self.tables
            .write()
            .await
            .tensions
            .insert(tension.id, tension.clone());
        Ok(())
    }

    async fn get_action(&self, id: Uuid) -> StoreResult<Option<Action>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .await
            .actions
            .get(&id)
            .map(ActionRecord::normalize))
    }

    async fn find_actions(&self, filter: &ActionFilter) -> StoreResult<Vec<Action>> {
        self.ensure_available()?;
        let t = self.tables.read().await;
        Ok(t.action_order
            .iter()
            .filter_map(|id| t.actions.get(id))
            .filter(|r| {
                filter.workspace_id.map_or(true, |ws| {
                    t.charts
                        .get(&r.chart_id)
                        .is_some_and(|c| c.workspace_id == ws)
                })
            })
            .filter(|r| filter.matches_record(r))
            .map(ActionRecord::normalize)
            .filter(|a| filter.matches(a))
            .collect())
    }

    async fn insert_action(&self, record: &ActionRecord) -> StoreResult<()> {
        self.ensure_available()?;
        self.tables.write().await.insert_action(record.clone());
        Ok(())
    }

    async fn find_dependencies(
        &self,
        filter: &DependencyFilter,
    ) -> StoreResult<Vec<ActionDependency>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .await
            .dependencies
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn insert_dependency(&self, dependency: &ActionDependency) -> StoreResult<()> {
        self.ensure_available()?;
        self.tables
            .write()
            .await
            .dependencies
            .push(dependency.clone());
        Ok(())
    }

    async fn find_profiles_by_email(&self, emails: &[String]) -> StoreResult<Vec<Profile>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .await
            .profiles
            .values()
            .filter(|p| emails.iter().any(|e| e == p.email.trim()))
            .cloned()
            .collect())
    }

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.ensure_available()?;
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.id, profile.clone());
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.ensure_available()?;
        let mut guard = self.tables.write().await;
        // Apply to a scratch copy; swap only if every write succeeded
        let mut scratch = guard.clone();
        let count = batch.len();
        for write in batch {
            scratch.apply(write).map_err(|e| match e {
                StoreError::NotFound { kind, id } => {
                    StoreError::Rejected(format!("{} {} does not exist", kind, id))
                }
                other => other,
            })?;
        }
        *guard = scratch;
        debug!(writes = count, "Committed write batch");
        Ok(())
    }
}
