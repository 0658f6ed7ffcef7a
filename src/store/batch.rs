//! Atomic write batches
//!
//! Every multi-record cascade is expressed as one [`WriteBatch`] and handed
//! to [`RecordStore::commit`](super::RecordStore::commit), which applies all
//! writes or none of them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::Chart;

/// Partial update of a chart. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartPatch {
    pub archived_at: Option<Option<DateTime<Utc>>>,
    pub parent_action_id: Option<Option<Uuid>>,
}

impl ChartPatch {
    pub fn archive(at: DateTime<Utc>) -> Self {
        Self {
            archived_at: Some(Some(at)),
            ..Default::default()
        }
    }

    pub fn unarchive() -> Self {
        Self {
            archived_at: Some(None),
            ..Default::default()
        }
    }

    pub fn detach_parent(mut self) -> Self {
        self.parent_action_id = Some(None);
        self
    }
}

/// Partial update of an action's child chart pointers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPatch {
    /// Child pointers (current or legacy `sub_chart_id`) naming one of these
    /// charts are cleared; pointers elsewhere survive
    pub drop_refs: Vec<Uuid>,
    /// Sets `child_chart_id` and the "has child chart" flag together; also
    /// drops the legacy `sub_chart_id`. Applied after `drop_refs`.
    pub child_chart_id: Option<Uuid>,
}

impl ActionPatch {
    pub fn link_child(chart_id: Uuid) -> Self {
        Self {
            child_chart_id: Some(chart_id),
            ..Default::default()
        }
    }

    /// Cut the action's links into `chart_ids` only
    pub fn sever_refs_to(chart_ids: Vec<Uuid>) -> Self {
        Self {
            drop_refs: chart_ids,
            ..Default::default()
        }
    }
}

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertChart(Chart),
    UpdateChart { id: Uuid, patch: ChartPatch },
    UpdateAction { id: Uuid, patch: ActionPatch },
    /// Removes the chart with its tensions, actions and their dependency edges
    DeleteChart(Uuid),
}

/// Ordered list of writes applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn update_chart(&mut self, id: Uuid, patch: ChartPatch) -> &mut Self {
        self.push(Write::UpdateChart { id, patch })
    }

    pub fn update_action(&mut self, id: Uuid, patch: ActionPatch) -> &mut Self {
        self.push(Write::UpdateAction { id, patch })
    }

    pub fn delete_chart(&mut self, id: Uuid) -> &mut Self {
        self.push(Write::DeleteChart(id))
    }

    pub fn insert_chart(&mut self, chart: Chart) -> &mut Self {
        self.push(Write::InsertChart(chart))
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}
