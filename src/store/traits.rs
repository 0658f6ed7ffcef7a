//! RecordStore trait definition
//!
//! Defines the narrow interface the chart engine needs from persistence:
//! lookups by id, filtered (and batched) finds, inserts, and one atomic
//! write primitive used by every cascade.

use crate::error::StoreResult;
use async_trait::async_trait;
use uuid::Uuid;

use super::batch::WriteBatch;
use super::filters::{ActionFilter, ChartFilter, DependencyFilter};
use super::models::*;

/// Abstract interface over the five record kinds.
///
/// Implementations normalize legacy action fields at the read boundary:
/// every `Action` returned here is canonical.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ========================================================================
    // Charts
    // ========================================================================

    /// Get a chart by ID
    async fn get_chart(&self, id: Uuid) -> StoreResult<Option<Chart>>;

    /// Find charts matching a filter, most recently updated first
    async fn find_charts(&self, filter: &ChartFilter) -> StoreResult<Vec<Chart>>;

    /// Insert a chart
    async fn insert_chart(&self, chart: &Chart) -> StoreResult<()>;

    // ========================================================================
    // Tensions
    // ========================================================================

    /// List tensions of the given charts
    async fn find_tensions(&self, chart_ids: &[Uuid]) -> StoreResult<Vec<Tension>>;

    /// Insert a tension
    async fn insert_tension(&self, tension: &Tension) -> StoreResult<()>;

    // ========================================================================
    // Actions
    // ========================================================================

    /// Get an action by ID
    async fn get_action(&self, id: Uuid) -> StoreResult<Option<Action>>;

    /// Find actions matching a filter, in creation order
    async fn find_actions(&self, filter: &ActionFilter) -> StoreResult<Vec<Action>>;

    /// Insert an action in its stored form
    async fn insert_action(&self, record: &ActionRecord) -> StoreResult<()>;

    // ========================================================================
    // Dependencies and profiles
    // ========================================================================

    /// Find dependency edges matching a filter
    async fn find_dependencies(&self, filter: &DependencyFilter)
        -> StoreResult<Vec<ActionDependency>>;

    /// Insert a dependency edge (duplicates and cycles are accepted)
    async fn insert_dependency(&self, dependency: &ActionDependency) -> StoreResult<()>;

    /// Find profiles whose email exactly matches one of `emails`
    async fn find_profiles_by_email(&self, emails: &[String]) -> StoreResult<Vec<Profile>>;

    /// Insert a profile
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()>;

    // ========================================================================
    // Atomic writes
    // ========================================================================

    /// Apply every write of the batch, or none of them.
    ///
    /// Updates of a missing record reject the whole batch.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}
