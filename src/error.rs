//! Error types for the chart engine
//!
//! Two layers:
//! - [`StoreError`]: failures reported by a [`RecordStore`](crate::store::RecordStore)
//! - [`EngineError`]: failures of hierarchy mutations and analytics requests
//!
//! Read paths treat missing records as empty results, so `NotFound` mostly
//! surfaces from mutations.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The five record kinds held by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Chart,
    Tension,
    Action,
    ActionDependency,
    Profile,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chart => write!(f, "chart"),
            Self::Tension => write!(f, "tension"),
            Self::Action => write!(f, "action"),
            Self::ActionDependency => write!(f, "action dependency"),
            Self::Profile => write!(f, "profile"),
        }
    }
}

/// Errors raised by a record store adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record addressed by id does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: Uuid },

    /// The backend could not be reached
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A write batch was refused; none of its writes were applied
    #[error("write batch rejected: {0}")]
    Rejected(String),

    /// A snapshot could not be read or parsed
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

/// A cascading hierarchy operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeOperation {
    Archive,
    Restore,
    Delete,
    Telescope,
}

impl fmt::Display for CascadeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Restore => write!(f, "restore"),
            Self::Delete => write!(f, "delete"),
            Self::Telescope => write!(f, "telescope"),
        }
    }
}

/// Errors returned by the hierarchy and analytics engines
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("chart {0} not found")]
    ChartNotFound(Uuid),

    #[error("action {0} not found")]
    ActionNotFound(Uuid),

    #[error("action {action_id} is already telescoped into chart {chart_id}")]
    AlreadyTelescoped { action_id: Uuid, chart_id: Uuid },

    /// A cascade commit failed; the batch is atomic so nothing was applied
    #[error("{operation} of chart {chart_id} failed: {source}")]
    CascadeFailed {
        chart_id: Uuid,
        operation: CascadeOperation,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the error only means "this record is gone"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChartNotFound(_)
                | Self::ActionNotFound(_)
                | Self::Store(StoreError::NotFound { .. })
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
