//! Change events published after a hierarchy cascade commits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CascadeOperation;
use crate::hierarchy::MutationOutcome;

/// One committed cascade, as seen by notification senders.
///
/// Must be Clone for `tokio::sync::broadcast`. The outcome's fields are
/// flattened, so a subscriber reads `operation`, `chart_id` and the id lists
/// at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartEvent {
    pub workspace_id: Uuid,
    #[serde(flatten)]
    pub outcome: MutationOutcome,
    pub committed_at: DateTime<Utc>,
}

impl ChartEvent {
    pub fn new(workspace_id: Uuid, outcome: MutationOutcome) -> Self {
        Self {
            workspace_id,
            outcome,
            committed_at: Utc::now(),
        }
    }

    pub fn operation(&self) -> CascadeOperation {
        self.outcome.operation
    }

    pub fn chart_id(&self) -> Uuid {
        self.outcome.chart_id
    }
}

/// Sink for change notifications.
///
/// Emitting is fire-and-forget: implementations must never block or fail
/// the cascade that produced the event.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: ChartEvent);
}
