//! Change notifications for chart cascades
//!
//! - `ChartEvent`: one committed archive / restore / delete / telescope
//! - `EventEmitter`: the sink trait injected into the hierarchy mutator
//! - `EventBus`: broadcast channel distributing events to subscribers

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{ChartEvent, EventEmitter};
