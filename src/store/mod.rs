//! Record store seam: models, filters, the `RecordStore` trait and an
//! in-memory implementation

pub mod batch;
pub mod filters;
pub mod memory;
pub mod models;
pub mod traits;

pub use batch::{ActionPatch, ChartPatch, Write, WriteBatch};
pub use filters::{ActionFilter, ChartFilter, DependencyFilter};
pub use memory::{MemoryStore, Snapshot};
pub use models::*;
pub use traits::RecordStore;
