//! Chart hierarchy: telescoped charts derived from `action.child_chart_id`.
//!
//! - [`HierarchyIndex`]: reverse index built once per request
//! - [`HierarchyResolver`]: depth, descendants, details, project groups
//! - [`HierarchyMutator`]: atomic archive/restore/delete/telescope cascades

pub mod groups;
pub mod index;
pub mod models;
pub mod mutator;
pub mod resolver;

pub use groups::build_project_groups;
pub use index::HierarchyIndex;
pub use models::*;
pub use mutator::HierarchyMutator;
pub use resolver::HierarchyResolver;
