//! Dashboard analytics
//!
//! This module provides:
//! - Status counts and assignee rosters per chart (`aggregation`)
//! - The reachable "blocks" graph loaded from overdue seeds (`dependency`)
//! - Delay cascade trees with cycle-safe traversal (`cascade`)
//! - Ranked lists and recommendations (`ranking`)
//! - [`DashboardEngine`], the request-scoped entry point (`engine`)

pub mod aggregation;
pub mod cascade;
pub mod dependency;
pub mod engine;
pub mod models;
pub mod ranking;

pub use aggregation::{count_statuses, resolve_assignees, AggregationBuilder};
pub use cascade::{build_cascades, cascade_roots, CascadeContext};
pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use engine::DashboardEngine;
pub use models::*;
pub use ranking::rank_recommendations;
