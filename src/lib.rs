//! Tension Orchestrator
//!
//! Core of a structural-tension planning tool:
//! - Telescoping chart hierarchy (depth, descendants, project groups)
//! - Transactional archive / restore / delete / telescope cascades
//! - Dashboard analytics: status rollups, delay cascades over the
//!   "blocks" dependency graph, ranked recommendations
//! - Change events broadcast to notification senders
//!
//! ```
//! use std::sync::Arc;
//! use tension_orchestrator::store::{Chart, MemoryStore};
//! use tension_orchestrator::{AppState, Config};
//!
//! # tokio_test::block_on(async {
//! let chart = Chart::new(uuid::Uuid::new_v4(), "Launch v2");
//! let store = MemoryStore::new().with_chart(chart.clone()).await;
//! let state = AppState::new(Arc::new(store), Config::default());
//! assert_eq!(state.resolver().depth(chart.id).await.unwrap(), 1);
//! # });
//! ```

pub mod analytics;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

use analytics::{AnalyticsConfig, DashboardEngine};
use anyhow::{Context, Result};
use events::EventBus;
use hierarchy::{DeletePolicy, HierarchyConfig, HierarchyMutator, HierarchyResolver};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use store::{MemoryStore, RecordStore};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub hierarchy: HierarchyConfig,
    pub analytics: AnalyticsConfig,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub hierarchy: HierarchyConfig,
    pub analytics: AnalyticsConfig,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. Numeric env vars
    /// that fail to parse are ignored; an unknown `CHARTS_DELETE_POLICY` is
    /// an error.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let YamlConfig {
            mut hierarchy,
            mut analytics,
        } = Self::load_yaml(yaml_path);

        if let Ok(raw) = std::env::var("CHARTS_DELETE_POLICY") {
            hierarchy.delete_policy = DeletePolicy::from_str(&raw)
                .map_err(anyhow::Error::msg)
                .context("invalid CHARTS_DELETE_POLICY")?;
        }
        hierarchy.max_depth = env_or("CHARTS_MAX_DEPTH", hierarchy.max_depth);
        analytics.stale_after_days = env_or("CHARTS_STALE_AFTER_DAYS", analytics.stale_after_days);
        analytics.upcoming_window_days =
            env_or("CHARTS_UPCOMING_WINDOW_DAYS", analytics.upcoming_window_days);
        analytics.max_graph_nodes = env_or("CHARTS_MAX_GRAPH_NODES", analytics.max_graph_nodes);
        analytics.max_graph_steps = env_or("CHARTS_MAX_GRAPH_STEPS", analytics.max_graph_steps);

        Ok(Self {
            hierarchy,
            analytics,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

fn env_or<T: FromStr>(var: &str, fallback: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(fallback)
}

// ============================================================================
// Application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub config: Arc<Config>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            events: EventBus::default(),
        }
    }

    /// State backed by a `MemoryStore` seeded from a JSON snapshot file
    pub fn from_snapshot(path: &Path, config: Config) -> Result<Self> {
        let store = MemoryStore::load_snapshot(path)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn resolver(&self) -> HierarchyResolver {
        HierarchyResolver::new(self.store.clone(), self.config.hierarchy.clone())
    }

    /// Mutator publishing its change events on this state's bus
    pub fn mutator(&self) -> HierarchyMutator {
        HierarchyMutator::new(self.store.clone(), self.config.hierarchy.clone())
            .with_event_emitter(Arc::new(self.events.clone()))
    }

    pub fn dashboard(&self) -> DashboardEngine {
        DashboardEngine::new(
            self.store.clone(),
            self.config.analytics.clone(),
            self.config.hierarchy.clone(),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
