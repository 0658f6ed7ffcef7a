//! Project groups: depth-1 master charts with their descendants in layers

use crate::store::Chart;
use std::collections::{BTreeMap, HashMap};

use super::index::HierarchyIndex;
use super::models::{ChartRef, Layer, ProjectGroup};

/// Group `charts` under their masters.
///
/// `charts` must already be in display order (most recently updated first);
/// that order is kept inside every layer. Charts absent from `charts`
/// (archived, other workspace) are skipped even if the index reaches them.
///
/// A chart caught in (or hanging below) a parent cycle falls back to depth 1,
/// so it is listed as its own master with no layers. Every chart appears in
/// exactly one group.
pub fn build_project_groups(charts: &[Chart], index: &HierarchyIndex) -> Vec<ProjectGroup> {
    charts
        .iter()
        .filter(|chart| index.depth(chart.id) == 1)
        .map(|master| {
            let levels: HashMap<_, _> = if index.has_cycle_above(master.id) {
                HashMap::new()
            } else {
                index.descendants_with_level(master.id).into_iter().collect()
            };
            let mut layers: BTreeMap<usize, Vec<ChartRef>> = BTreeMap::new();
            for chart in charts {
                if let Some(level) = levels.get(&chart.id) {
                    layers.entry(level + 1).or_default().push(ChartRef::from(chart));
                }
            }
            ProjectGroup {
                master: ChartRef::from(master),
                layers: layers
                    .into_iter()
                    .map(|(depth, charts)| Layer { depth, charts })
                    .collect(),
            }
        })
        .collect()
}
