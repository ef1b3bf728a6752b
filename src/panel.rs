//! Panel materialization and keyed reconciliation.
//!
//! The panel set must equal exactly the set of distinct categories present
//! in the active pathway's data. `reconcile` compares by category identity
//! and returns explicit create/keep/remove sets; creation is idempotent and
//! only ever runs on first render or a pathway switch.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::curve::{path_for, PathGeometry, RenderMode};
use crate::data::{CategoryPanelData, Sex};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::scale::{AffineMap, ScaleManager};
use crate::surface::{
    format_age, format_rate_per_1000, series_color, AxisTickSpec, PathSpec, Surface, KEY_LABELS,
};

/// Last-presented state of one visible category.
#[derive(Debug, Clone)]
pub struct PanelState {
    pub category: String,
    pub label: String,
    /// Upper bound of the current vertical domain.
    pub y_max: f64,
    /// Last-presented geometry per sex. The entry itself is the stable
    /// series identity across transitions.
    pub drawn: BTreeMap<Sex, PathGeometry>,
    /// Last-presented y-axis ticks.
    pub y_ticks: Vec<AxisTickSpec>,
}

/// Materialized panels in creation order.
#[derive(Debug, Default)]
pub struct PanelSet {
    order: Vec<String>,
    panels: HashMap<String, PanelState>,
}

impl PanelSet {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.panels.contains_key(category)
    }

    pub fn get(&self, category: &str) -> Option<&PanelState> {
        self.panels.get(category)
    }

    pub fn get_mut(&mut self, category: &str) -> Option<&mut PanelState> {
        self.panels.get_mut(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn insert(&mut self, state: PanelState) {
        if !self.panels.contains_key(&state.category) {
            self.order.push(state.category.clone());
        }
        self.panels.insert(state.category.clone(), state);
    }

    pub fn remove(&mut self, category: &str) -> Option<PanelState> {
        self.order.retain(|c| c != category);
        self.panels.remove(category)
    }
}

/// Explicit keyed-diff outcome, in data order for create/keep and set order
/// for remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_create: Vec<String>,
    pub to_keep: Vec<String>,
    pub to_remove: Vec<String>,
}

/// Compare the requested category set against materialized panels by
/// category identity. Pure; re-running against an unchanged set yields
/// empty create/remove.
pub fn reconcile(set: &PanelSet, data: &[CategoryPanelData]) -> ReconcilePlan {
    let requested: HashSet<&str> = data.iter().map(|d| d.category.as_str()).collect();

    let mut to_create = Vec::new();
    let mut to_keep = Vec::new();
    for d in data {
        if set.contains(&d.category) {
            to_keep.push(d.category.clone());
        } else {
            to_create.push(d.category.clone());
        }
    }
    let to_remove = set
        .categories()
        .filter(|c| !requested.contains(c))
        .map(|c| c.to_string())
        .collect();

    ReconcilePlan {
        to_create,
        to_keep,
        to_remove,
    }
}

pub(crate) fn x_axis_specs(x: &AffineMap, values: &[f64]) -> Vec<AxisTickSpec> {
    values
        .iter()
        .map(|&v| AxisTickSpec {
            value: v,
            position: x.map(v),
            label: format_age(v),
            dashed_gridline: false,
        })
        .collect()
}

/// Dashed gridlines everywhere except the first tick, labels per-1000.
pub(crate) fn y_axis_specs(scale: &AffineMap, values: &[f64]) -> Vec<AxisTickSpec> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| AxisTickSpec {
            value: v,
            position: scale.map(v),
            label: format_rate_per_1000(v),
            dashed_gridline: i != 0,
        })
        .collect()
}

pub struct PanelLayoutEngine;

impl PanelLayoutEngine {
    /// Materialize a new panel: initial y-domain from its own data, then a
    /// non-animated first draw of title, axes, curves, and legend.
    pub fn create_panel(
        &self,
        set: &mut PanelSet,
        data: &CategoryPanelData,
        scales: &mut ScaleManager,
        mode: RenderMode,
        surface: &mut dyn Surface,
    ) {
        if set.contains(&data.category) {
            // already materialized: creation must never duplicate a panel
            return;
        }

        let y_max = data.max_rate();
        let change = scales.y_scale_for(&data.category, y_max);
        let y_ticks = y_axis_specs(&change.new, &change.new.ticks(scales.tick_count()));

        surface.create_panel(&data.category, &data.label);
        surface.draw_x_axis(&data.category, &x_axis_specs(scales.x(), &scales.x_ticks()));
        surface.draw_y_axis(&data.category, &y_ticks);

        let mut drawn = BTreeMap::new();
        for sex in Sex::BOTH {
            if let Some(series) = data.series(sex) {
                let geometry = path_for(series, mode, scales.x(), &change.new);
                surface.draw_series(
                    &data.category,
                    sex,
                    &PathSpec {
                        geometry: geometry.clone(),
                        color: series_color(sex),
                        opacity: 1.0,
                    },
                );
                drawn.insert(sex, geometry);
            }
        }
        surface.draw_legend(&data.category, &KEY_LABELS);

        set.insert(PanelState {
            category: data.category.clone(),
            label: data.label.clone(),
            y_max,
            drawn,
            y_ticks,
        });

        log(
            Level::Debug,
            Domain::Panel,
            "panel_created",
            obj(&[
                ("category", v_str(&data.category)),
                ("y_max", serde_json::json!(y_max)),
            ]),
        );
    }

    /// Discard a panel and its state. No animation.
    pub fn remove_panel(
        &self,
        set: &mut PanelSet,
        category: &str,
        scales: &mut ScaleManager,
        surface: &mut dyn Surface,
    ) {
        if set.remove(category).is_some() {
            scales.drop_panel(category);
            surface.remove_panel(category);
            log(
                Level::Debug,
                Domain::Panel,
                "panel_removed",
                obj(&[("category", v_str(category))]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::surface::RecordingSurface;

    fn panel_data(category: &str) -> CategoryPanelData {
        let mut d = CategoryPanelData::empty(category, category);
        d.series_by_sex
            .insert(Sex::F, vec![(0.0, 0.01), (1.0, 0.02)]);
        d
    }

    fn materialize(set: &mut PanelSet, categories: &[&str]) {
        let cfg = Config::default();
        let mut scales = ScaleManager::new(&cfg);
        let mut surface = RecordingSurface::new();
        for c in categories {
            PanelLayoutEngine.create_panel(
                set,
                &panel_data(c),
                &mut scales,
                RenderMode::Raw,
                &mut surface,
            );
        }
    }

    #[test]
    fn reconcile_partitions_by_category_identity() {
        let mut set = PanelSet::default();
        materialize(&mut set, &["amb", "walkin"]);
        let requested = vec![panel_data("walkin"), panel_data("emer")];
        let plan = reconcile(&set, &requested);
        assert_eq!(plan.to_create, vec!["emer"]);
        assert_eq!(plan.to_keep, vec!["walkin"]);
        assert_eq!(plan.to_remove, vec!["amb"]);
    }

    #[test]
    fn reconcile_is_idempotent_for_unchanged_sets() {
        let mut set = PanelSet::default();
        materialize(&mut set, &["amb", "walkin"]);
        let requested = vec![panel_data("amb"), panel_data("walkin")];
        let plan = reconcile(&set, &requested);
        assert!(plan.to_create.is_empty());
        assert!(plan.to_remove.is_empty());
        assert_eq!(plan.to_keep.len(), 2);
    }

    #[test]
    fn create_panel_never_duplicates() {
        let cfg = Config::default();
        let mut set = PanelSet::default();
        let mut scales = ScaleManager::new(&cfg);
        let mut surface = RecordingSurface::new();
        let data = panel_data("amb");
        PanelLayoutEngine.create_panel(&mut set, &data, &mut scales, RenderMode::Raw, &mut surface);
        PanelLayoutEngine.create_panel(&mut set, &data, &mut scales, RenderMode::Raw, &mut surface);
        assert_eq!(set.len(), 1);
        assert_eq!(surface.panels_created(), vec!["amb"]);
    }

    #[test]
    fn first_draw_sets_domain_from_own_data() {
        let cfg = Config::default();
        let mut set = PanelSet::default();
        let mut scales = ScaleManager::new(&cfg);
        let mut surface = RecordingSurface::new();
        PanelLayoutEngine.create_panel(
            &mut set,
            &panel_data("amb"),
            &mut scales,
            RenderMode::Raw,
            &mut surface,
        );
        let panel = set.get("amb").unwrap();
        assert_eq!(panel.y_max, 0.02);
        assert_eq!(scales.current_y("amb").unwrap().domain, (0.0, 0.02));
        assert_eq!(panel.drawn.len(), 1);
        // first y tick carries the solid gridline
        assert!(!panel.y_ticks[0].dashed_gridline);
        assert!(panel.y_ticks[1].dashed_gridline);
    }

    #[test]
    fn remove_panel_drops_scale_state() {
        let cfg = Config::default();
        let mut set = PanelSet::default();
        let mut scales = ScaleManager::new(&cfg);
        let mut surface = RecordingSurface::new();
        PanelLayoutEngine.create_panel(
            &mut set,
            &panel_data("amb"),
            &mut scales,
            RenderMode::Raw,
            &mut surface,
        );
        PanelLayoutEngine.remove_panel(&mut set, "amb", &mut scales, &mut surface);
        assert!(set.is_empty());
        assert!(scales.current_y("amb").is_none());
        assert_eq!(surface.panels_removed(), vec!["amb"]);
    }
}
