//! Animated in-place panel updates with keyed series identity.
//!
//! Each update builds one transition per panel with concurrent tracks: one
//! per surviving sex-keyed series, one for the y-axis, fades for series that
//! appear or disappear. Every track samples the same eased clock, so paths
//! and axis ticks land together exactly `duration` after the call. A new
//! update on a panel still in flight settles the current sample first and
//! interpolates from there, never from a stale pre-animation snapshot.

use crate::config::Config;
use crate::curve::{ease_cubic_in_out, path_for, PathGeometry, RenderMode};
use crate::data::{CategoryPanelData, Sex};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::panel::{y_axis_specs, PanelSet, PanelState};
use crate::scale::{AffineMap, ScaleManager};
use crate::surface::{series_color, PathSpec, Surface};

#[derive(Debug, Clone)]
enum Track {
    /// Series existed before and after: interpolate its geometry.
    Path {
        sex: Sex,
        from: PathGeometry,
        to: PathGeometry,
    },
    /// Series newly appears: fade in at its final shape.
    FadeIn { sex: Sex, geometry: PathGeometry },
    /// Series disappears: fade out, then drop its state.
    FadeOut { sex: Sex, geometry: PathGeometry },
    /// Axis ticks ride an interpolated scale toward their final positions.
    YAxis {
        from: AffineMap,
        to: AffineMap,
        tick_values: Vec<f64>,
    },
}

#[derive(Debug)]
struct PanelTransition {
    category: String,
    started_ms: f64,
    duration_ms: f64,
    tracks: Vec<Track>,
}

impl PanelTransition {
    fn progress(&self, now_ms: f64) -> f64 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.started_ms) / self.duration_ms).clamp(0.0, 1.0)
    }
}

pub struct TransitionController {
    active: Vec<PanelTransition>,
    duration_ms: f64,
    tick_count: usize,
}

impl TransitionController {
    pub fn new(cfg: &Config) -> Self {
        Self {
            active: Vec::new(),
            duration_ms: cfg.transition_ms,
            tick_count: cfg.tick_count,
        }
    }

    pub fn is_animating(&self, category: &str) -> bool {
        self.active.iter().any(|a| a.category == category)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drop any in-flight transition for a discarded panel.
    pub fn cancel(&mut self, category: &str) {
        self.active.retain(|a| a.category != category);
    }

    /// Start a keyed update of one panel toward `data` rendered in `mode`.
    /// The duration is the systemwide constant, not a per-call choice.
    pub fn update(
        &mut self,
        panel: &mut PanelState,
        data: &CategoryPanelData,
        mode: RenderMode,
        scales: &mut ScaleManager,
        now_ms: f64,
    ) {
        // Supersede cleanly: materialize the in-flight sample so the new
        // interpolation starts from current mid-animation geometry.
        let category = panel.category.clone();
        self.settle(&category, now_ms, panel);

        let y_max = data.max_rate();
        let change = scales.y_scale_for(&panel.category, y_max);
        let new_y = change.new;
        let old_y = change.previous.unwrap_or(new_y);
        panel.y_max = y_max;

        let x = *scales.x();
        let mut tracks = vec![Track::YAxis {
            from: old_y,
            to: new_y,
            tick_values: new_y.ticks(self.tick_count),
        }];

        for sex in Sex::BOTH {
            // an all-NaN series produces empty geometry and counts as absent
            let target = data
                .series(sex)
                .map(|s| path_for(s, mode, &x, &new_y))
                .filter(|g| !g.is_empty());
            match (panel.drawn.get(&sex).cloned(), target) {
                (Some(from), Some(to)) => tracks.push(Track::Path { sex, from, to }),
                (None, Some(geometry)) => tracks.push(Track::FadeIn { sex, geometry }),
                (Some(geometry), None) => tracks.push(Track::FadeOut { sex, geometry }),
                (None, None) => {}
            }
        }

        log(
            Level::Debug,
            Domain::Transition,
            "transition_started",
            obj(&[
                ("category", v_str(&panel.category)),
                ("mode", v_str(mode.as_str())),
                ("tracks", serde_json::json!(tracks.len())),
                ("y_max", serde_json::json!(y_max)),
            ]),
        );

        self.active.push(PanelTransition {
            category: panel.category.clone(),
            started_ms: now_ms,
            duration_ms: self.duration_ms,
            tracks,
        });
    }

    /// Advance every active transition to `now_ms`, emit draw calls, and
    /// finalize the ones that completed.
    pub fn tick(&mut self, now_ms: f64, panels: &mut PanelSet, surface: &mut dyn Surface) {
        let mut i = 0;
        while i < self.active.len() {
            let raw = self.active[i].progress(now_ms);
            let category = self.active[i].category.clone();
            let Some(panel) = panels.get_mut(&category) else {
                // panel discarded mid-flight
                self.active.remove(i);
                continue;
            };
            Self::apply(&self.active[i], ease_cubic_in_out(raw), panel, Some(&mut *surface));
            if raw >= 1.0 {
                Self::finalize(&self.active[i], panel, surface);
                self.active.remove(i);
                continue;
            }
            i += 1;
        }
    }

    /// Remove the panel's in-flight transition after writing its sample at
    /// `now_ms` into the panel state.
    fn settle(&mut self, category: &str, now_ms: f64, panel: &mut PanelState) {
        if let Some(pos) = self.active.iter().position(|a| a.category == category) {
            let tr = self.active.remove(pos);
            let t = ease_cubic_in_out(tr.progress(now_ms));
            Self::apply(&tr, t, panel, None);
        }
    }

    /// Sample one transition at eased progress `t`: write the presented
    /// state into the panel and, when a surface is given, draw it. All
    /// tracks share `t`, so axis and paths move concurrently.
    fn apply(
        tr: &PanelTransition,
        t: f64,
        panel: &mut PanelState,
        mut surface: Option<&mut dyn Surface>,
    ) {
        for track in &tr.tracks {
            match track {
                Track::Path { sex, from, to } => {
                    let geometry = PathGeometry::lerp(from, to, t);
                    if let Some(s) = surface.as_deref_mut() {
                        s.draw_series(
                            &tr.category,
                            *sex,
                            &PathSpec {
                                geometry: geometry.clone(),
                                color: series_color(*sex),
                                opacity: 1.0,
                            },
                        );
                    }
                    panel.drawn.insert(*sex, geometry);
                }
                Track::FadeIn { sex, geometry } => {
                    if let Some(s) = surface.as_deref_mut() {
                        s.draw_series(
                            &tr.category,
                            *sex,
                            &PathSpec {
                                geometry: geometry.clone(),
                                color: series_color(*sex),
                                opacity: t,
                            },
                        );
                    }
                    panel.drawn.insert(*sex, geometry.clone());
                }
                Track::FadeOut { sex, geometry } => {
                    if let Some(s) = surface.as_deref_mut() {
                        s.draw_series(
                            &tr.category,
                            *sex,
                            &PathSpec {
                                geometry: geometry.clone(),
                                color: series_color(*sex),
                                opacity: 1.0 - t,
                            },
                        );
                    }
                }
                Track::YAxis {
                    from,
                    to,
                    tick_values,
                } => {
                    let scale_t = AffineMap::lerp(from, to, t);
                    let specs = y_axis_specs(&scale_t, tick_values);
                    if let Some(s) = surface.as_deref_mut() {
                        s.draw_y_axis(&tr.category, &specs);
                    }
                    panel.y_ticks = specs;
                }
            }
        }
    }

    fn finalize(tr: &PanelTransition, panel: &mut PanelState, surface: &mut dyn Surface) {
        for track in &tr.tracks {
            if let Track::FadeOut { sex, .. } = track {
                surface.remove_series(&tr.category, *sex);
                panel.drawn.remove(sex);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{PanelLayoutEngine, PanelSet};
    use crate::surface::RecordingSurface;

    const DUR: f64 = 1800.0;

    fn data_with(f: Option<Vec<(f64, f64)>>, m: Option<Vec<(f64, f64)>>) -> CategoryPanelData {
        let mut d = CategoryPanelData::empty("amb", "Ambulance arrivals");
        if let Some(series) = f {
            d.series_by_sex.insert(Sex::F, series);
        }
        if let Some(series) = m {
            d.series_by_sex.insert(Sex::M, series);
        }
        d
    }

    struct Fixture {
        set: PanelSet,
        scales: ScaleManager,
        transitions: TransitionController,
        surface: RecordingSurface,
    }

    fn fixture(initial: &CategoryPanelData) -> Fixture {
        let cfg = Config::default();
        let mut set = PanelSet::default();
        let mut scales = ScaleManager::new(&cfg);
        let mut surface = RecordingSurface::new();
        PanelLayoutEngine.create_panel(&mut set, initial, &mut scales, RenderMode::Raw, &mut surface);
        Fixture {
            set,
            scales,
            transitions: TransitionController::new(&cfg),
            surface,
        }
    }

    #[test]
    fn path_interpolates_between_old_and_new_geometry() {
        let mut fx = fixture(&data_with(Some(vec![(0.0, 0.0), (100.0, 0.0)]), None));
        let old = fx.set.get("amb").unwrap().drawn[&Sex::F].clone();

        // same y_max so the scale is unchanged and the midpoint is exact
        let new_data = data_with(Some(vec![(0.0, 0.0), (100.0, 0.0)]), None);
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &new_data, RenderMode::Raw, &mut fx.scales, 0.0);

        fx.transitions.tick(DUR / 2.0, &mut fx.set, &mut fx.surface);
        let drawn = fx.surface.last_series("amb", Sex::F).unwrap();
        assert_eq!(drawn.geometry, old); // identical data: no drift mid-flight

        fx.transitions.tick(DUR, &mut fx.set, &mut fx.surface);
        assert_eq!(fx.transitions.active_count(), 0);
    }

    #[test]
    fn axis_and_path_complete_at_the_same_instant() {
        let mut fx = fixture(&data_with(Some(vec![(0.0, 0.01), (100.0, 0.02)]), None));
        let new_data = data_with(Some(vec![(0.0, 0.02), (100.0, 0.04)]), None);
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &new_data, RenderMode::Raw, &mut fx.scales, 100.0);

        // mid-flight: neither track is at its target
        fx.transitions
            .tick(100.0 + DUR / 2.0, &mut fx.set, &mut fx.surface);
        assert_eq!(fx.transitions.active_count(), 1);

        fx.transitions
            .tick(100.0 + DUR, &mut fx.set, &mut fx.surface);
        assert_eq!(fx.transitions.active_count(), 0);

        let panel = fx.set.get("amb").unwrap();
        let y = fx.scales.current_y("amb").unwrap();
        assert_eq!(y.domain, (0.0, 0.04));
        // final tick positions sit on the final scale
        let top = panel.y_ticks.last().unwrap();
        assert!((top.position - y.map(top.value)).abs() < 1e-9);
        // final path sits on the final scale too
        let f = &panel.drawn[&Sex::F];
        assert!((f.points[0].1 - y.map(0.02)).abs() < 1e-9);
    }

    #[test]
    fn superseding_update_rebases_from_mid_animation_geometry() {
        let mut fx = fixture(&data_with(Some(vec![(0.0, 0.0), (100.0, 0.0)]), None));
        // first update: toward a flat 0.02 line under a rescaled axis
        let first = data_with(Some(vec![(0.0, 0.02), (100.0, 0.02)]), None);
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &first, RenderMode::Raw, &mut fx.scales, 0.0);
        fx.transitions.tick(DUR / 2.0, &mut fx.set, &mut fx.surface);
        let mid = fx.set.get("amb").unwrap().drawn[&Sex::F].clone();
        assert!(!mid.points.is_empty());

        // supersede mid-flight without an intervening frame at the new start
        let second = data_with(Some(vec![(0.0, 0.0), (100.0, 0.0)]), None);
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &second, RenderMode::Raw, &mut fx.scales, DUR / 2.0);
        assert_eq!(fx.transitions.active_count(), 1);

        // a frame at the new start presents the mid-flight geometry, not the
        // pre-animation snapshot
        fx.transitions.tick(DUR / 2.0, &mut fx.set, &mut fx.surface);
        let drawn = fx.surface.last_series("amb", Sex::F).unwrap();
        assert_eq!(drawn.geometry, mid);
    }

    #[test]
    fn appearing_series_fades_in_without_shape_interpolation() {
        let mut fx = fixture(&data_with(Some(vec![(0.0, 0.01)]), None));
        let new_data = data_with(
            Some(vec![(0.0, 0.01)]),
            Some(vec![(0.0, 0.005), (100.0, 0.008)]),
        );
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &new_data, RenderMode::Raw, &mut fx.scales, 0.0);

        fx.transitions.tick(DUR / 2.0, &mut fx.set, &mut fx.surface);
        let male = fx.surface.last_series("amb", Sex::M).unwrap();
        assert!((male.opacity - 0.5).abs() < 1e-9);

        fx.transitions.tick(DUR, &mut fx.set, &mut fx.surface);
        let male = fx.surface.last_series("amb", Sex::M).unwrap();
        assert_eq!(male.opacity, 1.0);
        assert!(fx.set.get("amb").unwrap().drawn.contains_key(&Sex::M));
    }

    #[test]
    fn disappearing_series_fades_out_and_drops_state() {
        let mut fx = fixture(&data_with(
            Some(vec![(0.0, 0.01)]),
            Some(vec![(0.0, 0.005)]),
        ));
        let new_data = data_with(Some(vec![(0.0, 0.01)]), None);
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &new_data, RenderMode::Raw, &mut fx.scales, 0.0);

        fx.transitions.tick(DUR / 2.0, &mut fx.set, &mut fx.surface);
        let male = fx.surface.last_series("amb", Sex::M).unwrap();
        assert!((male.opacity - 0.5).abs() < 1e-9);

        fx.transitions.tick(DUR, &mut fx.set, &mut fx.surface);
        assert!(!fx.set.get("amb").unwrap().drawn.contains_key(&Sex::M));
        assert!(fx
            .surface
            .calls
            .iter()
            .any(|c| matches!(c, crate::surface::SurfaceCall::RemoveSeries { sex: Sex::M, .. })));
    }

    #[test]
    fn discarded_panel_drops_its_transition() {
        let mut fx = fixture(&data_with(Some(vec![(0.0, 0.01)]), None));
        let new_data = data_with(Some(vec![(0.0, 0.02)]), None);
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &new_data, RenderMode::Raw, &mut fx.scales, 0.0);
        fx.set.remove("amb");
        fx.transitions.tick(DUR / 2.0, &mut fx.set, &mut fx.surface);
        assert_eq!(fx.transitions.active_count(), 0);
    }

    #[test]
    fn mode_toggle_keeps_the_y_domain() {
        let mut fx = fixture(&data_with(
            Some(vec![(0.0, 0.01), (50.0, 0.02), (100.0, 0.015)]),
            None,
        ));
        let before = *fx.scales.current_y("amb").unwrap();
        let same_data = data_with(
            Some(vec![(0.0, 0.01), (50.0, 0.02), (100.0, 0.015)]),
            None,
        );
        let panel = fx.set.get_mut("amb").unwrap();
        fx.transitions
            .update(panel, &same_data, RenderMode::Smoothed, &mut fx.scales, 0.0);
        assert_eq!(*fx.scales.current_y("amb").unwrap(), before);

        fx.transitions.tick(DUR, &mut fx.set, &mut fx.surface);
        // smoothed geometry has more points than the three raw ones
        let f = &fx.set.get("amb").unwrap().drawn[&Sex::F];
        assert!(f.points.len() > 3);
    }
}
