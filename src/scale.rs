//! Linear scales and axis ticks.
//!
//! One shared horizontal map, fixed for the dashboard's lifetime; one
//! vertical map per panel, recomputed from the panel's own data on every
//! change. The previous vertical map is handed back so transitions can
//! interpolate the axis rather than snap it.

use std::collections::HashMap;

use crate::config::Config;

/// Domain below this collapses to an epsilon span so the mapping stays
/// finite for empty or all-zero series.
pub const Y_DOMAIN_EPSILON: f64 = 1e-9;

/// Affine map from a data domain onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl AffineMap {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }

    /// Interpolate both endpoints of two maps sharing a range.
    pub fn lerp(from: &AffineMap, to: &AffineMap, t: f64) -> AffineMap {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        AffineMap {
            domain: (mix(from.domain.0, to.domain.0), mix(from.domain.1, to.domain.1)),
            range: (mix(from.range.0, to.range.0), mix(from.range.1, to.range.1)),
        }
    }

    /// Round tick values covering the domain, on a 1/2/5 decade step.
    pub fn ticks(&self, target_count: usize) -> Vec<f64> {
        let (min, max) = self.domain;
        let span = max - min;
        if !span.is_finite() || span.abs() < f64::MIN_POSITIVE || target_count == 0 {
            return vec![min];
        }
        let rough_step = span / target_count as f64;
        let mag = 10.0_f64.powf(rough_step.abs().log10().floor());
        let normalized = rough_step / mag;
        let nice_step = if normalized <= 1.0 {
            mag
        } else if normalized <= 2.0 {
            mag * 2.0
        } else if normalized <= 5.0 {
            mag * 5.0
        } else {
            mag * 10.0
        };
        let start = (min / nice_step).ceil() * nice_step;
        let mut ticks = Vec::new();
        let mut i = 0u32;
        loop {
            let v = start + nice_step * i as f64;
            if v > max + nice_step * 0.01 {
                break;
            }
            ticks.push(v);
            i += 1;
        }
        ticks
    }
}

/// The new vertical map for a panel alongside the one it replaced.
#[derive(Debug, Clone, Copy)]
pub struct YScaleChange {
    pub new: AffineMap,
    pub previous: Option<AffineMap>,
}

pub struct ScaleManager {
    x: AffineMap,
    plot_height: f64,
    tick_count: usize,
    y_by_panel: HashMap<String, AffineMap>,
}

impl ScaleManager {
    pub fn new(cfg: &Config) -> Self {
        Self {
            // Constructed once; never recomputed.
            x: AffineMap::new((0.0, cfg.age_max), (0.0, cfg.plot_width())),
            plot_height: cfg.plot_height(),
            tick_count: cfg.tick_count,
            y_by_panel: HashMap::new(),
        }
    }

    pub fn x(&self) -> &AffineMap {
        &self.x
    }

    pub fn x_ticks(&self) -> Vec<f64> {
        self.x.ticks(self.tick_count)
    }

    pub fn tick_count(&self) -> usize {
        self.tick_count
    }

    /// Recompute the panel's vertical map from its current max rate and
    /// return it with the previously stored map.
    pub fn y_scale_for(&mut self, panel: &str, max_rate: f64) -> YScaleChange {
        let max = if max_rate.is_finite() && max_rate > 0.0 {
            max_rate
        } else {
            Y_DOMAIN_EPSILON
        };
        let new = AffineMap::new((0.0, max), (self.plot_height, 0.0));
        let previous = self.y_by_panel.insert(panel.to_string(), new);
        YScaleChange { new, previous }
    }

    pub fn current_y(&self, panel: &str) -> Option<&AffineMap> {
        self.y_by_panel.get(panel)
    }

    pub fn drop_panel(&mut self, panel: &str) {
        self.y_by_panel.remove(panel);
    }
}
