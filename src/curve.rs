//! Path geometry for age/rate series.
//!
//! Raw mode connects consecutive points with straight segments; smoothed
//! mode samples a Fritsch-Carlson monotone cubic through the same points,
//! which cannot overshoot the observed rate range. Non-finite rates are
//! excluded from geometry, never repaired.

use crate::scale::AffineMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Raw,
    Smoothed,
}

impl From<bool> for RenderMode {
    fn from(smoothed: bool) -> Self {
        if smoothed {
            RenderMode::Smoothed
        } else {
            RenderMode::Raw
        }
    }
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Raw => "raw",
            RenderMode::Smoothed => "smoothed",
        }
    }
}

/// Drawable polyline in pixel space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathGeometry {
    pub points: Vec<(f64, f64)>,
}

impl PathGeometry {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Pointwise interpolation. When the point counts differ, `from` is
    /// index-resampled to `to`'s count first, so series identity survives
    /// data updates that add or drop points.
    pub fn lerp(from: &PathGeometry, to: &PathGeometry, t: f64) -> PathGeometry {
        if from.is_empty() || to.is_empty() {
            return to.clone();
        }
        let source = if from.points.len() == to.points.len() {
            from.points.clone()
        } else {
            from.resample(to.points.len())
        };
        let points = source
            .iter()
            .zip(&to.points)
            .map(|(&(x0, y0), &(x1, y1))| (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t))
            .collect();
        PathGeometry { points }
    }

    fn resample(&self, n: usize) -> Vec<(f64, f64)> {
        if n == 0 {
            return Vec::new();
        }
        if self.points.len() == 1 || n == 1 {
            return vec![self.points[0]; n];
        }
        let last = (self.points.len() - 1) as f64;
        (0..n)
            .map(|i| {
                let pos = i as f64 / (n - 1) as f64 * last;
                let lo = pos.floor() as usize;
                let hi = pos.ceil() as usize;
                let frac = pos - lo as f64;
                let (x0, y0) = self.points[lo];
                let (x1, y1) = self.points[hi];
                (x0 + (x1 - x0) * frac, y0 + (y1 - y0) * frac)
            })
            .collect()
    }
}

/// Symmetric cubic easing applied to every transition clock.
pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Hermite samples per data segment in smoothed mode.
const SMOOTH_SAMPLES: usize = 8;

/// Build drawable geometry for one series. Age order is assumed (the store
/// sorts); points with a non-finite rate are skipped; an empty series yields
/// empty geometry.
pub fn path_for(
    series: &[(f64, f64)],
    mode: RenderMode,
    x: &AffineMap,
    y: &AffineMap,
) -> PathGeometry {
    let pixels: Vec<(f64, f64)> = series
        .iter()
        .filter(|(_, rate)| rate.is_finite())
        .map(|&(age, rate)| (x.map(age), y.map(rate)))
        .collect();

    let points = match mode {
        RenderMode::Raw => pixels,
        RenderMode::Smoothed => monotone_polyline(&pixels),
    };
    PathGeometry { points }
}

/// Sample a monotone cubic (Fritsch-Carlson tangents) through the points.
/// Interior tangents use the slope-limited harmonic form, so each sampled
/// segment stays inside its endpoints' value range.
fn monotone_polyline(pts: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let n = pts.len();
    if n < 3 {
        return pts.to_vec();
    }

    let mut tangents = vec![0.0f64; n];
    let secant = |i: usize| {
        let dx = pts[i + 1].0 - pts[i].0;
        if dx == 0.0 {
            0.0
        } else {
            (pts[i + 1].1 - pts[i].1) / dx
        }
    };

    for i in 1..n - 1 {
        let s0 = secant(i - 1);
        let s1 = secant(i);
        if s0 * s1 <= 0.0 {
            // local extremum: flat tangent prevents overshoot
            tangents[i] = 0.0;
        } else {
            let h0 = pts[i].0 - pts[i - 1].0;
            let h1 = pts[i + 1].0 - pts[i].0;
            let weighted = (s0 * h1 + s1 * h0) / (h0 + h1);
            tangents[i] = weighted
                .abs()
                .min(3.0 * s0.abs().min(s1.abs()))
                .copysign(weighted);
        }
    }
    tangents[0] = endpoint_tangent(secant(0), tangents[1]);
    tangents[n - 1] = endpoint_tangent(secant(n - 2), tangents[n - 2]);

    let mut out = Vec::with_capacity((n - 1) * SMOOTH_SAMPLES + 1);
    out.push(pts[0]);
    for i in 0..n - 1 {
        let (x0, y0) = pts[i];
        let (x1, y1) = pts[i + 1];
        let h = x1 - x0;
        for k in 1..=SMOOTH_SAMPLES {
            let t = k as f64 / SMOOTH_SAMPLES as f64;
            let t2 = t * t;
            let t3 = t2 * t;
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            let yv = h00 * y0 + h10 * h * tangents[i] + h01 * y1 + h11 * h * tangents[i + 1];
            out.push((x0 + t * h, yv));
        }
    }
    out
}

/// One-sided endpoint tangent, clamped against the adjacent secant so the
/// first and last segments do not overshoot either.
fn endpoint_tangent(secant: f64, neighbor: f64) -> f64 {
    if secant == 0.0 {
        return 0.0;
    }
    let m = (3.0 * secant - neighbor) / 2.0;
    if m * secant <= 0.0 {
        0.0
    } else {
        m.abs().min(3.0 * secant.abs()).copysign(secant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AffineMap {
        AffineMap::new((0.0, 100.0), (0.0, 100.0))
    }

    #[test]
    fn raw_mode_maps_points_through_scales() {
        let x = AffineMap::new((0.0, 100.0), (0.0, 300.0));
        let y = AffineMap::new((0.0, 0.02), (280.0, 0.0));
        let geom = path_for(&[(0.0, 0.0), (100.0, 0.02)], RenderMode::Raw, &x, &y);
        assert_eq!(geom.points, vec![(0.0, 280.0), (300.0, 0.0)]);
    }

    #[test]
    fn empty_series_yields_empty_geometry() {
        let geom = path_for(&[], RenderMode::Smoothed, &identity(), &identity());
        assert!(geom.is_empty());
    }

    #[test]
    fn non_finite_rates_are_excluded() {
        let geom = path_for(
            &[(0.0, 1.0), (1.0, f64::NAN), (2.0, 3.0)],
            RenderMode::Raw,
            &identity(),
            &identity(),
        );
        assert_eq!(geom.points.len(), 2);
    }

    #[test]
    fn smoothed_mode_interpolates_the_same_points() {
        let series = [(0.0, 10.0), (10.0, 30.0), (20.0, 20.0)];
        let geom = path_for(&series, RenderMode::Smoothed, &identity(), &identity());
        // Passes through every data point.
        for (age, rate) in series {
            assert!(geom
                .points
                .iter()
                .any(|&(x, y)| (x - age).abs() < 1e-9 && (y - rate).abs() < 1e-9));
        }
        assert!(geom.points.len() > series.len());
    }

    #[test]
    fn monotone_curve_does_not_overshoot() {
        let series = [(0.0, 0.0), (10.0, 1.0), (20.0, 1.2), (30.0, 40.0), (40.0, 41.0)];
        let geom = path_for(&series, RenderMode::Smoothed, &identity(), &identity());
        let min = series.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max = series.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        for &(_, y) in &geom.points {
            assert!(y >= min - 1e-9 && y <= max + 1e-9, "overshoot at {}", y);
        }
    }

    #[test]
    fn monotone_input_stays_monotone() {
        let series = [(0.0, 0.0), (10.0, 5.0), (20.0, 6.0), (30.0, 30.0)];
        let geom = path_for(&series, RenderMode::Smoothed, &identity(), &identity());
        for pair in geom.points.windows(2) {
            assert!(pair[1].1 >= pair[0].1 - 1e-9);
        }
    }

    #[test]
    fn lerp_midpoint_averages_geometry() {
        let a = PathGeometry { points: vec![(0.0, 0.0), (10.0, 10.0)] };
        let b = PathGeometry { points: vec![(0.0, 20.0), (10.0, 30.0)] };
        let mid = PathGeometry::lerp(&a, &b, 0.5);
        assert_eq!(mid.points, vec![(0.0, 10.0), (10.0, 20.0)]);
    }

    #[test]
    fn lerp_resamples_mismatched_point_counts() {
        let a = PathGeometry { points: vec![(0.0, 0.0), (10.0, 10.0)] };
        let b = PathGeometry { points: vec![(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)] };
        let end = PathGeometry::lerp(&a, &b, 1.0);
        assert_eq!(end.points, b.points);
        let mid = PathGeometry::lerp(&a, &b, 0.5);
        assert_eq!(mid.points.len(), 3);
    }

    #[test]
    fn ease_is_symmetric_and_clamped() {
        assert_eq!(ease_cubic_in_out(0.0), 0.0);
        assert_eq!(ease_cubic_in_out(0.5), 0.5);
        assert_eq!(ease_cubic_in_out(1.0), 1.0);
        assert_eq!(ease_cubic_in_out(1.5), 1.0);
        assert!(ease_cubic_in_out(0.25) < 0.25);
    }
}
