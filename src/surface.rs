//! Rendering-surface seam: the draw commands the engine emits.
//!
//! The engine produces geometry and axis specs; the host owns the actual 2D
//! primitives. `RecordingSurface` captures every call so tests can assert on
//! exactly what would be drawn.

use crate::curve::PathGeometry;
use crate::data::Sex;

pub const FEMALE_COLOR: &str = "#fd484e";
pub const MALE_COLOR: &str = "#2c74b5";

/// Legend text/color pairs, drawn on every panel.
pub const KEY_LABELS: [(&str, &str); 2] = [("Women", FEMALE_COLOR), ("Men", MALE_COLOR)];

pub fn series_color(sex: Sex) -> &'static str {
    match sex {
        Sex::F => FEMALE_COLOR,
        Sex::M => MALE_COLOR,
    }
}

/// Rate-per-1000 tick label, rounded to an integer.
pub fn format_rate_per_1000(rate: f64) -> String {
    format!("{:.0}", rate * 1e3)
}

/// Whole-year age tick label.
pub fn format_age(age: f64) -> String {
    format!("{:.0}", age)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTickSpec {
    pub value: f64,
    /// Pixel offset along the axis.
    pub position: f64,
    pub label: String,
    /// Dashed gridline everywhere except the first tick.
    pub dashed_gridline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSpec {
    pub geometry: PathGeometry,
    pub color: &'static str,
    pub opacity: f64,
}

pub trait Surface {
    fn create_panel(&mut self, category: &str, title: &str);
    fn remove_panel(&mut self, category: &str);
    fn draw_series(&mut self, category: &str, sex: Sex, path: &PathSpec);
    fn remove_series(&mut self, category: &str, sex: Sex);
    fn draw_x_axis(&mut self, category: &str, ticks: &[AxisTickSpec]);
    fn draw_y_axis(&mut self, category: &str, ticks: &[AxisTickSpec]);
    fn draw_legend(&mut self, category: &str, labels: &[(&'static str, &'static str)]);
    fn show_error(&mut self, message: &str);
    /// Clear the smoothing toggle's checked affordance.
    fn reset_mode_toggle(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    CreatePanel { category: String, title: String },
    RemovePanel { category: String },
    DrawSeries { category: String, sex: Sex, path: PathSpec },
    RemoveSeries { category: String, sex: Sex },
    DrawXAxis { category: String, ticks: Vec<AxisTickSpec> },
    DrawYAxis { category: String, ticks: Vec<AxisTickSpec> },
    DrawLegend { category: String },
    ShowError { message: String },
    ResetModeToggle,
}

/// Test double that records every draw command in order.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panels_created(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::CreatePanel { category, .. } => Some(category.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn panels_removed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::RemovePanel { category } => Some(category.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Most recent geometry drawn for a series.
    pub fn last_series(&self, category: &str, sex: Sex) -> Option<&PathSpec> {
        self.calls.iter().rev().find_map(|c| match c {
            SurfaceCall::DrawSeries { category: cat, sex: s, path }
                if cat == category && *s == sex =>
            {
                Some(path)
            }
            _ => None,
        })
    }

    /// Most recent y-axis ticks drawn for a panel.
    pub fn last_y_axis(&self, category: &str) -> Option<&[AxisTickSpec]> {
        self.calls.iter().rev().find_map(|c| match c {
            SurfaceCall::DrawYAxis { category: cat, ticks } if cat == category => {
                Some(ticks.as_slice())
            }
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::ShowError { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn toggle_resets(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::ResetModeToggle))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn create_panel(&mut self, category: &str, title: &str) {
        self.calls.push(SurfaceCall::CreatePanel {
            category: category.to_string(),
            title: title.to_string(),
        });
    }

    fn remove_panel(&mut self, category: &str) {
        self.calls.push(SurfaceCall::RemovePanel {
            category: category.to_string(),
        });
    }

    fn draw_series(&mut self, category: &str, sex: Sex, path: &PathSpec) {
        self.calls.push(SurfaceCall::DrawSeries {
            category: category.to_string(),
            sex,
            path: path.clone(),
        });
    }

    fn remove_series(&mut self, category: &str, sex: Sex) {
        self.calls.push(SurfaceCall::RemoveSeries {
            category: category.to_string(),
            sex,
        });
    }

    fn draw_x_axis(&mut self, category: &str, ticks: &[AxisTickSpec]) {
        self.calls.push(SurfaceCall::DrawXAxis {
            category: category.to_string(),
            ticks: ticks.to_vec(),
        });
    }

    fn draw_y_axis(&mut self, category: &str, ticks: &[AxisTickSpec]) {
        self.calls.push(SurfaceCall::DrawYAxis {
            category: category.to_string(),
            ticks: ticks.to_vec(),
        });
    }

    fn draw_legend(&mut self, category: &str, _labels: &[(&'static str, &'static str)]) {
        self.calls.push(SurfaceCall::DrawLegend {
            category: category.to_string(),
        });
    }

    fn show_error(&mut self, message: &str) {
        self.calls.push(SurfaceCall::ShowError {
            message: message.to_string(),
        });
    }

    fn reset_mode_toggle(&mut self) {
        self.calls.push(SurfaceCall::ResetModeToggle);
    }
}
