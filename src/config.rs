//! Runtime configuration sourced from the environment.

/// Outer margins around each panel's plot area. The top margin includes the
/// spacer that keeps the title clear of the y-axis label.
#[derive(Debug, Clone, Copy)]
pub struct Margins {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the source-table store.
    pub source_base: String,
    /// Filename prefix prepended to the geography identifier.
    pub source_prefix: String,
    /// Filename extension appended to the geography identifier.
    pub source_ext: String,
    /// Geography shown on first render.
    pub default_geography: String,
    /// Pathway shown on first render.
    pub default_pathway: String,
    /// Outer panel width/height in pixels.
    pub panel_width: f64,
    pub panel_height: f64,
    pub margin: Margins,
    /// Target tick count on both axes.
    pub tick_count: usize,
    /// Fixed transition duration for every animated update.
    pub transition_ms: f64,
    /// Upper bound of the shared age axis.
    pub age_max: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_base: "https://strategyunit.blob.core.windows.net/population-aging-app/"
                .to_string(),
            source_prefix: "test_activity_".to_string(),
            source_ext: ".csv".to_string(),
            default_geography: "E08000026".to_string(),
            default_pathway: "aae".to_string(),
            panel_width: 400.0,
            panel_height: 400.0,
            margin: Margins {
                top: 70.0,
                left: 50.0,
                right: 50.0,
                bottom: 50.0,
            },
            tick_count: 5,
            transition_ms: 1800.0,
            age_max: 100.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            source_base: std::env::var("SOURCE_BASE").unwrap_or(d.source_base),
            source_prefix: std::env::var("SOURCE_PREFIX").unwrap_or(d.source_prefix),
            source_ext: std::env::var("SOURCE_EXT").unwrap_or(d.source_ext),
            default_geography: std::env::var("DEFAULT_GEOGRAPHY").unwrap_or(d.default_geography),
            default_pathway: std::env::var("DEFAULT_PATHWAY").unwrap_or(d.default_pathway),
            panel_width: env_f64("PANEL_WIDTH", d.panel_width),
            panel_height: env_f64("PANEL_HEIGHT", d.panel_height),
            margin: d.margin,
            tick_count: std::env::var("TICK_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.tick_count),
            transition_ms: env_f64("TRANSITION_MS", d.transition_ms),
            age_max: d.age_max,
        }
    }

    /// Width of the plot area inside the margins.
    pub fn plot_width(&self) -> f64 {
        self.panel_width - self.margin.left - self.margin.right
    }

    /// Height of the plot area inside the margins.
    pub fn plot_height(&self) -> f64 {
        self.panel_height - self.margin.top - self.margin.bottom
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
