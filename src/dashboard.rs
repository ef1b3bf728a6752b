//! Top-level selection state machine and event dispatch.
//!
//! Owns the single mutable `DashboardState`; every other component receives
//! derived data. Dispatch decides, per event, between a full keyed
//! reconcile (first render, pathway switch), an in-place data transition
//! (geography switch), or a mode-only re-render (toggle). Geography fetches
//! carry a generation token; only the response matching the latest request
//! is applied, later arrivals of superseded requests are discarded silently.

use crate::config::Config;
use crate::curve::RenderMode;
use crate::data::{parse_table, regroup_by_category, CategoryPanelData, GroupedByPathway, TableReport};
use crate::error::DashboardError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::panel::{reconcile, PanelLayoutEngine, PanelSet};
use crate::scale::ScaleManager;
use crate::source::TableSource;
use crate::surface::Surface;
use crate::transition::TransitionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Rendered,
}

/// The one process-wide mutable selection record.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub geography: String,
    pub pathway: String,
    pub mode: RenderMode,
}

/// Generation token attached to one geography request. The response must
/// present the same token to be applied.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    pub geography: String,
}

pub struct DashboardController {
    cfg: Config,
    state: DashboardState,
    phase: Phase,
    generation: u64,
    data: Option<GroupedByPathway>,
    last_report: Option<TableReport>,
    panels: PanelSet,
    scales: ScaleManager,
    layout: PanelLayoutEngine,
    transitions: TransitionController,
}

impl DashboardController {
    pub fn new(cfg: Config) -> Self {
        let state = DashboardState {
            geography: cfg.default_geography.clone(),
            pathway: cfg.default_pathway.clone(),
            mode: RenderMode::Raw,
        };
        let scales = ScaleManager::new(&cfg);
        let transitions = TransitionController::new(&cfg);
        Self {
            cfg,
            state,
            phase: Phase::Idle,
            generation: 0,
            data: None,
            last_report: None,
            panels: PanelSet::default(),
            scales,
            layout: PanelLayoutEngine,
            transitions,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn panel_categories(&self) -> Vec<&str> {
        self.panels.categories().collect()
    }

    pub fn panels(&self) -> &PanelSet {
        &self.panels
    }

    pub fn last_report(&self) -> Option<&TableReport> {
        self.last_report.as_ref()
    }

    /// Begin a geography switch. The caller fetches via its `TableSource`
    /// and hands the outcome back to `complete_geography`.
    pub fn request_geography(&mut self, geography: &str) -> FetchTicket {
        self.generation += 1;
        self.phase = Phase::Loading;
        log(
            Level::Info,
            Domain::Dispatch,
            "geography_requested",
            obj(&[
                ("geography", v_str(geography)),
                ("generation", serde_json::json!(self.generation)),
            ]),
        );
        FetchTicket {
            generation: self.generation,
            geography: geography.to_string(),
        }
    }

    /// Apply a fetch outcome. Superseded tickets are dropped silently; a
    /// failed fetch keeps the previous geography rendered and surfaces the
    /// error; success transitions every existing panel in place (the panel
    /// set is unchanged by definition, same pathway).
    pub fn complete_geography(
        &mut self,
        ticket: FetchTicket,
        result: Result<String, DashboardError>,
        surface: &mut dyn Surface,
        now_ms: f64,
    ) {
        if ticket.generation != self.generation {
            log(
                Level::Info,
                Domain::Fetch,
                "superseded_response_discarded",
                obj(&[
                    ("geography", v_str(&ticket.geography)),
                    ("generation", serde_json::json!(ticket.generation)),
                    ("latest", serde_json::json!(self.generation)),
                ]),
            );
            return;
        }

        match result {
            Err(err) => {
                self.phase = if self.panels.is_empty() {
                    Phase::Idle
                } else {
                    Phase::Rendered
                };
                log(
                    Level::Error,
                    Domain::Fetch,
                    "geography_fetch_failed",
                    obj(&[
                        ("geography", v_str(&ticket.geography)),
                        ("error", v_str(&err.to_string())),
                        ("retained", v_str(&self.state.geography)),
                    ]),
                );
                surface.show_error(&err.to_string());
            }
            Ok(text) => {
                let outcome = parse_table(&ticket.geography, &text);
                self.state.geography = ticket.geography;
                self.data = Some(outcome.grouped);
                self.last_report = Some(outcome.report);
                self.reset_mode(surface);
                if self.panels.is_empty() {
                    // first render: the all-create case of reconcile
                    self.rebuild_panels(surface, now_ms);
                } else {
                    self.refresh_panels(now_ms);
                }
                self.phase = Phase::Rendered;
            }
        }
    }

    /// Convenience driver gluing request → fetch → complete.
    pub async fn switch_geography(
        &mut self,
        source: &dyn TableSource,
        geography: &str,
        surface: &mut dyn Surface,
        now_ms: f64,
    ) {
        let ticket = self.request_geography(geography);
        let result = source.fetch_table(geography).await;
        self.complete_geography(ticket, result, surface, now_ms);
    }

    /// Pathway switches reuse the already-loaded geography data: no fetch,
    /// no Loading phase. The category set generally changes, so this is the
    /// one dispatch that re-runs reconcile.
    pub fn on_pathway_change(&mut self, pathway: &str, surface: &mut dyn Surface, now_ms: f64) {
        self.state.pathway = pathway.to_string();
        log(
            Level::Info,
            Domain::Dispatch,
            "pathway_changed",
            obj(&[("pathway", v_str(pathway))]),
        );
        if self.data.is_none() {
            return;
        }
        self.reset_mode(surface);
        self.rebuild_panels(surface, now_ms);
    }

    /// Mode-only re-render: identical data, identical scales, different
    /// geometry. Never touches the y-domain, never fetches.
    pub fn on_mode_toggle(&mut self, smoothed: bool, now_ms: f64) {
        let mode = RenderMode::from(smoothed);
        self.state.mode = mode;
        log(
            Level::Info,
            Domain::Dispatch,
            "mode_toggled",
            obj(&[("mode", v_str(mode.as_str()))]),
        );
        if self.data.is_some() {
            self.refresh_panels(now_ms);
        }
    }

    /// Animation-frame pump: advance transitions and emit draw calls.
    pub fn on_frame(&mut self, now_ms: f64, surface: &mut dyn Surface) {
        self.transitions.tick(now_ms, &mut self.panels, surface);
    }

    pub fn is_animating(&self) -> bool {
        self.transitions.active_count() > 0
    }

    /// Mode state and its toggle affordance always reset together when the
    /// data underneath changes.
    fn reset_mode(&mut self, surface: &mut dyn Surface) {
        self.state.mode = RenderMode::Raw;
        surface.reset_mode_toggle();
    }

    fn current_panel_data(&self) -> Vec<CategoryPanelData> {
        let rows = self
            .data
            .as_ref()
            .and_then(|d| d.get(&self.state.pathway))
            .unwrap_or(&[]);
        regroup_by_category(rows)
    }

    /// First render and pathway switch: keyed reconcile. Removals are
    /// immediate, creations get a non-animated first draw, kept panels get
    /// in-place transitions.
    fn rebuild_panels(&mut self, surface: &mut dyn Surface, now_ms: f64) {
        let panel_data = self.current_panel_data();
        let plan = reconcile(&self.panels, &panel_data);
        log(
            Level::Info,
            Domain::Panel,
            "reconcile",
            obj(&[
                ("create", serde_json::json!(plan.to_create.len())),
                ("keep", serde_json::json!(plan.to_keep.len())),
                ("remove", serde_json::json!(plan.to_remove.len())),
            ]),
        );

        for category in &plan.to_remove {
            self.transitions.cancel(category);
            self.layout
                .remove_panel(&mut self.panels, category, &mut self.scales, surface);
        }
        for data in &panel_data {
            if plan.to_create.contains(&data.category) {
                self.layout.create_panel(
                    &mut self.panels,
                    data,
                    &mut self.scales,
                    self.state.mode,
                    surface,
                );
            } else if let Some(panel) = self.panels.get_mut(&data.category) {
                self.transitions
                    .update(panel, data, self.state.mode, &mut self.scales, now_ms);
            }
        }
    }

    /// Geography switch and mode toggle: the panel set is unchanged, every
    /// panel updates in place. A category with no rows in the new snapshot
    /// keeps its panel; its series simply fade out.
    fn refresh_panels(&mut self, now_ms: f64) {
        let panel_data = self.current_panel_data();
        let categories: Vec<String> = self.panels.categories().map(|c| c.to_string()).collect();
        for category in categories {
            let Some(panel) = self.panels.get_mut(&category) else {
                continue;
            };
            let data = panel_data
                .iter()
                .find(|d| d.category == category)
                .cloned()
                .unwrap_or_else(|| CategoryPanelData::empty(&category, &panel.label));
            self.transitions
                .update(panel, &data, self.state.mode, &mut self.scales, now_ms);
        }
    }
}
