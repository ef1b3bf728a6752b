//! Small-multiples dashboard engine for age-specific utilisation-rate curves.
//!
//! One panel per clinical category, two sex-keyed series per panel. The
//! engine owns panel identity, per-panel vertical scales, and animated
//! in-place updates; retrieval and drawing are seams the host plugs in.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ TableSource  │────►│ DashboardController ───►│  PanelSet    │
//! │ (HTTP/stub)  │     │ (selection state) │     │ (per category)│
//! └──────────────┘     └────────┬─────────┘     └──────┬───────┘
//!                               │                      │
//!                      reconcile / transition          ▼
//!                               │               ┌──────────────┐
//!                               └──────────────►│   Surface    │
//!                                               │ (draw calls) │
//!                                               └──────────────┘
//! ```
//!
//! Selection changes, fetch completions, and animation frames are discrete
//! host events; nothing inside the engine reads a clock or blocks.

pub mod config;
pub mod curve;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod logging;
pub mod panel;
pub mod scale;
pub mod source;
pub mod surface;
pub mod transition;
