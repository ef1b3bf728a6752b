//! Error taxonomy for the dashboard engine.
//!
//! Row-level `Parse` and `Domain` failures are non-fatal: the offending row
//! is dropped and the rest of the table still renders. `Fetch` aborts the
//! pending geography switch; the previously rendered geography stays up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("fetch failed for {geography}: {reason}")]
    Fetch { geography: String, reason: String },

    #[error("row {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("row {line}: unexpected {field} value {value:?}")]
    Domain {
        line: usize,
        field: &'static str,
        value: String,
    },
}

impl DashboardError {
    pub fn fetch(geography: &str, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            geography: geography.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(line: usize, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            line,
            reason: reason.to_string(),
        }
    }
}
