//! Source-table parsing and grouping.
//!
//! Loading is best-effort: rows that fail to parse or carry an unexpected
//! categorical value are dropped with a recorded warning, and the remaining
//! rows still render. Parseable but out-of-range numbers are NOT rejected
//! here; non-finite rates propagate and are excluded at geometry time.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use crate::error::DashboardError;
use crate::logging::{log, obj, v_str, Domain, Level};

pub const EXPECTED_COLUMNS: [&str; 6] = ["pod", "hsagrp", "hsagrp_lab", "sex", "age", "urt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sex {
    F,
    M,
}

impl Sex {
    pub const BOTH: [Sex; 2] = [Sex::F, Sex::M];

    /// Accepts the source table's `f`/`m` encoding, case-insensitive.
    pub fn parse(s: &str) -> Option<Sex> {
        match s.trim() {
            "f" | "F" => Some(Sex::F),
            "m" | "M" => Some(Sex::M),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::F => "f",
            Sex::M => "m",
        }
    }
}

/// One source-table row. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Observation {
    pub geography: String,
    pub pathway: String,
    pub category: String,
    pub category_label: String,
    pub sex: Sex,
    pub age: u32,
    pub rate: f64,
}

/// Rows grouped by pathway, preserving first-appearance order of pathways.
#[derive(Debug, Default)]
pub struct GroupedByPathway {
    order: Vec<String>,
    rows: HashMap<String, Vec<Observation>>,
}

impl GroupedByPathway {
    pub fn insert(&mut self, obs: Observation) {
        if !self.rows.contains_key(&obs.pathway) {
            self.order.push(obs.pathway.clone());
        }
        self.rows.entry(obs.pathway.clone()).or_default().push(obs);
    }

    pub fn get(&self, pathway: &str) -> Option<&[Observation]> {
        self.rows.get(pathway).map(|v| v.as_slice())
    }

    pub fn pathways(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Load accounting surfaced alongside the grouped rows.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub rows: u64,
    pub bad_rows: u64,
    pub warnings: Vec<String>,
    /// sha256 of the fetched text, for log correlation across loads.
    pub fingerprint: String,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub grouped: GroupedByPathway,
    pub report: TableReport,
}

pub fn table_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse the raw table text for one geography. Never fails as a whole:
/// offending rows are dropped and counted in the report.
pub fn parse_table(geography: &str, text: &str) -> LoadOutcome {
    let mut grouped = GroupedByPathway::default();
    let mut rows = 0u64;
    let mut bad_rows = 0u64;
    let mut warnings = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.to_lowercase().starts_with("pod,") {
            continue;
        }
        match parse_row(geography, idx + 1, trimmed) {
            Ok(obs) => {
                rows += 1;
                grouped.insert(obs);
            }
            Err(err) => {
                bad_rows += 1;
                warnings.push(err.to_string());
            }
        }
    }

    let report = TableReport {
        rows,
        bad_rows,
        warnings,
        fingerprint: table_sha256(text),
    };

    log(
        Level::Info,
        Domain::Data,
        "table_parsed",
        obj(&[
            ("geography", v_str(geography)),
            ("rows", serde_json::json!(report.rows)),
            ("bad_rows", serde_json::json!(report.bad_rows)),
            ("fingerprint", v_str(&report.fingerprint[..16])),
        ]),
    );

    LoadOutcome { grouped, report }
}

/// Parse one `pod,hsagrp,hsagrp_lab,sex,age,urt` row.
pub fn parse_row(geography: &str, line: usize, row: &str) -> Result<Observation, DashboardError> {
    let parts: Vec<&str> = row.split(',').map(|s| s.trim()).collect();
    if parts.len() < EXPECTED_COLUMNS.len() {
        return Err(DashboardError::parse(
            line,
            format!("expected {} columns, got {}", EXPECTED_COLUMNS.len(), parts.len()),
        ));
    }
    for (col, value) in EXPECTED_COLUMNS.iter().zip(&parts) {
        if value.is_empty() {
            return Err(DashboardError::parse(line, format!("missing field {}", col)));
        }
    }

    let sex = Sex::parse(parts[3]).ok_or(DashboardError::Domain {
        line,
        field: "sex",
        value: parts[3].to_string(),
    })?;
    let age: u32 = parts[4]
        .parse()
        .map_err(|e| DashboardError::parse(line, format!("bad age: {}", e)))?;
    let rate: f64 = parts[5]
        .parse()
        .map_err(|e| DashboardError::parse(line, format!("bad urt: {}", e)))?;

    Ok(Observation {
        geography: geography.to_string(),
        pathway: parts[0].to_string(),
        category: parts[1].to_string(),
        category_label: parts[2].to_string(),
        sex,
        age,
        rate,
    })
}

/// Data bound to one panel: per-sex series ordered by strictly increasing age.
#[derive(Debug, Clone, Default)]
pub struct CategoryPanelData {
    pub category: String,
    pub label: String,
    pub series_by_sex: BTreeMap<Sex, Vec<(f64, f64)>>,
}

impl CategoryPanelData {
    pub fn empty(category: &str, label: &str) -> Self {
        Self {
            category: category.to_string(),
            label: label.to_string(),
            series_by_sex: BTreeMap::new(),
        }
    }

    pub fn series(&self, sex: Sex) -> Option<&[(f64, f64)]> {
        self.series_by_sex.get(&sex).map(|v| v.as_slice())
    }

    /// Maximum finite rate across every series bound to the panel.
    /// Zero when no finite point exists.
    pub fn max_rate(&self) -> f64 {
        self.series_by_sex
            .values()
            .flatten()
            .map(|&(_, rate)| rate)
            .filter(|r| r.is_finite())
            .fold(0.0, f64::max)
    }
}

/// Regroup one pathway's rows by category, then by sex inside each category.
/// Category order equals first appearance in the input. Within a series a
/// later duplicate age replaces the earlier one.
pub fn regroup_by_category(rows: &[Observation]) -> Vec<CategoryPanelData> {
    let mut order: Vec<String> = Vec::new();
    let mut by_category: HashMap<String, CategoryPanelData> = HashMap::new();

    for obs in rows {
        let entry = by_category.entry(obs.category.clone()).or_insert_with(|| {
            order.push(obs.category.clone());
            CategoryPanelData::empty(&obs.category, &obs.category_label)
        });
        let series = entry.series_by_sex.entry(obs.sex).or_default();
        let age = obs.age as f64;
        if let Some(existing) = series.iter_mut().find(|(a, _)| *a == age) {
            log(
                Level::Warn,
                Domain::Data,
                "duplicate_age",
                obj(&[
                    ("category", v_str(&obs.category)),
                    ("sex", v_str(obs.sex.as_str())),
                    ("age", serde_json::json!(obs.age)),
                ]),
            );
            existing.1 = obs.rate;
        } else {
            series.push((age, obs.rate));
        }
    }

    let mut out: Vec<CategoryPanelData> = order
        .into_iter()
        .filter_map(|cat| by_category.remove(&cat))
        .collect();
    for panel in &mut out {
        for series in panel.series_by_sex.values_mut() {
            series.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
    }
    out
}
