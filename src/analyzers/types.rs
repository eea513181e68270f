//! Data types produced by the location analysis.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A point chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// A label and how many establishments carry it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCount {
    pub name: String,
    pub count: usize,
}

/// Headline figures for the area around the location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStats {
    pub count: usize,
    pub trend: f64,
    pub radius: f64,
    pub regional_total: f64,
    pub regional_name: Option<String>,
    pub top5_total: f64,
    pub top_categories: Vec<RankedCount>,
    pub top_residues: Vec<RankedCount>,
}

/// One year of the multi-line chart: the top emitters' values keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub year: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

/// The establishment closest to the location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nearest {
    pub id_vu: String,
    pub name: String,
    pub region: String,
    pub distance_km: f64,
}

/// Complete result of [`analyze_location`](super::analyzer::analyze_location).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    pub generated_at: DateTime<Utc>,
    pub location: Location,
    pub stats: AreaStats,
    pub chart_data: Vec<ChartPoint>,
    pub line_keys: Vec<String>,
    pub nearest: Option<Nearest>,
    pub top_ids: Vec<String>,
}
