//! Establishment aggregation.
//!
//! Rows are grouped twice: by `(establishment, year)` to sum tonnage, and by
//! establishment to collect residue descriptors. Groups keep the order in
//! which their key first appears in the input, and descriptive fields come
//! from the first row of each group that carries a value.

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, instrument, warn};

use crate::config::ColumnConfig;
use crate::geojson::{Feature, FeatureCollection, HistoryEntry, Point, Properties, YearlyTonnage};
use crate::record::{Row, extract_rows};
use crate::table::Table;

/// Substring patterns for the residue descriptor column, highest priority first.
pub const RESIDUE_PATTERNS: &[&str] = &[
    "ler_subcapitulo",
    "nombre_residuo",
    "descripcion_residuo",
    "desc_residuo",
    "ler",
    "nombre",
    "residuo",
];

/// Label used when no residue column exists in the input.
pub const NO_RESIDUE_LABEL: &str = "No informado";

/// Returns the index and name of the residue column, if one matches.
///
/// Patterns are tried in priority order; within a pattern the leftmost
/// matching column wins. Matching is a case-insensitive substring test.
pub fn detect_residue_column(columns: &[String]) -> Option<(usize, &str)> {
    RESIDUE_PATTERNS.iter().find_map(|pattern| {
        columns
            .iter()
            .enumerate()
            .find(|(_, name)| name.to_lowercase().contains(*pattern))
            .map(|(idx, name)| (idx, name.as_str()))
    })
}

/// Rounds half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summed tonnage of one establishment in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearBucket {
    pub id: String,
    pub year: i64,
    pub quantity: f64,
    pub name: String,
    pub category: String,
    pub comuna: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl YearBucket {
    fn open(row: &Row, year: i64) -> Self {
        Self {
            id: row.id.clone(),
            year,
            quantity: row.quantity,
            name: row.name.clone(),
            category: row.category.clone(),
            comuna: row.comuna.clone(),
            region: row.region.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }

    fn absorb(&mut self, row: &Row) {
        self.quantity += row.quantity;
        fill_first(&mut self.name, &row.name);
        fill_first(&mut self.category, &row.category);
        fill_first(&mut self.comuna, &row.comuna);
        fill_first(&mut self.region, &row.region);
    }
}

fn fill_first(slot: &mut String, candidate: &str) {
    if slot.is_empty() && !candidate.is_empty() {
        *slot = candidate.to_string();
    }
}

/// Groups rows by `(id, year)`, summing tonnage, in first-appearance order.
///
/// Rows without a year form no bucket.
pub fn year_buckets(rows: &[Row]) -> Vec<YearBucket> {
    let mut buckets: Vec<YearBucket> = Vec::new();
    let mut index: HashMap<(&str, i64), usize> = HashMap::new();

    for row in rows {
        let Some(year) = row.year else {
            continue;
        };
        match index.get(&(row.id.as_str(), year)) {
            Some(&i) => buckets[i].absorb(row),
            None => {
                index.insert((row.id.as_str(), year), buckets.len());
                buckets.push(YearBucket::open(row, year));
            }
        }
    }

    buckets
}

/// Sorted distinct years across all buckets.
pub fn year_universe(buckets: &[YearBucket]) -> Vec<i64> {
    buckets
        .iter()
        .map(|b| b.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Per-establishment residue summary: distinct non-blank descriptors,
/// sorted and joined with `", "`.
///
/// Every establishment present in `rows` gets an entry, possibly empty.
/// Rows without a year still count here.
pub fn residue_summaries(rows: &[Row]) -> HashMap<String, String> {
    let mut sets: HashMap<&str, BTreeSet<&str>> = HashMap::new();

    for row in rows {
        let set = sets.entry(row.id.as_str()).or_default();
        if let Some(residue) = row.residue.as_deref() {
            let trimmed = residue.trim();
            if !trimmed.is_empty() {
                set.insert(trimmed);
            }
        }
    }

    sets.into_iter()
        .map(|(id, set)| (id.to_string(), set.into_iter().collect::<Vec<_>>().join(", ")))
        .collect()
}

/// Builds one feature per establishment, in first-appearance order.
///
/// `residues` is `None` when no residue column was detected; then every
/// feature is labelled [`NO_RESIDUE_LABEL`].
pub fn build_features(
    buckets: &[YearBucket],
    years: &[i64],
    residues: Option<&HashMap<String, String>>,
) -> Vec<Feature> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_id: HashMap<&str, Vec<&YearBucket>> = HashMap::new();
    for bucket in buckets {
        let group = by_id.entry(bucket.id.as_str()).or_default();
        if group.is_empty() {
            order.push(bucket.id.as_str());
        }
        group.push(bucket);
    }

    order
        .into_iter()
        .map(|id| {
            let group = &by_id[id];
            let first = group[0];

            let mut history = Vec::with_capacity(years.len());
            let mut yearly = Vec::with_capacity(years.len());
            for &year in years {
                let value = group
                    .iter()
                    .filter(|b| b.year == year)
                    .map(|b| b.quantity)
                    .sum::<f64>();
                let value = round2(value);
                history.push(HistoryEntry { year, value });
                yearly.push((year, value));
            }
            let total_tonnage = round2(yearly.iter().map(|(_, v)| v).sum());

            let residues = match residues {
                Some(map) => map
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| NO_RESIDUE_LABEL.to_string()),
                None => NO_RESIDUE_LABEL.to_string(),
            };

            Feature {
                properties: Properties {
                    id_vu: id.to_string(),
                    name: first.name.clone(),
                    category: first.category.clone(),
                    comuna: first.comuna.clone(),
                    region: first.region.clone(),
                    total_tonnage,
                    yearly: YearlyTonnage(yearly),
                    history,
                    residues,
                },
                geometry: Point::new(first.longitude, first.latitude),
            }
        })
        .collect()
}

/// Counters reported after a conversion.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConversionStats {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub years: Vec<i64>,
    pub establishments: usize,
    pub residue_column: Option<String>,
}

/// Runs the whole transform over a loaded table.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn convert(table: &Table, columns: &ColumnConfig) -> Result<(FeatureCollection, ConversionStats)> {
    info!(total_rows = table.len(), "Converting table");

    let residue_column = detect_residue_column(&table.columns);
    match residue_column {
        Some((idx, name)) => info!(column = name, index = idx, "Residue column detected"),
        None => warn!(
            patterns = ?RESIDUE_PATTERNS,
            "No residue column found; every establishment will be labelled '{}'",
            NO_RESIDUE_LABEL
        ),
    }

    let extracted = extract_rows(table, columns, residue_column.map(|(idx, _)| idx))?;
    info!(
        valid_rows = extracted.rows.len(),
        without_coordinates = extracted.without_coordinates,
        "Rows with valid coordinates"
    );

    let buckets = year_buckets(&extracted.rows);
    let years = year_universe(&buckets);
    info!(years = ?years, "Available years");

    let residues = residue_column.map(|_| residue_summaries(&extracted.rows));
    let features = build_features(&buckets, &years, residues.as_ref());
    info!(establishments = features.len(), "Distinct establishments");

    let stats = ConversionStats {
        total_rows: table.len(),
        valid_rows: extracted.rows.len(),
        years,
        establishments: features.len(),
        residue_column: residue_column.map(|(_, name)| name.to_string()),
    };

    Ok((FeatureCollection { features }, stats))
}
