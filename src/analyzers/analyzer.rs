use crate::analyzers::types::{AreaStats, ChartPoint, Location, LocationReport, Nearest, RankedCount};
use crate::analyzers::utility::{haversine_km, pct_change, shorten_label};
use crate::geojson::{Feature, FeatureCollection};
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

/// How many emitters, categories and residue types are ranked.
const TOP_N: usize = 5;

const UNCLASSIFIED: &str = "Sin clasificar";

struct Measured<'a> {
    feature: &'a Feature,
    distance_km: f64,
}

/// Analyzes the establishments around `origin` within `radius_km`.
///
/// Returns `None` when the collection is empty.
pub fn analyze_location(
    origin: Location,
    collection: &FeatureCollection,
    radius_km: f64,
) -> Option<LocationReport> {
    if collection.features.is_empty() {
        return None;
    }

    let measured: Vec<Measured> = collection
        .features
        .iter()
        .map(|feature| Measured {
            feature,
            distance_km: haversine_km(
                origin.lat,
                origin.lng,
                feature.geometry.latitude(),
                feature.geometry.longitude(),
            ),
        })
        .collect();

    let in_radius: Vec<&Measured> = measured
        .iter()
        .filter(|m| m.distance_km <= radius_km)
        .collect();
    debug!(in_radius = in_radius.len(), radius_km, "Establishments within radius");

    let mut top: Vec<&Measured> = in_radius.clone();
    top.sort_by(|a, b| {
        b.feature
            .properties
            .history_total()
            .total_cmp(&a.feature.properties.history_total())
    });
    top.truncate(TOP_N);

    let line_keys: Vec<String> = top.iter().map(|m| m.feature.properties.name.clone()).collect();

    let years = collection.years();
    let chart_data = years
        .iter()
        .map(|&year| ChartPoint {
            year: year.to_string(),
            values: top
                .iter()
                .map(|m| {
                    let p = &m.feature.properties;
                    (p.name.clone(), p.value_for(year).unwrap_or(0.0))
                })
                .collect(),
        })
        .collect();

    let year_total = |year: Option<&i64>| -> f64 {
        year.map(|&y| {
            in_radius
                .iter()
                .map(|m| m.feature.properties.value_for(y).unwrap_or(0.0))
                .sum::<f64>()
        })
        .unwrap_or(0.0)
    };
    let trend = pct_change(year_total(years.first()), year_total(years.last()));

    let nearest = measured
        .iter()
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let regional_name = nearest
        .map(|m| m.feature.properties.region.clone())
        .filter(|r| !r.is_empty());
    let regional_total = regional_name
        .as_deref()
        .map(|region| {
            collection
                .features
                .iter()
                .filter(|f| f.properties.region == region)
                .map(|f| f.properties.history_total())
                .sum::<f64>()
        })
        .unwrap_or(0.0);

    let top5_total: f64 = top.iter().map(|m| m.feature.properties.history_total()).sum();

    let top_categories = rank(in_radius.iter().map(|m| {
        let category = m.feature.properties.category.as_str();
        if category.is_empty() {
            UNCLASSIFIED.to_string()
        } else {
            category.to_string()
        }
    }));

    let top_residues = rank(in_radius.iter().flat_map(|m| {
        m.feature
            .properties
            .residues
            .split([',', ';'])
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(shorten_label)
            .collect::<Vec<_>>()
    }));

    Some(LocationReport {
        generated_at: Utc::now(),
        location: origin,
        stats: AreaStats {
            count: in_radius.len(),
            trend,
            radius: radius_km,
            regional_total,
            regional_name,
            top5_total,
            top_categories,
            top_residues,
        },
        chart_data,
        line_keys,
        nearest: nearest.map(|m| Nearest {
            id_vu: m.feature.properties.id_vu.clone(),
            name: m.feature.properties.name.clone(),
            region: m.feature.properties.region.clone(),
            distance_km: m.distance_km,
        }),
        top_ids: top.iter().map(|m| m.feature.properties.id_vu.clone()).collect(),
    })
}

/// Counts labels and returns the most frequent ones, ties in first-seen order.
fn rank(labels: impl Iterator<Item = String>) -> Vec<RankedCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for label in labels {
        let count = counts.entry(label.clone()).or_insert(0);
        if *count == 0 {
            order.push(label);
        }
        *count += 1;
    }

    let mut ranked: Vec<RankedCount> = order
        .into_iter()
        .map(|name| {
            let count = counts[&name];
            RankedCount { name, count }
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_N);
    ranked
}
