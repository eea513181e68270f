//! GeoJSON document types for the establishment map.

use anyhow::{Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Top-level `FeatureCollection` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

/// One establishment on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub properties: Properties,
    pub geometry: Point,
}

/// Point geometry; coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Point")]
pub struct Point {
    pub coordinates: [f64; 2],
}

impl Point {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// A single `{year, value}` entry of an establishment's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub year: i64,
    pub value: f64,
}

/// Feature properties. The per-year fields are flattened between
/// `total_tonnage` and `history` as `tonnage_<year>` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub id_vu: String,
    pub name: String,
    pub category: String,
    pub comuna: String,
    pub region: String,
    pub total_tonnage: f64,
    #[serde(flatten)]
    pub yearly: YearlyTonnage,
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub residues: String,
}

impl Properties {
    /// Sum of the history values, as the map front-end computes it.
    pub fn history_total(&self) -> f64 {
        self.history.iter().map(|h| h.value).sum()
    }

    pub fn value_for(&self, year: i64) -> Option<f64> {
        self.history.iter().find(|h| h.year == year).map(|h| h.value)
    }
}

/// `tonnage_<year>` fields, kept in ascending year order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlyTonnage(pub Vec<(i64, f64)>);

const TONNAGE_PREFIX: &str = "tonnage_";

impl YearlyTonnage {
    pub fn get(&self, year: i64) -> Option<f64> {
        self.0.iter().find(|(y, _)| *y == year).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(i64, f64)> {
        self.0.iter()
    }
}

impl Serialize for YearlyTonnage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (year, value) in &self.0 {
            map.serialize_entry(&format!("{TONNAGE_PREFIX}{year}"), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for YearlyTonnage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct YearlyVisitor;

        impl<'de> Visitor<'de> for YearlyVisitor {
            type Value = YearlyTonnage;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of tonnage_<year> fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(key) = access.next_key::<String>()? {
                    let year = key
                        .strip_prefix(TONNAGE_PREFIX)
                        .and_then(|y| y.parse::<i64>().ok());
                    match year {
                        Some(year) => entries.push((year, access.next_value::<f64>()?)),
                        None => {
                            access.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }
                entries.sort_by_key(|(year, _)| *year);
                Ok(YearlyTonnage(entries))
            }
        }

        deserializer.deserialize_map(YearlyVisitor)
    }
}

impl FeatureCollection {
    /// Reads a previously generated collection from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let collection = serde_json::from_str(&content)
            .with_context(|| format!("invalid GeoJSON in {}", path.display()))?;
        Ok(collection)
    }

    /// Sorted distinct years appearing in any feature's history.
    pub fn years(&self) -> Vec<i64> {
        let mut years: Vec<i64> = self
            .features
            .iter()
            .flat_map(|f| f.properties.history.iter().map(|h| h.year))
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}
