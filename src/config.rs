//! Run configuration: input/output locations and the column-name mapping.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_INPUT: &str = "gi-sinader-2021_2024-consolidado.xlsx";
pub const DEFAULT_OUTPUT: &str = "public/retc_data.geojson";

/// Names of the fixed columns the aggregation reads.
///
/// Stored as a plain JSON object on disk; any key left out keeps its default:
/// ```json
/// {
///   "id": "id_vu",
///   "quantity": "toneladas"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub id: String,
    pub year: String,
    pub quantity: String,
    pub name: String,
    pub category: String,
    pub comuna: String,
    pub region: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: "id_vu".to_string(),
            year: "año".to_string(),
            quantity: "cantidad_toneladas".to_string(),
            name: "razon_social".to_string(),
            category: "rubro".to_string(),
            comuna: "comuna".to_string(),
            region: "region".to_string(),
            latitude: "latitud".to_string(),
            longitude: "longitud".to_string(),
        }
    }
}

impl ColumnConfig {
    /// Loads the mapping from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read column config '{path}'"))?;
        let config: ColumnConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid column config '{path}'"))?;
        Ok(config)
    }

    /// Iterates over `(role, column name)` pairs in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("id", self.id.as_str()),
            ("year", self.year.as_str()),
            ("quantity", self.quantity.as_str()),
            ("name", self.name.as_str()),
            ("category", self.category.as_str()),
            ("comuna", self.comuna.as_str()),
            ("region", self.region.as_str()),
            ("latitude", self.latitude.as_str()),
            ("longitude", self.longitude.as_str()),
        ]
        .into_iter()
    }
}

/// Resolves the input path: explicit flag, then `ECOMAP_INPUT`, then the default.
pub fn input_path(flag: Option<String>) -> PathBuf {
    flag.or_else(|| std::env::var("ECOMAP_INPUT").ok())
        .unwrap_or_else(|| DEFAULT_INPUT.to_string())
        .into()
}

/// Resolves the output path: explicit flag, then `ECOMAP_OUTPUT`, then the default.
pub fn output_path(flag: Option<String>) -> PathBuf {
    flag.or_else(|| std::env::var("ECOMAP_OUTPUT").ok())
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string())
        .into()
}
