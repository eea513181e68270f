//! Typed observations extracted from the loaded table.
//!
//! Rows without usable coordinates are dropped here, before any grouping, so
//! they never contribute to totals, history or first-seen attributes.

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use crate::config::ColumnConfig;
use crate::table::{Cell, Table};

static EMPTY: Cell = Cell::Empty;

/// One observation: an establishment's tonnage for a year.
///
/// `year` is `None` when the year cell is empty. Such rows never form a
/// year bucket but still contribute their residue descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub year: Option<i64>,
    pub quantity: f64,
    pub name: String,
    pub category: String,
    pub comuna: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub residue: Option<String>,
}

/// Result of [`extract_rows`].
#[derive(Debug, Default)]
pub struct Extracted {
    pub rows: Vec<Row>,
    /// Rows with a missing or zero coordinate.
    pub without_coordinates: usize,
    /// Rows with a missing establishment id.
    pub without_key: usize,
}

struct Indices {
    id: usize,
    year: usize,
    quantity: usize,
    name: usize,
    category: usize,
    comuna: usize,
    region: usize,
    latitude: usize,
    longitude: usize,
}

impl Indices {
    fn resolve(table: &Table, columns: &ColumnConfig) -> Result<Self> {
        let missing: Vec<String> = columns
            .iter()
            .filter(|(_, name)| table.column_index(name).is_none())
            .map(|(role, name)| format!("'{name}' ({role})"))
            .collect();
        if !missing.is_empty() {
            bail!(
                "required columns not found: {} (available: {})",
                missing.join(", "),
                table.columns.join(", ")
            );
        }

        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| anyhow!("required column '{name}' not found"))
        };

        Ok(Self {
            id: find(&columns.id)?,
            year: find(&columns.year)?,
            quantity: find(&columns.quantity)?,
            name: find(&columns.name)?,
            category: find(&columns.category)?,
            comuna: find(&columns.comuna)?,
            region: find(&columns.region)?,
            latitude: find(&columns.latitude)?,
            longitude: find(&columns.longitude)?,
        })
    }
}

/// Converts a numeric cell; `None` for empty cells.
pub fn cell_to_f64(cell: &Cell) -> Result<Option<f64>> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Int(i) => Ok(Some(*i as f64)),
        Cell::Float(f) => Ok(Some(*f)),
        Cell::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Cell::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| anyhow!("cannot convert '{}' to a number", s))
        }
    }
}

/// Converts a year cell; the value must be integral.
pub fn cell_to_year(cell: &Cell) -> Result<Option<i64>> {
    match cell {
        Cell::Int(i) => Ok(Some(*i)),
        Cell::Float(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
        Cell::Text(s) if s.trim().parse::<i64>().is_ok() => Ok(s.trim().parse().ok()),
        other => match cell_to_f64(other)? {
            None => Ok(None),
            Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
            Some(f) => bail!("year '{}' is not an integer", f),
        },
    }
}

/// Renders a descriptive cell as text; empty cells yield `None`.
pub fn cell_to_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        other => Some(other.to_string()),
    }
}

fn is_blank(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => true,
        Cell::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Extracts typed rows from `table`.
///
/// `residue_column` is the index of the detected residue column, if any.
/// Fails when a required column is missing or a surviving row holds a value
/// that cannot be converted.
pub fn extract_rows(
    table: &Table,
    columns: &ColumnConfig,
    residue_column: Option<usize>,
) -> Result<Extracted> {
    let idx = Indices::resolve(table, columns)?;
    let mut out = Extracted::default();

    for (row_idx, cells) in table.rows.iter().enumerate() {
        // Spreadsheet line: header is line 1.
        let line = row_idx + 2;
        let cell = |i: usize| cells.get(i).unwrap_or(&EMPTY);

        // Missing coordinates drop the row before anything is converted.
        if is_blank(cell(idx.latitude)) || is_blank(cell(idx.longitude)) {
            out.without_coordinates += 1;
            continue;
        }

        let latitude = cell_to_f64(cell(idx.latitude))
            .with_context(|| format!("row {line}, column '{}'", columns.latitude))?;
        let longitude = cell_to_f64(cell(idx.longitude))
            .with_context(|| format!("row {line}, column '{}'", columns.longitude))?;

        let (latitude, longitude) = match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => (lat, lon),
            _ => {
                out.without_coordinates += 1;
                continue;
            }
        };

        let Some(id) = cell_to_text(cell(idx.id)) else {
            out.without_key += 1;
            continue;
        };
        let year = cell_to_year(cell(idx.year))
            .with_context(|| format!("row {line}, column '{}'", columns.year))?;

        let quantity = match year {
            Some(_) => cell_to_f64(cell(idx.quantity))
                .with_context(|| format!("row {line}, column '{}'", columns.quantity))?
                .unwrap_or(0.0),
            None => 0.0,
        };

        let text = |i: usize| cell_to_text(cell(i)).unwrap_or_default();

        out.rows.push(Row {
            id,
            year,
            quantity,
            name: text(idx.name),
            category: text(idx.category),
            comuna: text(idx.comuna),
            region: text(idx.region),
            latitude,
            longitude,
            residue: residue_column.and_then(|i| cell_to_text(cell(i))),
        });
    }

    debug!(
        kept = out.rows.len(),
        without_coordinates = out.without_coordinates,
        without_key = out.without_key,
        "Rows extracted"
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        [
            "id_vu",
            "año",
            "cantidad_toneladas",
            "razon_social",
            "rubro",
            "comuna",
            "region",
            "latitud",
            "longitud",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn row(id: Cell, year: i64, qty: Cell, lat: Cell, lon: Cell) -> Vec<Cell> {
        vec![
            id,
            Cell::Int(year),
            qty,
            Cell::Text("Empresa".into()),
            Cell::Text("Rubro".into()),
            Cell::Text("Comuna".into()),
            Cell::Text("Region".into()),
            lat,
            lon,
        ]
    }

    #[test]
    fn test_drops_missing_and_zero_coordinates() {
        let table = Table::new(
            header(),
            vec![
                row(Cell::Int(1), 2021, Cell::Float(10.0), Cell::Float(-33.4), Cell::Float(-70.6)),
                row(Cell::Int(2), 2021, Cell::Float(5.0), Cell::Float(0.0), Cell::Float(-70.6)),
                row(Cell::Int(3), 2021, Cell::Float(5.0), Cell::Float(-33.4), Cell::Empty),
                row(Cell::Int(4), 2021, Cell::Float(5.0), Cell::Int(0), Cell::Int(0)),
            ],
        );

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.without_coordinates, 3);
        assert_eq!(out.rows[0].id, "1");
    }

    #[test]
    fn test_missing_required_column_fails() {
        let mut columns = header();
        columns.retain(|c| c != "cantidad_toneladas");
        let table = Table::new(columns, vec![]);

        let err = extract_rows(&table, &ColumnConfig::default(), None).unwrap_err();
        assert!(err.to_string().contains("cantidad_toneladas"));
    }

    #[test]
    fn test_every_missing_column_is_reported() {
        let mut columns = header();
        columns.retain(|c| c != "latitud" && c != "rubro");
        let table = Table::new(columns, vec![]);

        let err = extract_rows(&table, &ColumnConfig::default(), None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("'rubro' (category)"));
        assert!(err.contains("'latitud' (latitude)"));
    }

    #[test]
    fn test_non_numeric_quantity_fails() {
        let table = Table::new(
            header(),
            vec![row(
                Cell::Int(1),
                2021,
                Cell::Text("mucho".into()),
                Cell::Float(-33.4),
                Cell::Float(-70.6),
            )],
        );

        let result = extract_rows(&table, &ColumnConfig::default(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_numeric_quantity_on_filtered_row_is_ignored() {
        let table = Table::new(
            header(),
            vec![row(
                Cell::Int(1),
                2021,
                Cell::Text("mucho".into()),
                Cell::Empty,
                Cell::Float(-70.6),
            )],
        );

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert!(out.rows.is_empty());
    }

    #[test]
    fn test_bad_coordinate_on_filtered_row_is_ignored() {
        let table = Table::new(
            header(),
            vec![
                row(Cell::Int(1), 2021, Cell::Int(10), Cell::Int(1), Cell::Int(1)),
                row(Cell::Int(2), 2021, Cell::Int(5), Cell::Text("s/i".into()), Cell::Empty),
                row(Cell::Int(3), 2021, Cell::Int(5), Cell::Empty, Cell::Text("s/i".into())),
            ],
        );

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.without_coordinates, 2);
    }

    #[test]
    fn test_bad_coordinate_on_kept_row_fails() {
        let table = Table::new(
            header(),
            vec![row(Cell::Int(2), 2021, Cell::Int(5), Cell::Text("s/i".into()), Cell::Int(1))],
        );

        let err = extract_rows(&table, &ColumnConfig::default(), None).unwrap_err();
        assert!(format!("{err:#}").contains("latitud"));
    }

    #[test]
    fn test_empty_year_is_kept_without_year() {
        let mut cells = row(Cell::Int(1), 2021, Cell::Text("n/a".into()), Cell::Int(1), Cell::Int(1));
        cells[1] = Cell::Empty;
        let table = Table::new(header(), vec![cells]);

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].year, None);
        assert_eq!(out.rows[0].quantity, 0.0);
    }

    #[test]
    fn test_short_row_reads_as_empty() {
        // Built without Table::new, so the row is not padded
        let table = Table {
            columns: header(),
            rows: vec![vec![Cell::Int(1), Cell::Int(2021)]],
        };

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.without_coordinates, 1);
    }

    #[test]
    fn test_empty_quantity_counts_as_zero() {
        let table = Table::new(
            header(),
            vec![row(Cell::Int(1), 2021, Cell::Empty, Cell::Float(-33.4), Cell::Float(-70.6))],
        );

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert_eq!(out.rows[0].quantity, 0.0);
    }

    #[test]
    fn test_missing_id_is_dropped() {
        let table = Table::new(
            header(),
            vec![row(Cell::Empty, 2021, Cell::Float(1.0), Cell::Float(-33.4), Cell::Float(-70.6))],
        );

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(out.without_key, 1);
        assert_eq!(out.without_coordinates, 0);
    }

    #[test]
    fn test_integral_float_id_renders_as_integer() {
        let table = Table::new(
            header(),
            vec![row(
                Cell::Float(1234.0),
                2021,
                Cell::Float(1.0),
                Cell::Float(-33.4),
                Cell::Float(-70.6),
            )],
        );

        let out = extract_rows(&table, &ColumnConfig::default(), None).unwrap();
        assert_eq!(out.rows[0].id, "1234");
    }

    #[test]
    fn test_residue_column_is_read() {
        let mut columns = header();
        columns.push("nombre_residuo".into());
        let mut cells = row(Cell::Int(1), 2021, Cell::Float(1.0), Cell::Float(-33.4), Cell::Float(-70.6));
        cells.push(Cell::Text("Lodos".into()));
        let table = Table::new(columns, vec![cells]);

        let out = extract_rows(&table, &ColumnConfig::default(), Some(9)).unwrap();
        assert_eq!(out.rows[0].residue.as_deref(), Some("Lodos"));
    }

    #[test]
    fn test_cell_to_year() {
        assert_eq!(cell_to_year(&Cell::Int(2021)).unwrap(), Some(2021));
        assert_eq!(cell_to_year(&Cell::Float(2022.0)).unwrap(), Some(2022));
        assert_eq!(cell_to_year(&Cell::Text(" 2023 ".into())).unwrap(), Some(2023));
        assert_eq!(cell_to_year(&Cell::Empty).unwrap(), None);
        assert!(cell_to_year(&Cell::Float(2021.5)).is_err());
        assert!(cell_to_year(&Cell::Text("dos mil".into())).is_err());
    }
}
