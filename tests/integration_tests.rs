use ecomap_etl::aggregate::{NO_RESIDUE_LABEL, convert};
use ecomap_etl::analyzers::analyzer::analyze_location;
use ecomap_etl::analyzers::types::Location;
use ecomap_etl::config::ColumnConfig;
use ecomap_etl::geojson::FeatureCollection;
use ecomap_etl::output::write_collection;
use ecomap_etl::table::Table;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sinader_sample.csv")
}

fn convert_fixture() -> FeatureCollection {
    let table = Table::load(&fixture()).expect("Failed to load fixture");
    let (collection, _) = convert(&table, &ColumnConfig::default()).expect("Conversion failed");
    collection
}

#[test]
fn test_full_pipeline() {
    let table = Table::load(&fixture()).unwrap();
    let (collection, stats) = convert(&table, &ColumnConfig::default()).unwrap();

    assert_eq!(stats.total_rows, 7);
    assert_eq!(stats.valid_rows, 5);
    assert_eq!(stats.years, vec![2021, 2022, 2023]);
    assert_eq!(stats.residue_column.as_deref(), Some("ler_subcapitulo"));

    let ids: Vec<_> = collection
        .features
        .iter()
        .map(|f| f.properties.id_vu.as_str())
        .collect();
    assert_eq!(ids, vec!["101", "202"]);

    let norte = &collection.features[0].properties;
    assert_eq!(norte.name, "Planta Norte");
    assert_eq!(norte.yearly.get(2021), Some(15.0));
    assert_eq!(norte.yearly.get(2022), Some(0.0));
    assert_eq!(norte.yearly.get(2023), Some(3.33));
    assert_eq!(norte.total_tonnage, 18.33);
    assert_eq!(norte.residues, "Cenizas, Lodos");
    // First valid row supplies the coordinates
    assert_eq!(collection.features[0].geometry.coordinates, [-70.40, -23.65]);

    let sur = &collection.features[1].properties;
    assert_eq!(sur.total_tonnage, 9.25);
    // Residue column present but blank for this establishment
    assert_eq!(sur.residues, "");
}

#[test]
fn test_every_history_uses_the_same_years() {
    let collection = convert_fixture();
    for feature in &collection.features {
        let years: Vec<i64> = feature.properties.history.iter().map(|h| h.year).collect();
        assert_eq!(years, vec![2021, 2022, 2023]);
    }
}

#[test]
fn test_total_matches_yearly_fields() {
    let collection = convert_fixture();
    for feature in &collection.features {
        let p = &feature.properties;
        let sum: f64 = p.yearly.iter().map(|(_, v)| v).sum();
        assert!((p.total_tonnage - sum).abs() < 1e-9);
    }
}

#[test]
fn test_coordinates_are_never_zero() {
    let collection = convert_fixture();
    for feature in &collection.features {
        assert_ne!(feature.geometry.latitude(), 0.0);
        assert_ne!(feature.geometry.longitude(), 0.0);
    }
}

#[test]
fn test_missing_residue_column_uses_label() {
    let path = env::temp_dir().join("ecomap_etl_it_no_residue.csv");
    fs::write(
        &path,
        "id_vu,año,cantidad_toneladas,razon_social,rubro,comuna,region,latitud,longitud\n\
         1,2021,10,A,R,C,Reg,1,1\n\
         1,2022,5,A,R,C,Reg,1,1\n\
         2,2021,0,B,R,C,Reg,0,0\n",
    )
    .unwrap();

    let table = Table::load(&path).unwrap();
    let (collection, stats) = convert(&table, &ColumnConfig::default()).unwrap();
    assert_eq!(stats.residue_column, None);
    assert_eq!(collection.features.len(), 1);

    let a = &collection.features[0].properties;
    assert_eq!(a.total_tonnage, 15.0);
    assert_eq!(a.residues, NO_RESIDUE_LABEL);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_write_and_analyze() {
    let collection = convert_fixture();
    let path = env::temp_dir().join("ecomap_etl_it_layer.geojson");
    write_collection(&path, &collection, false).unwrap();

    let loaded = FeatureCollection::load(&path).unwrap();
    assert_eq!(loaded, collection);

    let origin = Location { lat: -23.65, lng: -70.40 };
    let report = analyze_location(origin, &loaded, 5.0).unwrap();
    assert_eq!(report.stats.count, 1);
    assert_eq!(report.top_ids, vec!["101"]);
    assert_eq!(report.stats.regional_name.as_deref(), Some("Antofagasta"));

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_unparseable_coordinate_on_dropped_row_is_skipped() {
    let path = env::temp_dir().join("ecomap_etl_it_bad_coordinate.csv");
    fs::write(
        &path,
        "id_vu,año,cantidad_toneladas,razon_social,rubro,comuna,region,latitud,longitud\n\
         1,2021,10,A,R,C,Reg,1,1\n\
         2,2021,5,B,R,C,Reg,s/i,\n",
    )
    .unwrap();

    let table = Table::load(&path).unwrap();
    let (collection, stats) = convert(&table, &ColumnConfig::default()).unwrap();
    assert_eq!(collection.features.len(), 1);
    assert_eq!(stats.valid_rows, 1);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_residues_include_rows_without_year() {
    let path = env::temp_dir().join("ecomap_etl_it_undated_residue.csv");
    fs::write(
        &path,
        "id_vu,año,cantidad_toneladas,razon_social,rubro,comuna,region,latitud,longitud,nombre_residuo\n\
         1,2021,10,A,R,C,Reg,1,1,Lodos\n\
         1,,3,A,R,C,Reg,1,1,Cenizas\n",
    )
    .unwrap();

    let table = Table::load(&path).unwrap();
    let (collection, stats) = convert(&table, &ColumnConfig::default()).unwrap();
    assert_eq!(stats.years, vec![2021]);

    let a = &collection.features[0].properties;
    assert_eq!(a.residues, "Cenizas, Lodos");
    // The undated row carries no tonnage
    assert_eq!(a.total_tonnage, 10.0);

    fs::remove_file(&path).unwrap();
}
