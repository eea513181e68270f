pub mod aggregate;
pub mod analyzers;
pub mod config;
pub mod geojson;
pub mod output;
pub mod record;
pub mod table;
