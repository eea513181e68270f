//! Output persistence for the generated collection.
//!
//! Writes pretty JSON (optionally gzip-compressed) to a temporary sibling
//! file and renames it into place, so a failed run never leaves a partial
//! document behind.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::geojson::FeatureCollection;

/// Logs the first feature of the collection as a sample.
pub fn log_sample(collection: &FeatureCollection) {
    if let Some(sample) = collection.features.first() {
        let p = &sample.properties;
        info!(
            id_vu = %p.id_vu,
            name = %p.name,
            category = %p.category,
            history = ?p.history,
            "Sample feature"
        );
    }
}

/// Path actually written for `path`: `.gz` is appended when compressing.
pub fn final_path(path: &Path, gzip: bool) -> PathBuf {
    if gzip {
        let mut name = path.as_os_str().to_os_string();
        name.push(".gz");
        PathBuf::from(name)
    } else {
        path.to_path_buf()
    }
}

/// Serializes `collection` to `path`, creating parent directories as needed.
///
/// Returns the path written.
#[tracing::instrument(skip(collection), fields(path = %path.display(), features = collection.features.len()))]
pub fn write_collection(path: &Path, collection: &FeatureCollection, gzip: bool) -> Result<PathBuf> {
    let target = final_path(path, gzip);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut tmp_name = target.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = write_to(&tmp, collection, gzip);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, &target)
        .with_context(|| format!("failed to move output into {}", target.display()))?;

    let bytes = fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
    debug!(bytes, "Output written");
    info!(path = %target.display(), features = collection.features.len(), "GeoJSON generated");
    Ok(target)
}

fn write_to(path: &Path, collection: &FeatureCollection, gzip: bool) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);

    if gzip {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, collection)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        serde_json::to_writer_pretty(&mut writer, collection)?;
        writer.flush()?;
    }

    Ok(())
}
