//! Zone result output.

use std::io::{BufWriter, Write as _};
use std::path::Path;

use rental_map_spatial_models::{Crs, ZoneResult};

use crate::GeoDataError;

/// Builds a `FeatureCollection` with one feature per result, in result
/// order. Properties are the zone's source attributes followed by the
/// derived count and ratio columns. A `crs` member is added for anything
/// other than WGS 84.
#[must_use]
pub fn results_to_geojson(results: &[ZoneResult], crs: Crs) -> geojson::FeatureCollection {
    let features = results
        .iter()
        .map(|result| geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&result.geometry))),
            id: None,
            properties: Some(result.properties()),
            foreign_members: None,
        })
        .collect();

    let foreign_members = (crs != Crs::WGS84).then(|| {
        let mut members = geojson::JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({"type": "name", "properties": {"name": crs.urn()}}),
        );
        members
    });

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Writes results to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`GeoDataError`] if the file cannot be created or written.
pub fn write_results(path: &Path, results: &[ZoneResult], crs: Crs) -> Result<(), GeoDataError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let collection = results_to_geojson(results, crs);
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;

    log::info!("Wrote {} zones to {}", results.len(), path.display());
    Ok(())
}
