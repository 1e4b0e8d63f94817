//! Cadastral parcel reading.

use std::path::Path;

use geojson::feature::Id;
use rental_map_city_models::ParcelSource;
use rental_map_spatial_models::{FeatureCollection, FeatureGeometry, FeatureKind};

use crate::{GeoDataError, RawCollection, property_text, read_collection, to_multipolygon};

/// Reads parcel polygons into a parcel feature collection.
///
/// # Errors
///
/// Returns [`GeoDataError`] if the file cannot be read or parsed, or a
/// parcel has a non-polygon geometry.
pub fn read_parcels(
    path: &Path,
    source: &ParcelSource,
) -> Result<FeatureCollection, GeoDataError> {
    let parcels = parcels_from_collection(read_collection(path)?, source)?;
    log::info!("Loaded {} parcels from {}", parcels.len(), path.display());
    Ok(parcels)
}

/// Converts a parsed collection into parcels.
///
/// The id comes from the configured id property, then the `GeoJSON`
/// feature id, then the position in the file. Parcels without geometry
/// are kept so the join can count them as unmatched.
///
/// # Errors
///
/// Returns [`GeoDataError::NotPolygon`] if a parcel has a non-polygon
/// geometry.
pub fn parcels_from_collection(
    collection: RawCollection,
    source: &ParcelSource,
) -> Result<FeatureCollection, GeoDataError> {
    let mut parcels = FeatureCollection::new(FeatureKind::Parcel, collection.crs);
    let mut without_geometry = 0usize;

    for (index, feature) in collection.features.into_iter().enumerate() {
        let geometry = to_multipolygon(index, feature.geometry.as_ref())?;
        if geometry.is_none() {
            without_geometry += 1;
        }

        let attributes = feature.properties.unwrap_or_default();
        let given = source
            .id_field
            .as_deref()
            .and_then(|field| attributes.get(field))
            .and_then(property_text)
            .or_else(|| feature.id.map(id_text));

        parcels.push_row(given, geometry.map(FeatureGeometry::Area), attributes);
    }

    if without_geometry > 0 {
        log::warn!("{without_geometry} parcels have no geometry");
    }

    Ok(parcels)
}

fn id_text(id: Id) -> String {
    match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    }
}
