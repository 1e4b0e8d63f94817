#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `GeoJSON` input and output.
//!
//! Reads administrative boundaries (split into levels) and cadastral
//! parcels from `GeoJSON` `FeatureCollection` files, and writes assembled
//! zone results back out. The CRS of a collection comes from the legacy
//! `crs` member when present and defaults to WGS 84 otherwise; collections
//! are reprojected into a city's CRS with [`reproject`].

pub mod boundary;
pub mod parcel;
pub mod reproject;
pub mod write;

use std::path::Path;

use geo::MultiPolygon;
use geojson::GeoJson;
use rental_map_spatial_models::{Crs, InvalidCrsError};
use thiserror::Error;

pub use boundary::Boundaries;
pub use parcel::read_parcels;
pub use reproject::{Reprojector, reproject_features, reproject_zones};
pub use write::{results_to_geojson, write_results};

/// Errors that can occur while reading or writing `GeoJSON`.
#[derive(Debug, Error)]
pub enum GeoDataError {
    /// The file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The results could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The `crs` member names an unsupported CRS.
    #[error(transparent)]
    Crs(#[from] InvalidCrsError),

    /// The document is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("Expected a FeatureCollection, found a {found}")]
    NotFeatureCollection {
        /// `GeoJSON` object type found instead.
        found: &'static str,
    },

    /// No transformation is known for this CRS.
    #[error("Unsupported CRS {crs}: no known transformation")]
    UnsupportedCrs {
        /// The CRS without a definition.
        crs: Crs,
    },

    /// A coordinate could not be transformed.
    #[error("Cannot reproject from {from} to {to}: {message}")]
    Reprojection {
        /// Source CRS.
        from: Crs,
        /// Target CRS.
        to: Crs,
        /// Details.
        message: String,
    },

    /// A feature has a geometry that is not a polygon.
    #[error("Feature {index} has a {found} geometry, expected a polygon")]
    NotPolygon {
        /// Position of the feature in the file.
        index: usize,
        /// Geometry type found.
        found: String,
    },
}

/// A parsed `FeatureCollection` with its CRS.
#[derive(Debug, Clone)]
pub struct RawCollection {
    /// CRS declared by the file, WGS 84 when undeclared.
    pub crs: Crs,
    /// Features in file order.
    pub features: Vec<geojson::Feature>,
}

/// Reads a `FeatureCollection` file.
///
/// # Errors
///
/// Returns [`GeoDataError`] if the file cannot be read, is not a
/// `FeatureCollection`, or declares an unsupported CRS.
pub fn read_collection(path: &Path) -> Result<RawCollection, GeoDataError> {
    let content = std::fs::read_to_string(path)?;
    let collection = parse_collection(&content)?;
    log::debug!(
        "Read {} features ({}) from {}",
        collection.features.len(),
        collection.crs,
        path.display()
    );
    Ok(collection)
}

/// Parses a `FeatureCollection` document.
///
/// # Errors
///
/// Returns [`GeoDataError`] if the document is not a `FeatureCollection`
/// or declares an unsupported CRS.
pub fn parse_collection(content: &str) -> Result<RawCollection, GeoDataError> {
    let collection = match content.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(_) => {
            return Err(GeoDataError::NotFeatureCollection { found: "Feature" });
        }
        GeoJson::Geometry(_) => {
            return Err(GeoDataError::NotFeatureCollection { found: "Geometry" });
        }
    };

    let crs = declared_crs(collection.foreign_members.as_ref())?.unwrap_or_default();

    Ok(RawCollection {
        crs,
        features: collection.features,
    })
}

/// Reads the legacy `{"crs": {"type": "name", "properties": {"name": ...}}}`
/// member.
fn declared_crs(
    foreign_members: Option<&geojson::JsonObject>,
) -> Result<Option<Crs>, InvalidCrsError> {
    foreign_members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(serde_json::Value::as_str)
        .map(str::parse)
        .transpose()
}

/// Renders a property value as text for key comparisons. Strings are
/// trimmed; numbers use their JSON form; anything else has no text.
#[must_use]
pub fn property_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts a feature geometry to a multipolygon. `Ok(None)` for a null
/// geometry.
///
/// # Errors
///
/// Returns [`GeoDataError::NotPolygon`] for any other geometry type.
pub fn to_multipolygon(
    index: usize,
    geometry: Option<&geojson::Geometry>,
) -> Result<Option<MultiPolygon<f64>>, GeoDataError> {
    let Some(geometry) = geometry else {
        return Ok(None);
    };

    let not_polygon = || GeoDataError::NotPolygon {
        index,
        found: geometry_type(&geometry.value).to_string(),
    };

    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().map_err(|_| not_polygon())?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(Some(mp)),
        geo::Geometry::Polygon(p) => Ok(Some(MultiPolygon(vec![p]))),
        _ => Err(not_polygon()),
    }
}

const fn geometry_type(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
