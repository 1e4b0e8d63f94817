#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City runs for the `rental_map` binary.
//!
//! Loads a city's boundaries, parcels, and listings, aggregates them into
//! every configured administrative level, and writes one `GeoJSON` file
//! per level.

pub mod pipeline;

use rental_map_city::CityError;
use rental_map_geodata::GeoDataError;
use rental_map_listing::ListingError;
use rental_map_spatial::SpatialError;
use thiserror::Error;

pub use pipeline::{LevelSummary, RunOptions, run_city};

/// Errors that can stop a city run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The city definition could not be loaded.
    #[error(transparent)]
    City(#[from] CityError),

    /// The listing file could not be read.
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    /// A boundary or parcel file could not be read, or a dataset could
    /// not be reprojected.
    #[error("Geodata error: {0}")]
    GeoData(#[from] GeoDataError),

    /// The engine failed for one level.
    #[error("Level '{level}': {source}")]
    Level {
        /// Level id.
        level: String,
        /// Underlying engine error, naming the metric when a join failed.
        #[source]
        source: SpatialError,
    },

    /// A level's results could not be written.
    #[error("Level '{level}' output: {source}")]
    Output {
        /// Level id.
        level: String,
        /// Underlying write error.
        #[source]
        source: GeoDataError,
    },

    /// A requested level is not defined for the city.
    #[error("City '{city}' has no level '{level}'")]
    UnknownLevel {
        /// City id.
        city: String,
        /// Requested level id.
        level: String,
    },
}
