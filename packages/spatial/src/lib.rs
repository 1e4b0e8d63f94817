#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial aggregation engine for rental density per zone.
//!
//! Assigns parcels and listings to administrative zones through an R-tree
//! backed spatial join, sums weighted counts per zone, derives percentage
//! ratios, and assembles the final per-zone records. Every stage is a
//! function of its inputs; [`pipeline::run`] threads one immutable
//! [`pipeline::RunContext`] through all of them.

pub mod aggregate;
pub mod assemble;
pub mod index;
pub mod join;
pub mod pipeline;
pub mod ratio;

use rental_map_spatial_models::{Crs, FeatureId, FeatureKind, ZoneId};
use thiserror::Error;

/// Geometry or schema problems that make a join impossible.
///
/// These are caller configuration defects and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataShapeError {
    /// Features and zones are in different coordinate systems. Callers
    /// must reproject before invoking the engine.
    #[error("CRS mismatch: features are in {features}, zones are in {zones}")]
    CrsMismatch {
        /// CRS of the feature collection.
        features: Crs,
        /// CRS of the zone collection.
        zones: Crs,
    },

    /// A non-empty feature collection without a single geometry.
    #[error("{kind} collection has {count} features but no geometry")]
    MissingGeometry {
        /// Kind of the collection.
        kind: FeatureKind,
        /// Number of features in the collection.
        count: usize,
    },

    /// A feature whose geometry does not fit its collection's kind.
    #[error("feature {id} in {kind} collection has {found} geometry, expected {expected}")]
    UnexpectedGeometry {
        /// Kind of the collection.
        kind: FeatureKind,
        /// Offending feature.
        id: FeatureId,
        /// Shape found.
        found: &'static str,
        /// Shape required by the kind.
        expected: &'static str,
    },

    /// A zone whose polygon has no coordinates.
    #[error("{zone} has no polygon geometry")]
    EmptyZoneGeometry {
        /// Offending zone.
        zone: ZoneId,
    },
}

/// Errors that can occur while running the engine.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The zone collection cannot be indexed.
    #[error("Zone error: {0}")]
    Zones(#[source] DataShapeError),

    /// One metric's join failed.
    #[error("Join failed for metric '{metric}': {source}")]
    Join {
        /// Metric whose join failed.
        metric: String,
        /// Underlying shape error.
        #[source]
        source: DataShapeError,
    },

    /// The aggregation plan is unusable.
    #[error("Invalid aggregation plan: {message}")]
    InvalidPlan {
        /// Description of what went wrong.
        message: String,
    },
}
