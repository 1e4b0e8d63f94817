#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Short-term-rental listings.
//!
//! Reads a listing CSV and splits it into two point collections, whole
//! flats and rooms, ready to be joined against zones.

pub mod classify;
pub mod read;

use std::path::Path;

use rental_map_city_models::ListingSource;
use rental_map_spatial_models::{
    Crs, Feature, FeatureCollection, FeatureGeometry, FeatureId, FeatureKind,
};
use thiserror::Error;

pub use classify::{ListingCategory, PropertyTypeClassifier};
pub use read::Listing;

/// Attribute added to every listing with its [`ListingCategory`].
pub const CATEGORY_ATTRIBUTE: &str = "category";

/// Errors that can occur while reading listings.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The file could not be read or decompressed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV is malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is not in the header.
    #[error("Listing CSV has no '{column}' column")]
    MissingColumn {
        /// Column name.
        column: String,
    },

    /// Invalid reader settings.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },
}

/// Listings split by category.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSets {
    /// Whole-dwelling listings.
    pub flats: FeatureCollection,
    /// Room listings.
    pub rooms: FeatureCollection,
}

/// Splits listings into flat and room point collections.
///
/// Identifiers come from the id column, or the row position in the
/// source file, so the same listing keeps its identity in either set.
/// Each feature gets a [`CATEGORY_ATTRIBUTE`] attribute.
#[must_use]
pub fn split_listings(
    listings: Vec<Listing>,
    classifier: &PropertyTypeClassifier,
    crs: Crs,
) -> ListingSets {
    let mut flats = FeatureCollection::new(FeatureKind::Listing, crs);
    let mut rooms = FeatureCollection::new(FeatureKind::Listing, crs);

    for listing in listings {
        let category = classifier.classify(&listing.property_type);
        let mut attributes = listing.attributes;
        attributes.insert(
            CATEGORY_ATTRIBUTE.to_string(),
            serde_json::Value::String(category.to_string()),
        );

        let feature = Feature {
            id: FeatureId::or_position(listing.id, listing.row),
            geometry: listing.point.map(FeatureGeometry::Point),
            attributes,
        };

        match category {
            ListingCategory::Flat => flats.push(feature),
            ListingCategory::Room => rooms.push(feature),
        }
    }

    log::info!(
        "Classified listings: {} flats, {} rooms",
        flats.len(),
        rooms.len()
    );

    ListingSets { flats, rooms }
}

/// Reads a listing file and splits it with the given classifier.
///
/// # Errors
///
/// Returns [`ListingError`] if the file cannot be read or parsed.
pub fn load_listings(
    path: &Path,
    source: &ListingSource,
    classifier: &PropertyTypeClassifier,
    crs: Crs,
) -> Result<ListingSets, ListingError> {
    let listings = read::read_listings(path, source)?;
    Ok(split_listings(listings, classifier, crs))
}
