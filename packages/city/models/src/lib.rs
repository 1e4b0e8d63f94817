#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City definition types.
//!
//! A city definition says where a city's three datasets live, which
//! attributes carry identifiers, dwelling counts, and listing categories,
//! and which administrative levels to aggregate into. Definitions are
//! written in TOML; paths are relative to a data directory chosen at run
//! time.

use rental_map_spatial_models::Crs;
use serde::{Deserialize, Serialize};

/// Everything needed to run one city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityDefinition {
    /// Unique identifier (e.g., `"barcelona"`).
    pub id: String,
    /// Human-readable municipality name.
    pub name: String,
    /// Province the municipality belongs to.
    pub province: String,
    /// CRS every dataset is reprojected into before the joins.
    #[serde(default)]
    pub crs: Crs,
    /// Cadastral parcels.
    pub parcels: ParcelSource,
    /// Short-term-rental listings.
    pub listings: ListingSource,
    /// Administrative boundaries.
    pub boundaries: BoundarySource,
    /// Property types counted as whole flats. Falls back to the built-in
    /// list when absent.
    #[serde(default)]
    pub entire_place_types: Option<Vec<String>>,
}

impl CityDefinition {
    /// Returns the level with the given id.
    #[must_use]
    pub fn level(&self, id: &str) -> Option<&LevelDefinition> {
        self.boundaries.levels.iter().find(|level| level.id == id)
    }
}

/// Cadastral parcel polygons as a `GeoJSON` `FeatureCollection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelSource {
    /// Path relative to the data directory.
    pub path: String,
    /// Property holding the parcel id. Row position is used when absent.
    #[serde(default)]
    pub id_field: Option<String>,
    /// Property holding the number of dwellings.
    pub dwellings_field: String,
}

/// Listing points as CSV (optionally gzip compressed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSource {
    /// Path relative to the data directory.
    pub path: String,
    /// Column holding the listing id. Row position is used when absent.
    #[serde(default = "default_listing_id")]
    pub id_column: Option<String>,
    /// Latitude column.
    #[serde(default = "default_latitude")]
    pub latitude_column: String,
    /// Longitude column.
    #[serde(default = "default_longitude")]
    pub longitude_column: String,
    /// Column holding the property type used for classification.
    #[serde(default = "default_property_type")]
    pub property_type_column: String,
    /// CSV delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

#[allow(clippy::unnecessary_wraps)]
fn default_listing_id() -> Option<String> {
    Some("id".to_string())
}

fn default_latitude() -> String {
    "latitude".to_string()
}

fn default_longitude() -> String {
    "longitude".to_string()
}

fn default_property_type() -> String {
    "property_type".to_string()
}

const fn default_delimiter() -> char {
    ','
}

/// Administrative boundary polygons, all levels in one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySource {
    /// Path relative to the data directory.
    pub path: String,
    /// Property telling which level a polygon belongs to.
    pub level_field: String,
    /// Levels to aggregate into, in processing order.
    pub levels: Vec<LevelDefinition>,
}

/// One administrative granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDefinition {
    /// Identifier, also the output file stem (e.g., `"censal_sections"`).
    pub id: String,
    /// Value of the level field selecting this level's polygons.
    pub value: String,
    /// Property holding the zone name, if the polygons carry one.
    #[serde(default)]
    pub name_field: Option<String>,
    /// Name taken from an enclosing level instead.
    #[serde(default)]
    pub name_lookup: Option<NameLookup>,
    /// Housing-stock source for ratios.
    #[serde(default)]
    pub denominator: DenominatorConfig,
}

/// Borrow zone names from another level through a shared code.
///
/// Censal sections carry their neighborhood code but not its name; the
/// name comes from the neighborhood polygon with the same code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameLookup {
    /// Level providing the names.
    pub parent_level: String,
    /// Property holding the shared code on both levels.
    pub key_field: String,
    /// Property holding the name on the parent level. Written under the
    /// same key on the child.
    pub name_field: String,
}

/// Housing-stock source for one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DenominatorConfig {
    /// Dwellings aggregated from cadastral parcels (`n_parcels`).
    #[default]
    Dwellings,
    /// A census attribute already present on every zone.
    ZoneField {
        /// Attribute name.
        field: String,
    },
}
