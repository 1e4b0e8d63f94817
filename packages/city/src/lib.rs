#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City definitions: the embedded registry and file-based overrides.
//!
//! Definitions are TOML documents following [`CityDefinition`]. Built-in
//! cities are embedded at compile time, following the same registry
//! pattern as neighborhood sources; a definition file on disk can be used
//! instead for cities that are not registered.

pub mod registry;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rental_map_city_models::CityDefinition;
use thiserror::Error;

/// Errors that can occur while loading city definitions.
#[derive(Debug, Error)]
pub enum CityError {
    /// The definition file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The definition is not valid TOML for a [`CityDefinition`].
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// No registered city has this id.
    #[error("Unknown city '{id}'")]
    UnknownCity {
        /// Requested id.
        id: String,
    },

    /// The definition parsed but is inconsistent.
    #[error("Invalid city definition '{city}': {message}")]
    Invalid {
        /// City id.
        city: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// Loads and validates a definition from a TOML file.
///
/// # Errors
///
/// Returns [`CityError`] if the file cannot be read, parsed, or validated.
pub fn load_city_file(path: &Path) -> Result<CityDefinition, CityError> {
    let content = std::fs::read_to_string(path)?;
    let city: CityDefinition = toml::de::from_str(&content)?;
    validate(&city)?;
    log::info!("Loaded city definition '{}' from {}", city.id, path.display());
    Ok(city)
}

/// Returns a registered city, validated.
///
/// # Errors
///
/// Returns [`CityError::UnknownCity`] if no city has this id.
pub fn registered_city(id: &str) -> Result<CityDefinition, CityError> {
    let city = registry::find_city(id).ok_or_else(|| CityError::UnknownCity {
        id: id.to_string(),
    })?;
    validate(&city)?;
    Ok(city)
}

/// Checks level ids are unique and name lookups point at another
/// existing level.
///
/// # Errors
///
/// Returns [`CityError::Invalid`] describing the first problem found.
pub fn validate(city: &CityDefinition) -> Result<(), CityError> {
    let invalid = |message: String| CityError::Invalid {
        city: city.id.clone(),
        message,
    };

    if city.id.trim().is_empty() {
        return Err(invalid("empty id".to_string()));
    }
    if city.boundaries.levels.is_empty() {
        return Err(invalid("no boundary levels".to_string()));
    }

    let mut seen = BTreeSet::new();
    for level in &city.boundaries.levels {
        if level.id.trim().is_empty() {
            return Err(invalid("level with empty id".to_string()));
        }
        if !seen.insert(level.id.as_str()) {
            return Err(invalid(format!("level '{}' defined twice", level.id)));
        }
    }

    for level in &city.boundaries.levels {
        if let Some(lookup) = &level.name_lookup {
            if lookup.parent_level == level.id {
                return Err(invalid(format!(
                    "level '{}' looks up names from itself",
                    level.id
                )));
            }
            if !seen.contains(lookup.parent_level.as_str()) {
                return Err(invalid(format!(
                    "level '{}' looks up names from unknown level '{}'",
                    level.id, lookup.parent_level
                )));
            }
        }
    }

    if !city.listings.delimiter.is_ascii() {
        return Err(invalid(format!(
            "listing delimiter '{}' is not ASCII",
            city.listings.delimiter
        )));
    }

    Ok(())
}

/// Resolves a dataset path against the data directory. Absolute paths are
/// kept as is.
#[must_use]
pub fn resolve_path(data_dir: &Path, relative: &str) -> PathBuf {
    let path = Path::new(relative);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        id = "testville"
        name = "Testville"
        province = "Test"

        [parcels]
        path = "parcels.geojson"
        dwellings_field = "dwellings"

        [listings]
        path = "listings.csv"

        [boundaries]
        path = "zones.geojson"
        level_field = "kind"

        [[boundaries.levels]]
        id = "sections"
        value = "section"

        [boundaries.levels.name_lookup]
        parent_level = "hoods"
        key_field = "HOOD"
        name_field = "NAME"

        [[boundaries.levels]]
        id = "hoods"
        value = "hood"
        name_field = "NAME"
        denominator = { type = "zone_field", field = "households" }
    "#;

    fn parse(toml_str: &str) -> CityDefinition {
        toml::de::from_str(toml_str).unwrap()
    }

    #[test]
    fn minimal_definition_uses_defaults() {
        let city = parse(MINIMAL);
        validate(&city).unwrap();

        assert_eq!(city.crs.epsg(), 4326);
        assert_eq!(city.parcels.id_field, None);
        assert_eq!(city.listings.latitude_column, "latitude");
        assert_eq!(city.listings.property_type_column, "property_type");
        assert_eq!(city.listings.delimiter, ',');
        assert!(city.entire_place_types.is_none());
        assert_eq!(
            city.level("hoods").unwrap().denominator,
            rental_map_city_models::DenominatorConfig::ZoneField {
                field: "households".to_string()
            }
        );
    }

    #[test]
    fn rejects_duplicate_levels() {
        let mut city = parse(MINIMAL);
        city.boundaries.levels[1].id = "sections".to_string();
        assert!(matches!(validate(&city), Err(CityError::Invalid { .. })));
    }

    #[test]
    fn rejects_lookup_from_unknown_level() {
        let mut city = parse(MINIMAL);
        city.boundaries.levels.truncate(1);
        let err = validate(&city).unwrap_err();
        assert!(err.to_string().contains("unknown level 'hoods'"));
    }

    #[test]
    fn unknown_registered_city_is_an_error() {
        assert!(matches!(
            registered_city("atlantis"),
            Err(CityError::UnknownCity { .. })
        ));
    }

    #[test]
    fn resolves_relative_paths_against_data_dir() {
        let data_dir = Path::new("/srv/data");
        assert_eq!(
            resolve_path(data_dir, "barcelona/parcels.geojson"),
            PathBuf::from("/srv/data/barcelona/parcels.geojson")
        );
        assert_eq!(
            resolve_path(data_dir, "/tmp/x.csv"),
            PathBuf::from("/tmp/x.csv")
        );
    }
}
