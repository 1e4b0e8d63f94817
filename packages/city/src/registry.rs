//! Compile-time registry of city definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a city requires creating a TOML file in `cities/` and adding a
//! corresponding entry here.

use rental_map_city_models::CityDefinition;

/// Number of registered cities. Enforced by a test.
#[cfg(test)]
const EXPECTED_CITY_COUNT: usize = 1;

/// Embedded TOML city definitions.
const CITY_TOMLS: &[(&str, &str)] = &[("barcelona", include_str!("../cities/barcelona.toml"))];

/// Returns all registered cities.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the tests below.
#[must_use]
pub fn all_cities() -> Vec<CityDefinition> {
    CITY_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse city definition '{name}': {e}"))
        })
        .collect()
}

/// Looks up a registered city by id.
#[must_use]
pub fn find_city(id: &str) -> Option<CityDefinition> {
    all_cities().into_iter().find(|city| city.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use rental_map_city_models::DenominatorConfig;

    use crate::validate;

    #[test]
    fn loads_all_cities() {
        let cities = all_cities();
        assert_eq!(
            cities.len(),
            EXPECTED_CITY_COUNT,
            "Expected {EXPECTED_CITY_COUNT} cities, found {}. \
             Update EXPECTED_CITY_COUNT after adding/removing cities.",
            cities.len()
        );
    }

    #[test]
    fn city_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for city in &all_cities() {
            assert!(seen.insert(city.id.clone()), "Duplicate city ID: {}", city.id);
        }
    }

    #[test]
    fn all_cities_validate() {
        for city in &all_cities() {
            validate(city).unwrap_or_else(|e| panic!("City {} is invalid: {e}", city.id));
        }
    }

    #[test]
    fn barcelona_has_three_levels() {
        let city = find_city("barcelona").unwrap();
        let ids: Vec<&str> = city.boundaries.levels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["censal_sections", "barris", "districts"]);
        assert_eq!(city.parcels.dwellings_field, "numberOfDwellings");
        assert_eq!(city.listings.id_column.as_deref(), Some("id"));
        assert_eq!(city.crs.epsg(), 4326);

        let censal = city.level("censal_sections").unwrap();
        assert_eq!(censal.denominator, DenominatorConfig::Dwellings);
        assert_eq!(censal.name_lookup.as_ref().unwrap().parent_level, "barris");
    }

    #[test]
    fn unknown_city_is_none() {
        assert!(find_city("atlantis").is_none());
    }
}
