//! Administrative boundaries split into levels.
//!
//! A single boundary file holds every granularity (districts,
//! neighborhoods, censal sections); a discriminator property tells them
//! apart. Zones of a level are numbered in file order.

use std::collections::BTreeMap;
use std::path::Path;

use geo::BoundingRect as _;
use rental_map_city_models::{BoundarySource, LevelDefinition, NameLookup};
use rental_map_spatial_models::{Crs, ZoneCollection};

use crate::{GeoDataError, RawCollection, property_text, read_collection, to_multipolygon};

/// All boundary polygons of a city.
#[derive(Debug, Clone)]
pub struct Boundaries {
    crs: Crs,
    level_field: String,
    features: Vec<geojson::Feature>,
}

impl Boundaries {
    /// Wraps a parsed collection.
    #[must_use]
    pub fn new(collection: RawCollection, level_field: impl Into<String>) -> Self {
        Self {
            crs: collection.crs,
            level_field: level_field.into(),
            features: collection.features,
        }
    }

    /// Reads the boundary file.
    ///
    /// # Errors
    ///
    /// Returns [`GeoDataError`] if the file cannot be read or parsed.
    pub fn load(path: &Path, source: &BoundarySource) -> Result<Self, GeoDataError> {
        let boundaries = Self::new(read_collection(path)?, source.level_field.clone());
        log::info!(
            "Loaded {} boundary polygons from {}",
            boundaries.features.len(),
            path.display()
        );
        Ok(boundaries)
    }

    /// CRS of every boundary.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Features of one level with their file position.
    fn level_features<'a>(
        &'a self,
        value: &'a str,
    ) -> impl Iterator<Item = (usize, &'a geojson::Feature)> + 'a {
        self.features.iter().enumerate().filter(move |(_, feature)| {
            feature
                .property(&self.level_field)
                .and_then(property_text)
                .is_some_and(|v| v == value)
        })
    }

    /// Builds the zone collection of `level`.
    ///
    /// Features with a null geometry or a polygon without coordinates are
    /// skipped with a warning: neither can contain anything. Names come
    /// from the level's name field or, failing that, its name lookup
    /// into `levels`. A looked-up name is also written into the zone's
    /// attributes under the parent's name field (`null` when no parent
    /// matches).
    ///
    /// # Errors
    ///
    /// Returns [`GeoDataError::NotPolygon`] if a feature of the level has
    /// a non-polygon geometry.
    pub fn zones(
        &self,
        level: &LevelDefinition,
        levels: &[LevelDefinition],
    ) -> Result<ZoneCollection, GeoDataError> {
        let names = level
            .name_lookup
            .as_ref()
            .map(|lookup| self.lookup_table(lookup, levels));

        let mut zones = ZoneCollection::new(self.crs);
        let mut skipped = 0usize;

        for (index, feature) in self.level_features(&level.value) {
            let Some(geometry) = to_multipolygon(index, feature.geometry.as_ref())?
                .filter(|geometry| geometry.bounding_rect().is_some())
            else {
                skipped += 1;
                continue;
            };

            let mut attributes = feature.properties.clone().unwrap_or_default();
            let mut name = level
                .name_field
                .as_deref()
                .and_then(|field| attributes.get(field))
                .and_then(property_text);

            if let (Some(lookup), Some(names)) = (&level.name_lookup, &names) {
                let looked_up = attributes
                    .get(&lookup.key_field)
                    .and_then(property_text)
                    .and_then(|key| names.get(&key).cloned());
                attributes.insert(
                    lookup.name_field.clone(),
                    looked_up
                        .clone()
                        .map_or(serde_json::Value::Null, serde_json::Value::String),
                );
                if name.is_none() {
                    name = looked_up;
                }
            }

            zones.push(name, geometry, attributes);
        }

        if skipped > 0 {
            log::warn!(
                "Skipped {skipped} '{}' boundaries without coordinates",
                level.value
            );
        }
        log::info!("Level '{}': {} zones", level.id, zones.len());

        Ok(zones)
    }

    /// Maps parent key → parent name. The first parent with a key wins.
    fn lookup_table(
        &self,
        lookup: &NameLookup,
        levels: &[LevelDefinition],
    ) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();

        let Some(parent) = levels.iter().find(|l| l.id == lookup.parent_level) else {
            log::warn!(
                "Name lookup parent level '{}' is not defined",
                lookup.parent_level
            );
            return names;
        };

        for (_, feature) in self.level_features(&parent.value) {
            let key = feature.property(&lookup.key_field).and_then(property_text);
            let name = feature.property(&lookup.name_field).and_then(property_text);
            if let (Some(key), Some(name)) = (key, name) {
                names.entry(key).or_insert(name);
            }
        }

        log::debug!(
            "Name lookup from '{}': {} entries",
            lookup.parent_level,
            names.len()
        );
        names
    }
}
