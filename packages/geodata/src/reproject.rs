//! Coordinate transformation between the CRSs cities publish data in.
//!
//! Collections are mapped into one target CRS before they reach the join
//! engine. Geographic CRSs take and return degrees; `proj4rs` works in
//! radians for them, so conversion happens at the edges.

use geo::{Coord, MapCoords as _, MultiPolygon, Point};
use proj4rs::proj::Proj;
use rental_map_spatial_models::{
    Crs, Feature, FeatureCollection, FeatureGeometry, ZoneCollection,
};

use crate::GeoDataError;

struct Definition {
    proj4: String,
    geographic: bool,
}

/// PROJ.4 definition of the supported EPSG codes.
fn definition(crs: Crs) -> Option<Definition> {
    let epsg = crs.epsg();
    let (proj4, geographic) = match epsg {
        4326 => ("+proj=longlat +datum=WGS84 +no_defs".to_string(), true),
        4258 => (
            "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs".to_string(),
            true,
        ),
        25828..=25838 => (
            format!(
                "+proj=utm +zone={} +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
                epsg - 25800
            ),
            false,
        ),
        23028..=23038 => (
            format!(
                "+proj=utm +zone={} +ellps=intl +towgs84=-87,-98,-121,0,0,0,0 +units=m +no_defs",
                epsg - 23000
            ),
            false,
        ),
        32601..=32660 => (
            format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
                epsg - 32600
            ),
            false,
        ),
        32701..=32760 => (
            format!(
                "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
                epsg - 32700
            ),
            false,
        ),
        _ => return None,
    };
    Some(Definition { proj4, geographic })
}

/// Whether `crs` can be transformed from and to.
#[must_use]
pub fn is_supported(crs: Crs) -> bool {
    definition(crs).is_some()
}

/// A transformation from one CRS to another.
pub struct Reprojector {
    from: Crs,
    to: Crs,
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl Reprojector {
    /// Builds the transformation `from` → `to`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoDataError::UnsupportedCrs`] if either CRS has no known
    /// definition, or [`GeoDataError::Reprojection`] if one cannot be
    /// built.
    pub fn new(from: Crs, to: Crs) -> Result<Self, GeoDataError> {
        let source = definition(from).ok_or(GeoDataError::UnsupportedCrs { crs: from })?;
        let target = definition(to).ok_or(GeoDataError::UnsupportedCrs { crs: to })?;

        let build = |definition: &Definition| {
            Proj::from_proj_string(&definition.proj4).map_err(|e| GeoDataError::Reprojection {
                from,
                to,
                message: format!("invalid definition '{}': {e}", definition.proj4),
            })
        };

        Ok(Self {
            from,
            to,
            source: build(&source)?,
            target: build(&target)?,
            source_geographic: source.geographic,
            target_geographic: target.geographic,
        })
    }

    /// Transforms one coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`GeoDataError::Reprojection`] if the coordinate falls
    /// outside the domain of either CRS.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, GeoDataError> {
        let mut point = if self.source_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(&self.source, &self.target, &mut point).map_err(|e| {
            GeoDataError::Reprojection {
                from: self.from,
                to: self.to,
                message: format!("({}, {}): {e}", coord.x, coord.y),
            }
        })?;

        let (x, y) = if self.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if x.is_finite() && y.is_finite() {
            Ok(Coord { x, y })
        } else {
            Err(GeoDataError::Reprojection {
                from: self.from,
                to: self.to,
                message: format!("({}, {}) has no finite image", coord.x, coord.y),
            })
        }
    }

    /// Transforms every vertex of `geometry`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoDataError::Reprojection`] for the first vertex that
    /// cannot be transformed.
    pub fn multipolygon(
        &self,
        geometry: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, GeoDataError> {
        geometry.try_map_coords(|coord| self.coord(coord))
    }

    fn geometry(&self, geometry: &FeatureGeometry) -> Result<FeatureGeometry, GeoDataError> {
        Ok(match geometry {
            FeatureGeometry::Point(point) => {
                FeatureGeometry::Point(Point::from(self.coord(point.0)?))
            }
            FeatureGeometry::Area(area) => FeatureGeometry::Area(self.multipolygon(area)?),
        })
    }
}

/// Maps every zone into `to`, keeping zone order, names and attributes.
/// A collection already in `to` is returned as is.
///
/// # Errors
///
/// Returns [`GeoDataError`] if the transformation cannot be built or a
/// vertex cannot be transformed.
pub fn reproject_zones(zones: ZoneCollection, to: Crs) -> Result<ZoneCollection, GeoDataError> {
    if zones.crs() == to {
        return Ok(zones);
    }

    let reprojector = Reprojector::new(zones.crs(), to)?;
    let mut projected = ZoneCollection::new(to);
    for zone in &zones {
        projected.push(
            zone.name.clone(),
            reprojector.multipolygon(&zone.geometry)?,
            zone.attributes.clone(),
        );
    }

    log::info!("Reprojected {} zones from {} to {to}", projected.len(), zones.crs());
    Ok(projected)
}

/// Maps every feature into `to`, keeping ids, order and attributes.
/// Features without geometry stay without geometry. A collection already
/// in `to` is returned as is.
///
/// # Errors
///
/// Returns [`GeoDataError`] if the transformation cannot be built or a
/// vertex cannot be transformed.
pub fn reproject_features(
    features: FeatureCollection,
    to: Crs,
) -> Result<FeatureCollection, GeoDataError> {
    if features.crs() == to {
        return Ok(features);
    }

    let reprojector = Reprojector::new(features.crs(), to)?;
    let mut projected = FeatureCollection::new(features.kind(), to);
    for feature in &features {
        projected.push(Feature {
            id: feature.id.clone(),
            geometry: feature
                .geometry
                .as_ref()
                .map(|geometry| reprojector.geometry(geometry))
                .transpose()?,
            attributes: feature.attributes.clone(),
        });
    }

    log::info!(
        "Reprojected {} {} features from {} to {to}",
        projected.len(),
        features.kind(),
        features.crs()
    );
    Ok(projected)
}
