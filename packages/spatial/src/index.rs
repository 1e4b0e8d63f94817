//! R-tree over zone bounding boxes.
//!
//! Candidate zones come from envelope intersection; the exact predicate
//! for the feature's geometry then decides the match.

use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point};
use rental_map_spatial_models::{Crs, FeatureGeometry, ZoneCollection, ZoneId};
use rstar::{AABB, RTree, RTreeObject};

use crate::DataShapeError;

/// A zone envelope stored in the R-tree.
struct ZoneEntry {
    zone: ZoneId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over one zone collection.
///
/// Built once per run and shared read-only by every metric's join.
pub struct ZoneIndex<'a> {
    zones: &'a ZoneCollection,
    tree: RTree<ZoneEntry>,
}

impl<'a> ZoneIndex<'a> {
    /// Builds the index.
    ///
    /// # Errors
    ///
    /// Returns [`DataShapeError::EmptyZoneGeometry`] if a zone has no
    /// polygon to compare against.
    pub fn build(zones: &'a ZoneCollection) -> Result<Self, DataShapeError> {
        let mut entries = Vec::with_capacity(zones.len());

        for zone in zones {
            let envelope = compute_envelope(&zone.geometry)
                .ok_or(DataShapeError::EmptyZoneGeometry { zone: zone.id })?;
            entries.push(ZoneEntry {
                zone: zone.id,
                envelope,
            });
        }

        log::debug!("Indexed {} zones", entries.len());

        Ok(Self {
            zones,
            tree: RTree::bulk_load(entries),
        })
    }

    /// CRS of the indexed zones.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.zones.crs()
    }

    /// The indexed zones.
    #[must_use]
    pub const fn zones(&self) -> &'a ZoneCollection {
        self.zones
    }

    /// Every zone matching `geometry`, in ascending zone order.
    ///
    /// Points match zones that strictly contain them (a point on a zone
    /// boundary matches nothing there). Areas match every zone they
    /// intersect, shared edges included.
    #[must_use]
    pub fn matches(&self, geometry: &FeatureGeometry) -> Vec<ZoneId> {
        let mut matched: Vec<ZoneId> = match geometry {
            FeatureGeometry::Point(point) => self.matches_point(*point),
            FeatureGeometry::Area(area) => self.matches_area(area),
        };
        matched.sort_unstable();
        matched
    }

    fn matches_point(&self, point: Point<f64>) -> Vec<ZoneId> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| self.geometry(entry.zone).is_some_and(|g| g.contains(&point)))
            .map(|entry| entry.zone)
            .collect()
    }

    fn matches_area(&self, area: &MultiPolygon<f64>) -> Vec<ZoneId> {
        let Some(query_env) = compute_envelope(area) else {
            return Vec::new();
        };

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| self.geometry(entry.zone).is_some_and(|g| g.intersects(area)))
            .map(|entry| entry.zone)
            .collect()
    }

    fn geometry(&self, zone: ZoneId) -> Option<&MultiPolygon<f64>> {
        self.zones.get(zone).map(|z| &z.geometry)
    }
}

/// Computes the bounding box envelope for a [`MultiPolygon`], `None` when
/// it has no coordinates.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
