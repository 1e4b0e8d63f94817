//! Feature-to-zone spatial join with first-match deduplication.
//!
//! Each feature is assigned to at most one zone: the first zone (in
//! ascending zone order) that its geometry matches. A parcel straddling
//! two zones is therefore counted once, in the lower-indexed zone, never
//! split by overlap area. Features sharing an identifier are collapsed to
//! the first one that matched anything.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rental_map_spatial_models::{Feature, FeatureCollection, FeatureId, WeightSource, ZoneId};

use crate::DataShapeError;
use crate::index::ZoneIndex;

/// A weight value that failed numeric coercion and was counted as `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionWarning {
    /// Feature carrying the value.
    pub feature: FeatureId,
    /// Weight column.
    pub column: String,
    /// The raw value, `None` when the attribute was missing.
    pub raw: Option<serde_json::Value>,
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(raw) => write!(
                f,
                "feature {}: '{}' value {raw} is not a weight, counted as 0",
                self.feature, self.column
            ),
            None => write!(
                f,
                "feature {}: '{}' is missing, counted as 0",
                self.feature, self.column
            ),
        }
    }
}

/// One feature→zone assignment that survived deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Assigned feature.
    pub feature: FeatureId,
    /// Receiving zone.
    pub zone: ZoneId,
}

/// Counters describing one join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Features in the input collection.
    pub features: usize,
    /// Features assigned to a zone.
    pub assigned: usize,
    /// Features that matched no zone (or had no geometry).
    pub unmatched: usize,
    /// Assigned features that matched more than one zone.
    pub multi_matched: usize,
    /// Matching features dropped because their id was already assigned.
    pub duplicate_ids: usize,
}

/// Output of [`spatial_join`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOutcome {
    /// Weighted sum per zone. Zones without assignments are absent.
    pub sums: BTreeMap<ZoneId, f64>,
    /// Surviving assignments in feature order.
    pub assignments: Vec<Assignment>,
    /// Counters.
    pub stats: JoinStats,
    /// Weight values that were coerced to `0`.
    pub warnings: Vec<CoercionWarning>,
}

/// Joins `features` against the indexed zones and sums weights per zone.
///
/// Parcels match every zone they intersect; listings match only a zone
/// strictly containing them. Either way only the first match is kept.
///
/// # Errors
///
/// Returns [`DataShapeError`] if the CRSs differ, the collection has
/// features but no geometry at all, or a geometry has the wrong shape for
/// the collection's kind.
pub fn spatial_join(
    features: &FeatureCollection,
    zones: &ZoneIndex<'_>,
    weight: &WeightSource,
) -> Result<JoinOutcome, DataShapeError> {
    validate(features, zones)?;

    let mut outcome = JoinOutcome {
        stats: JoinStats {
            features: features.len(),
            ..JoinStats::default()
        },
        ..JoinOutcome::default()
    };
    let mut seen: BTreeSet<&FeatureId> = BTreeSet::new();

    for feature in features {
        let value = feature_weight(feature, weight, &mut outcome.warnings);

        let Some(geometry) = &feature.geometry else {
            outcome.stats.unmatched += 1;
            continue;
        };

        let matched = zones.matches(geometry);
        let Some(&zone) = matched.first() else {
            outcome.stats.unmatched += 1;
            continue;
        };

        if !seen.insert(&feature.id) {
            log::debug!("Dropping feature {} with an already assigned id", feature.id);
            outcome.stats.duplicate_ids += 1;
            continue;
        }

        if matched.len() > 1 {
            outcome.stats.multi_matched += 1;
        }
        outcome.stats.assigned += 1;

        *outcome.sums.entry(zone).or_insert(0.0) += value;
        outcome.assignments.push(Assignment {
            feature: feature.id.clone(),
            zone,
        });
    }

    Ok(outcome)
}

fn validate(features: &FeatureCollection, zones: &ZoneIndex<'_>) -> Result<(), DataShapeError> {
    if features.crs() != zones.crs() {
        return Err(DataShapeError::CrsMismatch {
            features: features.crs(),
            zones: zones.crs(),
        });
    }

    let kind = features.kind();
    let mut has_geometry = false;

    for feature in features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        if !geometry.fits(kind) {
            return Err(DataShapeError::UnexpectedGeometry {
                kind,
                id: feature.id.clone(),
                found: geometry.shape(),
                expected: kind.expected_shape(),
            });
        }
        has_geometry = true;
    }

    if !features.is_empty() && !has_geometry {
        return Err(DataShapeError::MissingGeometry {
            kind,
            count: features.len(),
        });
    }

    Ok(())
}

fn feature_weight(
    feature: &Feature,
    weight: &WeightSource,
    warnings: &mut Vec<CoercionWarning>,
) -> f64 {
    match weight {
        WeightSource::Unweighted => 1.0,
        WeightSource::Column(column) => {
            let raw = feature.attributes.get(column);
            coerce_number(raw).unwrap_or_else(|| {
                warnings.push(CoercionWarning {
                    feature: feature.id.clone(),
                    column: column.clone(),
                    raw: raw.cloned(),
                });
                0.0
            })
        }
    }
}

/// Leniently coerces an attribute to a finite number.
///
/// Numbers pass through and strings are trimmed and parsed, sign
/// included. Missing, null, boolean, unparseable, and non-finite values
/// are rejected.
#[must_use]
pub fn coerce_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, Point, Rect};
    use rental_map_spatial_models::{
        Attributes, Crs, FeatureGeometry, FeatureKind, ZoneCollection,
    };
    use serde_json::json;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new((x0, y0), (x1, y1)).to_polygon()])
    }

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    fn two_zones() -> ZoneCollection {
        let mut zones = ZoneCollection::new(Crs::WGS84);
        zones.push(
            Some("Z1".to_string()),
            square(0.0, 0.0, 1.0, 1.0),
            Attributes::new(),
        );
        zones.push(
            Some("Z2".to_string()),
            square(1.0, 0.0, 2.0, 1.0),
            Attributes::new(),
        );
        zones
    }

    fn total(outcome: &JoinOutcome) -> f64 {
        outcome.sums.values().sum()
    }

    #[test]
    fn straddling_parcel_is_counted_once() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        let dwellings = attrs(json!({ "dwellings": 1 }));
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.1, 0.1, 0.3, 0.3))),
            dwellings.clone(),
        );
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(1.5, 0.1, 1.7, 0.3))),
            dwellings.clone(),
        );
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.9, 0.5, 1.1, 0.7))),
            dwellings,
        );

        let outcome = spatial_join(
            &parcels,
            &index,
            &WeightSource::Column("dwellings".to_string()),
        )
        .unwrap();

        assert!((total(&outcome) - 3.0).abs() < f64::EPSILON);
        assert!((outcome.sums[&ZoneId(0)] - 2.0).abs() < f64::EPSILON);
        assert!((outcome.sums[&ZoneId(1)] - 1.0).abs() < f64::EPSILON);
        assert_eq!(outcome.stats.multi_matched, 1);
        assert_eq!(outcome.stats.assigned, 3);
    }

    #[test]
    fn straddling_weight_is_not_multiplied() {
        let mut zones = ZoneCollection::new(Crs::WGS84);
        for i in 0..3 {
            let x = f64::from(i);
            zones.push(None, square(x, 0.0, x + 1.0, 1.0), Attributes::new());
        }
        let index = ZoneIndex::build(&zones).unwrap();

        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        parcels.push_row(
            Some("big".to_string()),
            Some(FeatureGeometry::Area(square(0.5, 0.2, 2.5, 0.8))),
            attrs(json!({ "dwellings": 40 })),
        );

        let outcome = spatial_join(
            &parcels,
            &index,
            &WeightSource::Column("dwellings".to_string()),
        )
        .unwrap();

        assert!((total(&outcome) - 40.0).abs() < f64::EPSILON);
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].zone, ZoneId(0));
    }

    #[test]
    fn unweighted_listings_count_one_each() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut listings = FeatureCollection::new(FeatureKind::Listing, Crs::WGS84);
        for (i, x) in [0.2, 0.4, 1.6].into_iter().enumerate() {
            listings.push_row(
                Some(format!("l{i}")),
                Some(FeatureGeometry::Point(Point::new(x, 0.5))),
                attrs(json!({ "dwellings": 99, "price": "120.0" })),
            );
        }

        let outcome = spatial_join(&listings, &index, &WeightSource::Unweighted).unwrap();

        assert!((outcome.sums[&ZoneId(0)] - 2.0).abs() < f64::EPSILON);
        assert!((outcome.sums[&ZoneId(1)] - 1.0).abs() < f64::EPSILON);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn non_numeric_weight_counts_as_zero() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.1, 0.1, 0.2, 0.2))),
            attrs(json!({ "dwellings": "N/A" })),
        );
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.3, 0.3, 0.4, 0.4))),
            attrs(json!({ "dwellings": " 7 " })),
        );
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.5, 0.5, 0.6, 0.6))),
            Attributes::new(),
        );

        let outcome = spatial_join(
            &parcels,
            &index,
            &WeightSource::Column("dwellings".to_string()),
        )
        .unwrap();

        assert!((outcome.sums[&ZoneId(0)] - 7.0).abs() < f64::EPSILON);
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(outcome.warnings[0].feature, FeatureId::Position(0));
        assert_eq!(outcome.warnings[0].raw, Some(json!("N/A")));
        assert_eq!(outcome.warnings[1].raw, None);
    }

    #[test]
    fn negative_weights_offset_zone_sums() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.1, 0.1, 0.2, 0.2))),
            attrs(json!({ "dwellings": 10 })),
        );
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.3, 0.3, 0.4, 0.4))),
            attrs(json!({ "dwellings": "-3" })),
        );

        let outcome = spatial_join(
            &parcels,
            &index,
            &WeightSource::Column("dwellings".to_string()),
        )
        .unwrap();

        assert!((outcome.sums[&ZoneId(0)] - 7.0).abs() < f64::EPSILON);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn duplicate_ids_keep_first_match() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut listings = FeatureCollection::new(FeatureKind::Listing, Crs::WGS84);
        listings.push_row(
            Some("dup".to_string()),
            Some(FeatureGeometry::Point(Point::new(5.0, 5.0))),
            Attributes::new(),
        );
        listings.push_row(
            Some("dup".to_string()),
            Some(FeatureGeometry::Point(Point::new(1.5, 0.5))),
            Attributes::new(),
        );
        listings.push_row(
            Some("dup".to_string()),
            Some(FeatureGeometry::Point(Point::new(0.5, 0.5))),
            Attributes::new(),
        );

        let outcome = spatial_join(&listings, &index, &WeightSource::Unweighted).unwrap();

        assert_eq!(outcome.sums.len(), 1);
        assert!((outcome.sums[&ZoneId(1)] - 1.0).abs() < f64::EPSILON);
        assert_eq!(outcome.stats.duplicate_ids, 1);
        assert_eq!(outcome.stats.unmatched, 1);
    }

    #[test]
    fn zones_without_matches_are_absent() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut listings = FeatureCollection::new(FeatureKind::Listing, Crs::WGS84);
        listings.push_row(
            None,
            Some(FeatureGeometry::Point(Point::new(0.5, 0.5))),
            Attributes::new(),
        );

        let outcome = spatial_join(&listings, &index, &WeightSource::Unweighted).unwrap();
        assert!(!outcome.sums.contains_key(&ZoneId(1)));
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let listings = FeatureCollection::new(FeatureKind::Listing, Crs::from_epsg(25831));

        let err = spatial_join(&listings, &index, &WeightSource::Unweighted).unwrap_err();
        assert_eq!(
            err,
            DataShapeError::CrsMismatch {
                features: Crs::from_epsg(25831),
                zones: Crs::WGS84,
            }
        );
    }

    #[test]
    fn collection_without_geometry_is_rejected() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let mut listings = FeatureCollection::new(FeatureKind::Listing, Crs::WGS84);
        listings.push_row(None, None, Attributes::new());

        let err = spatial_join(&listings, &index, &WeightSource::Unweighted).unwrap_err();
        assert!(matches!(err, DataShapeError::MissingGeometry { count: 1, .. }));
    }

    #[test]
    fn wrong_geometry_shape_is_rejected() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        parcels.push_row(
            None,
            Some(FeatureGeometry::Point(Point::new(0.5, 0.5))),
            Attributes::new(),
        );

        let err = spatial_join(&parcels, &index, &WeightSource::Unweighted).unwrap_err();
        assert!(matches!(
            err,
            DataShapeError::UnexpectedGeometry {
                found: "point",
                expected: "polygon",
                ..
            }
        ));
    }

    #[test]
    fn empty_collection_joins_to_nothing() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let listings = FeatureCollection::new(FeatureKind::Listing, Crs::WGS84);

        let outcome = spatial_join(&listings, &index, &WeightSource::Unweighted).unwrap();
        assert!(outcome.sums.is_empty());
    }

    #[test]
    fn join_is_deterministic() {
        let zones = two_zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        for i in 0..20 {
            let x = f64::from(i) * 0.1;
            parcels.push_row(
                None,
                Some(FeatureGeometry::Area(square(x, 0.1, x + 0.15, 0.2))),
                Attributes::new(),
            );
        }

        let first = spatial_join(&parcels, &index, &WeightSource::Unweighted).unwrap();
        let second = spatial_join(&parcels, &index, &WeightSource::Unweighted).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn coerces_numbers_leniently() {
        assert_eq!(coerce_number(Some(&json!(3))), Some(3.0));
        assert_eq!(coerce_number(Some(&json!("2.5"))), Some(2.5));
        assert_eq!(coerce_number(Some(&json!("N/A"))), None);
        assert_eq!(coerce_number(Some(&json!(true))), None);
        assert_eq!(coerce_number(Some(&json!(null))), None);
        assert_eq!(coerce_number(Some(&json!(-4))), Some(-4.0));
        assert_eq!(coerce_number(Some(&json!(" -3 "))), Some(-3.0));
        assert_eq!(coerce_number(Some(&json!("inf"))), None);
        assert_eq!(coerce_number(None), None);
    }
}
