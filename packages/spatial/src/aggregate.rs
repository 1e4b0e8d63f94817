//! Per-metric joins merged into one record per zone.
//!
//! Each metric's join is independent and they run in parallel on the rayon
//! pool, sharing the zone index read-only. Merging starts only after every
//! join has returned.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use rental_map_spatial_models::{
    DenominatorValue, FeatureCollection, Metric, MetricCount, ZoneAggregate, ZoneId,
};

use crate::SpatialError;
use crate::index::ZoneIndex;
use crate::join::{CoercionWarning, JoinOutcome, JoinStats, coerce_number, spatial_join};

/// A metric paired with the features it counts.
#[derive(Debug, Clone, Copy)]
pub struct MetricInput<'a> {
    /// Metric definition.
    pub metric: &'a Metric,
    /// Features joined for this metric.
    pub features: &'a FeatureCollection,
}

/// Where every zone's housing stock comes from.
#[derive(Debug, Clone, Copy)]
pub enum DenominatorInput<'a> {
    /// Aggregated from features (dwellings per parcel).
    Metric(MetricInput<'a>),
    /// A census attribute on each zone.
    ZoneField(&'a str),
}

/// Diagnostics for one metric's join.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReport {
    /// Metric name.
    pub metric: String,
    /// Join counters.
    pub stats: JoinStats,
    /// Weight values coerced to `0`.
    pub warnings: Vec<CoercionWarning>,
}

/// Merged per-zone counts plus per-metric diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// One aggregate per zone, in zone order.
    pub zones: Vec<ZoneAggregate>,
    /// One report per joined metric, denominator first.
    pub reports: Vec<MetricReport>,
}

/// Checks that a plan has at least one numerator and no repeated names.
///
/// # Errors
///
/// Returns [`SpatialError::InvalidPlan`] if there is no numerator metric or
/// two metrics share a name.
pub fn validate_plan(
    denominator: &DenominatorInput<'_>,
    numerators: &[MetricInput<'_>],
) -> Result<(), SpatialError> {
    if numerators.is_empty() {
        return Err(SpatialError::InvalidPlan {
            message: "at least one numerator metric is required".to_string(),
        });
    }

    let mut names = BTreeSet::new();
    let denominator_name = match denominator {
        DenominatorInput::Metric(input) => Some(input.metric.name.as_str()),
        DenominatorInput::ZoneField(_) => None,
    };

    for name in denominator_name
        .into_iter()
        .chain(numerators.iter().map(|input| input.metric.name.as_str()))
    {
        if name == "all" {
            return Err(SpatialError::InvalidPlan {
                message: "metric name 'all' is reserved".to_string(),
            });
        }
        if !names.insert(name) {
            return Err(SpatialError::InvalidPlan {
                message: format!("metric '{name}' appears more than once"),
            });
        }
    }

    Ok(())
}

/// Runs one join per metric and outer-merges the sums by zone.
///
/// Every zone in the index appears in the result; a metric with no
/// assignment in a zone counts `0` there. `n_all` is the sum of the
/// numerator counts.
///
/// # Errors
///
/// Returns [`SpatialError::InvalidPlan`] for an unusable plan and
/// [`SpatialError::Join`] naming the first metric whose join failed.
pub fn aggregate(
    zones: &ZoneIndex<'_>,
    denominator: &DenominatorInput<'_>,
    numerators: &[MetricInput<'_>],
) -> Result<Aggregation, SpatialError> {
    validate_plan(denominator, numerators)?;

    let mut inputs: Vec<MetricInput<'_>> = Vec::with_capacity(numerators.len() + 1);
    if let DenominatorInput::Metric(input) = denominator {
        inputs.push(*input);
    }
    inputs.extend_from_slice(numerators);

    let results: Vec<Result<JoinOutcome, SpatialError>> = inputs
        .par_iter()
        .map(|input| {
            log::debug!(
                "Joining {} {} features for metric '{}'",
                input.features.len(),
                input.features.kind(),
                input.metric.name
            );
            spatial_join(input.features, zones, &input.metric.weight).map_err(|source| {
                SpatialError::Join {
                    metric: input.metric.name.clone(),
                    source,
                }
            })
        })
        .collect();
    let outcomes = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let mut counts = outcomes.iter().map(|outcome| to_counts(&outcome.sums));
    let denominator_sums = match denominator {
        DenominatorInput::Metric(input) => {
            DenominatorSums::Counts(input.metric, counts.next().unwrap_or_default())
        }
        DenominatorInput::ZoneField(field) => DenominatorSums::Field(*field),
    };
    let numerator_counts: Vec<BTreeMap<ZoneId, u64>> = counts.collect();

    let merged = zones
        .zones()
        .iter()
        .map(|zone| {
            let denominator = match &denominator_sums {
                DenominatorSums::Counts(metric, sums) => {
                    DenominatorValue::Count(count_for(metric, sums, zone.id))
                }
                DenominatorSums::Field(field) => DenominatorValue::Field {
                    field: (*field).to_string(),
                    value: coerce_number(zone.attributes.get(*field)),
                },
            };

            let numerators: Vec<MetricCount> = numerators
                .iter()
                .zip(&numerator_counts)
                .map(|(input, sums)| count_for(input.metric, sums, zone.id))
                .collect();
            let n_all = numerators.iter().map(|c| c.count).sum();

            ZoneAggregate {
                zone: zone.id,
                denominator,
                numerators,
                n_all,
            }
        })
        .collect();

    let reports = inputs
        .iter()
        .zip(outcomes)
        .map(|(input, outcome)| MetricReport {
            metric: input.metric.name.clone(),
            stats: outcome.stats,
            warnings: outcome.warnings,
        })
        .collect();

    Ok(Aggregation {
        zones: merged,
        reports,
    })
}

enum DenominatorSums<'a> {
    Counts(&'a Metric, BTreeMap<ZoneId, u64>),
    Field(&'a str),
}

fn count_for(metric: &Metric, sums: &BTreeMap<ZoneId, u64>, zone: ZoneId) -> MetricCount {
    MetricCount {
        metric: metric.clone(),
        count: sums.get(&zone).copied().unwrap_or(0),
    }
}

/// Truncates weighted sums to whole counts. A zone whose signed sum is
/// not positive counts `0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_counts(sums: &BTreeMap<ZoneId, f64>) -> BTreeMap<ZoneId, u64> {
    sums.iter()
        .map(|(zone, sum)| {
            let count = if sum.is_finite() && *sum > 0.0 {
                sum.trunc() as u64
            } else {
                0
            };
            (*zone, count)
        })
        .collect()
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

    fn zones() -> ZoneCollection {
        let mut zones = ZoneCollection::new(Crs::WGS84);
        zones.push(
            None,
            square(0.0, 0.0, 1.0, 1.0),
            attrs(json!({ "viviendas": 50 })),
        );
        zones.push(
            None,
            square(1.0, 0.0, 2.0, 1.0),
            attrs(json!({ "viviendas": "n/d" })),
        );
        zones.push(None, square(2.0, 0.0, 3.0, 1.0), Attributes::new());
        zones
    }

    fn parcels() -> FeatureCollection {
        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.1, 0.1, 0.2, 0.2))),
            attrs(json!({ "numberOfDwellings": 10 })),
        );
        parcels.push_row(
            None,
            Some(FeatureGeometry::Area(square(0.9, 0.1, 1.1, 0.2))),
            attrs(json!({ "numberOfDwellings": 2.7 })),
        );
        parcels
    }

    fn points(xs: &[f64]) -> FeatureCollection {
        let mut listings = FeatureCollection::new(FeatureKind::Listing, Crs::WGS84);
        for x in xs {
            listings.push_row(
                None,
                Some(FeatureGeometry::Point(Point::new(*x, 0.5))),
                Attributes::new(),
            );
        }
        listings
    }

    #[test]
    fn every_zone_is_zero_filled() {
        let zones = zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let parcels = parcels();
        let flats = points(&[0.5, 0.6]);
        let rooms = points(&[]);
        let parcels_metric = Metric::weighted("parcels", "numberOfDwellings");
        let flats_metric = Metric::unweighted("flats");
        let rooms_metric = Metric::unweighted("rooms");

        let aggregation = aggregate(
            &index,
            &DenominatorInput::Metric(MetricInput {
                metric: &parcels_metric,
                features: &parcels,
            }),
            &[
                MetricInput {
                    metric: &flats_metric,
                    features: &flats,
                },
                MetricInput {
                    metric: &rooms_metric,
                    features: &rooms,
                },
            ],
        )
        .unwrap();

        assert_eq!(aggregation.zones.len(), 3);

        let first = &aggregation.zones[0];
        assert_eq!(first.denominator.value(), Some(12.0));
        assert_eq!(first.numerators[0].count, 2);
        assert_eq!(first.numerators[1].count, 0);
        assert_eq!(first.n_all, 2);

        let last = &aggregation.zones[2];
        assert_eq!(last.denominator.value(), Some(0.0));
        assert!(last.numerators.iter().all(|c| c.count == 0));
        assert_eq!(last.n_all, 0);

        let names: Vec<&str> = aggregation.reports.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(names, vec!["parcels", "flats", "rooms"]);
    }

    #[test]
    fn weighted_sums_are_truncated() {
        let zones = zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let parcels = parcels();
        let metric = Metric::weighted("parcels", "numberOfDwellings");
        let flats_metric = Metric::unweighted("flats");
        let flats = points(&[]);

        let aggregation = aggregate(
            &index,
            &DenominatorInput::Metric(MetricInput {
                metric: &metric,
                features: &parcels,
            }),
            &[MetricInput {
                metric: &flats_metric,
                features: &flats,
            }],
        )
        .unwrap();

        // 10 + 2.7 in zone 0 (the straddling parcel goes to the first zone).
        assert_eq!(aggregation.zones[0].denominator.value(), Some(12.0));
        assert_eq!(aggregation.zones[1].denominator.value(), Some(0.0));
    }

    #[test]
    fn zone_field_denominator_is_coerced() {
        let zones = zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let flats = points(&[0.5, 1.5]);
        let flats_metric = Metric::unweighted("flats");

        let aggregation = aggregate(
            &index,
            &DenominatorInput::ZoneField("viviendas"),
            &[MetricInput {
                metric: &flats_metric,
                features: &flats,
            }],
        )
        .unwrap();

        assert_eq!(aggregation.zones[0].denominator.value(), Some(50.0));
        assert_eq!(aggregation.zones[1].denominator.value(), None);
        assert_eq!(aggregation.zones[2].denominator.value(), None);
        assert_eq!(aggregation.zones[1].n_all, 1);
        assert_eq!(aggregation.reports.len(), 1);
    }

    #[test]
    fn plan_without_numerators_is_rejected() {
        let zones = zones();
        let index = ZoneIndex::build(&zones).unwrap();

        let err = aggregate(&index, &DenominatorInput::ZoneField("viviendas"), &[]).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidPlan { .. }));
    }

    #[test]
    fn duplicate_metric_names_are_rejected() {
        let flats = points(&[]);
        let metric = Metric::unweighted("flats");
        let input = MetricInput {
            metric: &metric,
            features: &flats,
        };

        let err = validate_plan(&DenominatorInput::Metric(input), &[input]).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidPlan { .. }));
    }

    #[test]
    fn reserved_metric_name_is_rejected() {
        let flats = points(&[]);
        let metric = Metric::unweighted("all");
        let input = MetricInput {
            metric: &metric,
            features: &flats,
        };

        let err = validate_plan(&DenominatorInput::ZoneField("viviendas"), &[input]).unwrap_err();
        match err {
            SpatialError::InvalidPlan { message } => assert!(message.contains("reserved")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn negative_zone_sum_counts_zero() {
        let zones = zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let mut parcels = FeatureCollection::new(FeatureKind::Parcel, Crs::WGS84);
        for dwellings in [json!(4), json!("-9")] {
            parcels.push_row(
                None,
                Some(FeatureGeometry::Area(square(0.1, 0.1, 0.2, 0.2))),
                attrs(json!({ "numberOfDwellings": dwellings })),
            );
        }
        for dwellings in [json!(6), json!(-2)] {
            parcels.push_row(
                None,
                Some(FeatureGeometry::Area(square(1.4, 0.1, 1.5, 0.2))),
                attrs(json!({ "numberOfDwellings": dwellings })),
            );
        }
        let metric = Metric::weighted("parcels", "numberOfDwellings");
        let flats_metric = Metric::unweighted("flats");
        let flats = points(&[]);

        let aggregation = aggregate(
            &index,
            &DenominatorInput::Metric(MetricInput {
                metric: &metric,
                features: &parcels,
            }),
            &[MetricInput {
                metric: &flats_metric,
                features: &flats,
            }],
        )
        .unwrap();

        assert_eq!(aggregation.zones[0].denominator.value(), Some(0.0));
        assert_eq!(aggregation.zones[1].denominator.value(), Some(4.0));
        assert!(aggregation.reports[0].warnings.is_empty());
    }

    #[test]
    fn failing_join_names_its_metric() {
        let zones = zones();
        let index = ZoneIndex::build(&zones).unwrap();
        let mut rooms = FeatureCollection::new(FeatureKind::Listing, Crs::from_epsg(25831));
        rooms.push_row(
            None,
            Some(FeatureGeometry::Point(Point::new(0.5, 0.5))),
            Attributes::new(),
        );
        let flats = points(&[0.5]);
        let flats_metric = Metric::unweighted("flats");
        let rooms_metric = Metric::unweighted("rooms");

        let err = aggregate(
            &index,
            &DenominatorInput::ZoneField("viviendas"),
            &[
                MetricInput {
                    metric: &flats_metric,
                    features: &flats,
                },
                MetricInput {
                    metric: &rooms_metric,
                    features: &rooms,
                },
            ],
        )
        .unwrap_err();

        match err {
            SpatialError::Join { metric, .. } => assert_eq!(metric, "rooms"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
