//! Percentage ratios derived from merged zone counts.

use rental_map_spatial_models::{DenominatorValue, Ratio, ZoneAggregate, ZoneRatios};

/// Computes `ratio_<metric>` for every numerator and the overall `ratio`.
///
/// With a metric denominator `ratio = 100 * n_all / denominator`; with a
/// zone-field denominator there is no shared integer column, so `ratio`
/// is the sum of the per-metric ratios. A zero or missing denominator
/// makes every ratio of the zone [`Ratio::Undefined`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute(aggregate: &ZoneAggregate) -> ZoneRatios {
    let denominator = aggregate.denominator.value();

    let per_metric: Vec<_> = aggregate
        .numerators
        .iter()
        .map(|count| {
            (
                count.metric.clone(),
                Ratio::percent(count.count as f64, denominator),
            )
        })
        .collect();

    let all = match aggregate.denominator {
        DenominatorValue::Count(_) => Ratio::percent(aggregate.n_all as f64, denominator),
        DenominatorValue::Field { .. } => Ratio::sum(per_metric.iter().map(|(_, r)| *r)),
    };

    ZoneRatios { per_metric, all }
}
