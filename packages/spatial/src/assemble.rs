//! Final per-zone records.

use rental_map_spatial_models::{ZoneAggregate, ZoneCollection, ZoneRatios, ZoneResult};

/// Keeps zones whose denominator is strictly positive, attaches their
/// geometry and attributes, and preserves zone input order.
///
/// A zone that still carries an undefined or non-finite ratio after the
/// denominator filter is dropped as well, so no emitted ratio is `NaN`.
#[must_use]
pub fn assemble(
    zones: &ZoneCollection,
    rated: Vec<(ZoneAggregate, ZoneRatios)>,
) -> Vec<ZoneResult> {
    let mut results = Vec::with_capacity(rated.len());

    for (aggregate, ratios) in rated {
        if !aggregate.denominator.is_positive() {
            log::debug!("Excluding {}: no housing stock", aggregate.zone);
            continue;
        }
        if !ratios.iter().all(|r| r.is_defined()) {
            log::warn!("Excluding {}: undefined ratio", aggregate.zone);
            continue;
        }
        let Some(zone) = zones.get(aggregate.zone) else {
            log::warn!("Excluding {}: not in the zone collection", aggregate.zone);
            continue;
        };

        results.push(ZoneResult {
            zone: zone.id,
            name: zone.name.clone(),
            geometry: zone.geometry.clone(),
            attributes: zone.attributes.clone(),
            aggregate,
            ratios,
        });
    }

    results.sort_by_key(|r| r.zone);
    results
}
