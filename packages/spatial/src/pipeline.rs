//! One run of the engine, start to finish.
//!
//! Index zones → join every metric → merge → ratios → assemble. The
//! [`RunContext`] is never mutated; each stage only consumes what the
//! previous one returned.

use rental_map_spatial_models::{ZoneAggregate, ZoneCollection, ZoneResult};

use crate::SpatialError;
use crate::aggregate::{DenominatorInput, MetricInput, MetricReport, aggregate};
use crate::assemble::assemble;
use crate::index::ZoneIndex;
use crate::ratio;

/// Everything a run reads.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    /// Zones to aggregate into.
    pub zones: &'a ZoneCollection,
    /// Housing-stock source.
    pub denominator: DenominatorInput<'a>,
    /// Rental metrics, in output column order.
    pub numerators: Vec<MetricInput<'a>>,
}

/// Totals over every zone of the run, before the denominator filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTotals {
    /// Sum of the denominator over zones where it is defined.
    pub denominator: f64,
    /// Per-numerator totals in plan order.
    pub numerators: Vec<(String, u64)>,
    /// Sum of all numerators.
    pub n_all: u64,
}

/// What a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Emitted zones, in zone input order.
    pub results: Vec<ZoneResult>,
    /// Zones dropped for lack of a positive denominator.
    pub excluded: usize,
    /// Per-metric join diagnostics.
    pub reports: Vec<MetricReport>,
    /// Whole-run totals.
    pub totals: RunTotals,
}

/// Runs the engine over one context.
///
/// # Errors
///
/// Returns [`SpatialError`] if a zone has no geometry, the plan is
/// invalid, or any metric's join fails.
pub fn run(ctx: &RunContext<'_>) -> Result<RunOutput, SpatialError> {
    let index = ZoneIndex::build(ctx.zones).map_err(SpatialError::Zones)?;

    let aggregation = aggregate(&index, &ctx.denominator, &ctx.numerators)?;

    for report in &aggregation.reports {
        log::info!(
            "Metric '{}': {} of {} features assigned \
             ({} unmatched, {} spanning several zones, {} duplicate ids)",
            report.metric,
            report.stats.assigned,
            report.stats.features,
            report.stats.unmatched,
            report.stats.multi_matched,
            report.stats.duplicate_ids,
        );
        if !report.warnings.is_empty() {
            log::warn!(
                "Metric '{}': {} weight values were not numeric and counted as 0",
                report.metric,
                report.warnings.len()
            );
        }
        for warning in &report.warnings {
            log::debug!("{warning}");
        }
    }

    let totals = totals(&aggregation.zones, &ctx.numerators);

    let rated = aggregation
        .zones
        .into_iter()
        .map(|aggregate| {
            let ratios = ratio::compute(&aggregate);
            (aggregate, ratios)
        })
        .collect::<Vec<_>>();

    let zone_count = rated.len();
    let results = assemble(ctx.zones, rated);
    let excluded = zone_count - results.len();

    log::info!(
        "Emitted {} of {zone_count} zones ({excluded} without housing stock)",
        results.len()
    );

    Ok(RunOutput {
        results,
        excluded,
        reports: aggregation.reports,
        totals,
    })
}

fn totals(zones: &[ZoneAggregate], numerators: &[MetricInput<'_>]) -> RunTotals {
    let mut totals = RunTotals {
        numerators: numerators
            .iter()
            .map(|input| (input.metric.name.clone(), 0))
            .collect(),
        ..RunTotals::default()
    };

    for zone in zones {
        totals.denominator += zone.denominator.value().unwrap_or(0.0);
        for ((_, total), count) in totals.numerators.iter_mut().zip(&zone.numerators) {
            *total += count.count;
        }
        totals.n_all += zone.n_all;
    }

    totals
}
