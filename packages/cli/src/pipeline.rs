//! One city, every level.
//!
//! Each dataset is read once. Levels are then processed in definition
//! order, each one an independent engine run over the same parcels and
//! listings, written to `<out-dir>/<level-id>.geojson`. Every dataset is
//! mapped into the city's CRS before it reaches the engine.

use std::path::PathBuf;
use std::time::Instant;

use rental_map_city::resolve_path;
use rental_map_city_models::{CityDefinition, DenominatorConfig, LevelDefinition};
use rental_map_geodata::{
    Boundaries, read_parcels, reproject_features, reproject_zones, write_results,
};
use rental_map_listing::{PropertyTypeClassifier, load_listings};
use rental_map_spatial::aggregate::{DenominatorInput, MetricInput};
use rental_map_spatial::pipeline::{RunContext, RunTotals, run};
use rental_map_spatial_models::{Crs, FeatureCollection, FeatureKind, Metric};

use crate::RunError;

/// Metric name of the parcel dwelling sum, written as `n_parcels`.
pub const PARCELS_METRIC: &str = "parcels";
/// Metric name of whole-flat listings.
pub const FLATS_METRIC: &str = "flats";
/// Metric name of room listings.
pub const ROOMS_METRIC: &str = "rooms";

/// Where to read from and write to.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory dataset paths are resolved against.
    pub data_dir: PathBuf,
    /// Directory receiving one file per level.
    pub out_dir: PathBuf,
    /// Level ids to run. Empty runs every level.
    pub levels: Vec<String>,
}

/// Outcome of one level.
#[derive(Debug, Clone)]
pub struct LevelSummary {
    /// Level id.
    pub level: String,
    /// Written file.
    pub output: PathBuf,
    /// Zones in the level.
    pub zones: usize,
    /// Zones written.
    pub emitted: usize,
    /// Zones dropped for lack of housing stock.
    pub excluded: usize,
    /// Whole-level totals.
    pub totals: RunTotals,
}

/// Runs every selected level of `city`.
///
/// # Errors
///
/// Returns [`RunError`] if a requested level does not exist, a dataset
/// cannot be read or reprojected into the city's CRS, the engine rejects a
/// level's inputs, or an output file cannot be written.
pub fn run_city(
    city: &CityDefinition,
    options: &RunOptions,
) -> Result<Vec<LevelSummary>, RunError> {
    let start = Instant::now();
    let levels = selected_levels(city, &options.levels)?;

    log::info!(
        "Running {} ({}) over {} levels",
        city.name,
        city.province,
        levels.len()
    );

    let boundaries = Boundaries::load(
        &resolve_path(&options.data_dir, &city.boundaries.path),
        &city.boundaries,
    )?;

    let needs_parcels = levels
        .iter()
        .any(|level| level.denominator == DenominatorConfig::Dwellings);
    let parcels = if needs_parcels {
        let parcels = read_parcels(
            &resolve_path(&options.data_dir, &city.parcels.path),
            &city.parcels,
        )?;
        reproject_features(parcels, city.crs)?
    } else {
        FeatureCollection::new(FeatureKind::Parcel, city.crs)
    };

    let classifier = city
        .entire_place_types
        .as_ref()
        .map_or_else(PropertyTypeClassifier::builtin, PropertyTypeClassifier::new);
    let listings = load_listings(
        &resolve_path(&options.data_dir, &city.listings.path),
        &city.listings,
        &classifier,
        Crs::WGS84,
    )?;
    let flats = reproject_features(listings.flats, city.crs)?;
    let rooms = reproject_features(listings.rooms, city.crs)?;

    let dwellings_metric = Metric::weighted(PARCELS_METRIC, city.parcels.dwellings_field.clone());
    let flats_metric = Metric::unweighted(FLATS_METRIC);
    let rooms_metric = Metric::unweighted(ROOMS_METRIC);

    let mut summaries = Vec::with_capacity(levels.len());

    for level in levels {
        let zones = reproject_zones(boundaries.zones(level, &city.boundaries.levels)?, city.crs)?;

        let denominator = match &level.denominator {
            DenominatorConfig::Dwellings => DenominatorInput::Metric(MetricInput {
                metric: &dwellings_metric,
                features: &parcels,
            }),
            DenominatorConfig::ZoneField { field } => DenominatorInput::ZoneField(field),
        };

        let ctx = RunContext {
            zones: &zones,
            denominator,
            numerators: vec![
                MetricInput {
                    metric: &flats_metric,
                    features: &flats,
                },
                MetricInput {
                    metric: &rooms_metric,
                    features: &rooms,
                },
            ],
        };

        let output = run(&ctx).map_err(|source| RunError::Level {
            level: level.id.clone(),
            source,
        })?;

        let path = options.out_dir.join(format!("{}.geojson", level.id));
        write_results(&path, &output.results, zones.crs()).map_err(|source| {
            RunError::Output {
                level: level.id.clone(),
                source,
            }
        })?;

        let summary = LevelSummary {
            level: level.id.clone(),
            output: path,
            zones: zones.len(),
            emitted: output.results.len(),
            excluded: output.excluded,
            totals: output.totals,
        };
        log_summary(&summary);
        summaries.push(summary);
    }

    log::info!(
        "{} complete in {:.1}s",
        city.name,
        start.elapsed().as_secs_f64()
    );

    Ok(summaries)
}

/// Resolves the requested level ids, keeping definition order. An empty
/// request selects every level.
fn selected_levels<'a>(
    city: &'a CityDefinition,
    requested: &[String],
) -> Result<Vec<&'a LevelDefinition>, RunError> {
    if let Some(unknown) = requested.iter().find(|id| city.level(id).is_none()) {
        return Err(RunError::UnknownLevel {
            city: city.id.clone(),
            level: unknown.clone(),
        });
    }

    Ok(city
        .boundaries
        .levels
        .iter()
        .filter(|level| requested.is_empty() || requested.contains(&level.id))
        .collect())
}

#[allow(clippy::cast_precision_loss)]
fn log_summary(summary: &LevelSummary) {
    let totals = &summary.totals;
    log::info!(
        "[{}] {} of {} zones written to {} ({} without housing stock)",
        summary.level,
        summary.emitted,
        summary.zones,
        summary.output.display(),
        summary.excluded
    );
    for (metric, total) in &totals.numerators {
        let share = if totals.denominator > 0.0 {
            100.0 * (*total as f64) / totals.denominator
        } else {
            0.0
        };
        log::info!(
            "[{}] {metric}: {total} listings, {share:.2}% of {:.0} housing units",
            summary.level,
            totals.denominator
        );
    }
    log::info!("[{}] all listings: {}", summary.level, totals.n_all);
}
