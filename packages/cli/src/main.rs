#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Short-term rental density maps.
//!
//! Counts whole-flat and room listings per administrative zone, relative
//! to the zone's housing stock, and writes one `GeoJSON` file per level.
//! Set `RUST_LOG=info` to see progress and per-level totals.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rental_map_city::{load_city_file, registered_city, registry};
use rental_map_cli::{RunOptions, run_city};

#[derive(Parser)]
#[command(name = "rental_map", about = "Short-term rental density per administrative zone")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate listings for a city and write one file per level
    Run(RunArgs),
    /// List the built-in cities
    Cities,
}

#[derive(Args)]
struct RunArgs {
    /// Built-in city id (see `cities`)
    #[arg(long, conflicts_with = "config", required_unless_present = "config")]
    city: Option<String>,

    /// City definition TOML file, for cities that are not built in
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory dataset paths are relative to
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory receiving `<level>.geojson` files
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    /// Only run this level (repeatable)
    #[arg(long = "level")]
    levels: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args)?,
        Commands::Cities => list_cities(),
    }

    Ok(())
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let city = match (&args.city, &args.config) {
        (_, Some(path)) => load_city_file(path)?,
        (Some(id), None) => registered_city(id)?,
        (None, None) => return Err("either --city or --config is required".into()),
    };

    let options = RunOptions {
        data_dir: args.data_dir,
        out_dir: args.out_dir,
        levels: args.levels,
    };

    let summaries = run_city(&city, &options)?;

    for summary in &summaries {
        println!(
            "{}: {} zones -> {}",
            summary.level,
            summary.emitted,
            summary.output.display()
        );
    }

    Ok(())
}

fn list_cities() {
    for city in registry::all_cities() {
        let levels: Vec<&str> = city
            .boundaries
            .levels
            .iter()
            .map(|level| level.id.as_str())
            .collect();
        println!(
            "{:<12} {} ({}) levels: {}",
            city.id,
            city.name,
            city.province,
            levels.join(", ")
        );
    }
}
