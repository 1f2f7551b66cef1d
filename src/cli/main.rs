//! Command-line front end for running the pipeline over local files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use senda::guide::{GuidanceEngine, DEFAULT_THRESHOLD_KM};
use senda::models::FeatureCollection;
use senda::route::{route_blob_name, RouteBuilder, TimestampPolicy};
use senda::synth::{batch_blob_name, parse_batch, synthesize_with_report};

#[derive(Parser, Debug)]
#[command(name = "senda")]
#[command(about = "Build GeoJSON routes from device telemetry and query them")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a JSON array of telemetry samples into point features
    Synthesize {
        /// Telemetry batch file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Order the points of a collection by timestamp into a route
    Route {
        /// Point collection file
        #[arg(short, long)]
        input: PathBuf,

        /// Drop points with unparseable timestamps instead of sorting them first
        #[arg(long)]
        strict: bool,
    },

    /// Print guidance for a position against a collection
    Guide {
        /// Route or point collection file
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Proximity threshold in kilometers
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_KM)]
        threshold_km: f64,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    match args.command {
        Command::Synthesize { input, out_dir } => {
            let body = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let batch = parse_batch(&body)?;
            let now = Utc::now();
            let synthesis = synthesize_with_report(&batch, now)?;

            let output = out_dir.join(batch_blob_name(&batch[0].device_id, now));
            write_collection(&output, &synthesis.collection)?;
            info!(
                "{} points kept, {} samples dropped",
                synthesis.report.kept, synthesis.report.dropped
            );
            println!("{}", output.display());
        }
        Command::Route { input, strict } => {
            let policy = if strict {
                TimestampPolicy::Strict
            } else {
                TimestampPolicy::Permissive
            };
            let collection = read_collection(&input)?;
            let route = RouteBuilder::new(policy).build(&collection)?;

            let name = input
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("route.geojson");
            let output = input.with_file_name(route_blob_name(name));
            write_collection(&output, &route)?;
            println!("{}", output.display());
        }
        Command::Guide {
            input,
            lat,
            lon,
            threshold_km,
        } => {
            let collection = read_collection(&input)?;
            let result = GuidanceEngine::new(threshold_km).guide(&collection, lat, lon)?;
            info!("Nearest point at {:.4} km", result.distance_km);
            println!("{}", result.text);
        }
    }

    Ok(())
}

fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(FeatureCollection::from_slice(&bytes)?)
}

fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    fs::write(path, collection.to_pretty_json()?)
        .with_context(|| format!("Failed to write {}", path.display()))
}
