//! GeoAgg CLI - Aggregation of rasters and point samples over polygons

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoagg_algorithms::imagery::{
    aggregate, multiply, predictions_to_raster, read_predictions_csv,
};
use geoagg_algorithms::scoring::scorer_by_name;
use geoagg_algorithms::statistics::{
    weighted_sum_by_polygon, zonal_point_statistics, PointSample, WeightedSumParams,
};
use geoagg_algorithms::vector::square_feature_collection;
use geoagg_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use geoagg_core::vector::{read_geojson, write_geojson, write_geojson_string};
use geoagg_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geoagg")]
#[command(author, version, about = "Zonal statistics and raster aggregation over polygons", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Mean of point samples inside each polygon
    ZonalMean {
        /// Polygon GeoJSON file
        polygons: PathBuf,
        /// CSV with lon, lat and value columns
        points: PathBuf,
        /// Name of the value column
        #[arg(long, default_value = "value")]
        value_column: String,
        /// Output CSV (index,count,mean); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Raster from an (i, j, yhat) prediction table on a reference grid
    Generate {
        /// Reference raster giving shape, transform and CRS
        reference: PathBuf,
        /// CSV with i, j and yhat columns
        predictions: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Multiply two rasters, no-data counted as zero
    Multiply {
        /// First raster (its transform and CRS are kept)
        a: PathBuf,
        /// Second raster
        b: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Weight-averaged indicator per polygon
    WeightedSum {
        /// Polygon GeoJSON file
        polygons: PathBuf,
        /// Indicator raster
        indicator: PathBuf,
        /// Weight raster (e.g. population), same grid as the indicator
        weights: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Attribute for the weighted average
        #[arg(long, default_value = "indicator")]
        value_field: String,
        /// Attribute for the weight sum
        #[arg(long, default_value = "population")]
        weight_field: String,
        /// Do not write <indicator>_multiplied.tif
        #[arg(long)]
        no_intermediate: bool,
    },
    /// Downsample a raster by summing square blocks
    Aggregate {
        /// Input raster file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Block edge length in cells
        #[arg(short, long, default_value = "2")]
        scale: usize,
    },
    /// Square polygon of a given side centred on a point
    Square {
        /// Longitude in degrees
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        /// Latitude in degrees
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        /// Side length in metres
        side: f64,
        /// Output GeoJSON file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score predictions against ground truth
    Score {
        /// CSV with y and yhat columns
        input: PathBuf,
        /// Metric: r2, mape
        #[arg(short, long, default_value = "r2")]
        metric: String,
        /// Report the score with greater-is-better orientation
        #[arg(long)]
        signed: bool,
    },
}

// ─── Tables ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScoreRow {
    y: f64,
    yhat: f64,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn read_points(path: &Path, value_column: &str) -> Result<Vec<PointSample>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("Column '{}' not found in {}", name, path.display()))
    };
    let (lon_i, lat_i, value_i) = (column("lon")?, column("lat")?, column(value_column)?);

    let mut samples = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| -> Result<f64> {
            record
                .get(i)
                .unwrap_or_default()
                .trim()
                .parse()
                .with_context(|| format!("Invalid number on data row {}", line + 1))
        };
        samples.push(PointSample::new(field(lon_i)?, field(lat_i)?, field(value_i)?));
    }
    Ok(samples)
}

fn read_scores(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut y = Vec::new();
    let mut yhat = Vec::new();
    for row in reader.deserialize() {
        let row: ScoreRow = row.context("Invalid score row")?;
        y.push(row.y);
        yhat.push(row.yhat);
    }
    Ok((y, yhat))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    run(cli.command)
}

fn run(command: Commands) -> Result<()> {
    match command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!("  Sum: {:.4}", stats.sum);
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Zonal mean ───────────────────────────────────────────────
        Commands::ZonalMean {
            polygons,
            points,
            value_column,
            output,
        } => {
            let fc = read_geojson(&polygons).context("Failed to read polygons")?;
            let samples = read_points(&points, &value_column)?;
            info!("{} polygons, {} samples", fc.len(), samples.len());

            let start = Instant::now();
            let results = zonal_point_statistics(&fc, &samples);
            let elapsed = start.elapsed();

            let mut writer: csv::Writer<Box<dyn std::io::Write>> = match &output {
                Some(path) => csv::Writer::from_writer(Box::new(
                    std::fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                )),
                None => csv::Writer::from_writer(Box::new(std::io::stdout())),
            };
            writer.write_record(["index", "count", "mean"])?;
            for r in &results {
                writer.write_record([r.index.to_string(), r.count.to_string(), r.mean.to_string()])?;
            }
            writer.flush()?;
            if let Some(path) = &output {
                done("Zonal means", path, elapsed);
            }
        }

        // ── Generate ─────────────────────────────────────────────────
        Commands::Generate {
            reference,
            predictions,
            output,
        } => {
            let reference = read_raster(&reference)?;
            let rows = read_predictions_csv(&predictions).context("Failed to read predictions")?;
            let start = Instant::now();
            let result = predictions_to_raster(&reference, &rows)
                .context("Failed to place predictions")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Prediction raster", &output, elapsed);
        }

        // ── Multiply ─────────────────────────────────────────────────
        Commands::Multiply { a, b, output } => {
            let ra = read_raster(&a)?;
            let rb = read_raster(&b)?;
            let start = Instant::now();
            let result = multiply(&ra, &rb).context("Failed to multiply rasters")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Product", &output, elapsed);
        }

        // ── Weighted sum ─────────────────────────────────────────────
        Commands::WeightedSum {
            polygons,
            indicator,
            weights,
            output,
            value_field,
            weight_field,
            no_intermediate,
        } => {
            let params = WeightedSumParams {
                value_field,
                weight_field,
                keep_intermediate: !no_intermediate,
            };
            let pb = spinner("Computing weighted sums...");
            let start = Instant::now();
            let records = weighted_sum_by_polygon(&polygons, &indicator, &weights, &output, &params)
                .context("Failed to compute weighted sums")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            info!("{} polygons processed", records.len());
            done("Weighted sums", &output, elapsed);
        }

        // ── Aggregate ────────────────────────────────────────────────
        Commands::Aggregate {
            input,
            output,
            scale,
        } => {
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let result = aggregate(&raster, scale).context("Failed to aggregate raster")?;
            let elapsed = start.elapsed();
            info!("Output: {} x {}", result.cols(), result.rows());
            write_result(&result, &output)?;
            done("Aggregate", &output, elapsed);
        }

        // ── Square ───────────────────────────────────────────────────
        Commands::Square {
            lon,
            lat,
            side,
            output,
        } => {
            let fc = square_feature_collection(lon, lat, side);
            match output {
                Some(path) => {
                    write_geojson(&fc, &path).context("Failed to write square")?;
                    println!("Square saved to: {}", path.display());
                }
                None => println!("{}", write_geojson_string(&fc)?),
            }
        }

        // ── Score ────────────────────────────────────────────────────
        Commands::Score {
            input,
            metric,
            signed,
        } => {
            let scorer = scorer_by_name(&metric)?;
            let (y, yhat) = read_scores(&input)?;
            let value = if signed {
                scorer.signed_score(&y, &yhat)?
            } else {
                scorer.score(&y, &yhat)?
            };
            println!("{}: {}", scorer.name(), value);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geoagg_core::{AttributeValue, GeoTransform, CRS};

    fn write_grid(dir: &Path, name: &str, value: f64) -> PathBuf {
        let mut r = Raster::filled(2, 2, value);
        r.set_transform(GeoTransform::new(10.0, 1.0, 0.5, -0.5));
        r.set_crs(Some(CRS::wgs84()));
        let path = dir.join(name);
        write_geotiff(&r, &path, None).unwrap();
        path
    }

    #[test]
    fn weighted_sum_command_writes_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let indicator = write_grid(dir.path(), "ind.tif", 0.25);
        let weights = write_grid(dir.path(), "pop.tif", 4.0);
        let polygons = dir.path().join("zones.geojson");
        std::fs::write(
            &polygons,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[10,0],[11,0],[11,1],[10,1],[10,0]]]}}]}"#,
        )
        .unwrap();
        let output = dir.path().join("out.geojson");

        let cli = Cli::try_parse_from([
            "geoagg",
            "weighted-sum",
            polygons.to_str().unwrap(),
            indicator.to_str().unwrap(),
            weights.to_str().unwrap(),
            output.to_str().unwrap(),
            "--value-field",
            "poverty",
            "--no-intermediate",
        ])
        .unwrap();
        run(cli.command).unwrap();

        let written = read_geojson(&output).unwrap();
        let feature = &written.features[0];
        assert_relative_eq!(
            feature.get_property("poverty").and_then(AttributeValue::as_f64).unwrap(),
            0.25,
            epsilon = 1e-9
        );
        assert_eq!(feature.get_property("population").and_then(AttributeValue::as_i64), Some(16));
        assert!(!dir.path().join("ind_multiplied.tif").exists());
    }
}
